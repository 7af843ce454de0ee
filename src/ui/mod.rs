// UI and formatting module

pub mod formatters;

// Re-export commonly used items for cleaner imports
pub use formatters::{
    format_bytes, format_timestamp_ms, format_uptime, print_process_detail, print_process_table,
    print_system_info, summarize_update,
};
