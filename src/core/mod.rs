// Core business logic module

pub mod config;
pub mod process_monitor;

// Re-export commonly used items
pub use config::EngineConfig;
pub use process_monitor::{
    EngineEvent, PluginLifecycle, ProcessInfo, ProcessManager, ProcessUpdateEvent, QueryOptions,
    SortField,
};
