// procwatch Library - Public API

// Re-export error types
pub mod error;
pub use error::{ProcwatchError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod platform;
pub mod ui;

// Re-export commonly used types
pub use core::config::EngineConfig;
pub use core::process_monitor::{PluginLifecycle, ProcessManager};

// Initialize logging; RUST_LOG still wins over the default level
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
