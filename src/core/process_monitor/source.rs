//! Boundary to the operating system's process table.
//!
//! The engine never talks to the OS directly. Everything it needs is behind
//! [`ProcessSource`] and [`ProcessHandle`], which keeps the refresh pipeline
//! testable with synthetic process tables.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{HostInfo, MemorySample};
use crate::error::Result;

/// Per-process field reads. Every read may fail or stall on its own.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    fn pid(&self) -> u32;

    async fn name(&self) -> Result<String>;

    /// Single-letter status code ("R", "S", "Z", ...)
    async fn status(&self) -> Result<String>;

    async fn exe(&self) -> Result<String>;

    async fn cmdline(&self) -> Result<Vec<String>>;

    async fn cpu_percent(&self) -> Result<f64>;

    async fn memory(&self) -> Result<MemorySample>;

    async fn username(&self) -> Result<String>;

    /// Creation time as Unix milliseconds
    async fn create_time(&self) -> Result<i64>;

    async fn num_threads(&self) -> Result<i32>;

    async fn num_fds(&self) -> Result<i32>;
}

/// Capability to enumerate, inspect and signal processes
#[async_trait]
pub trait ProcessSource: Send + Sync + 'static {
    /// All live PIDs. Failing here aborts the whole refresh cycle.
    async fn list_pids(&self) -> Result<Vec<u32>>;

    /// Open a handle, or `None` when the process is gone
    async fn open(&self, pid: u32) -> Option<Arc<dyn ProcessHandle>>;

    /// Re-read one process so the next `open` sees fresh values
    async fn refresh_pid(&self, _pid: u32) {}

    /// Ask the process to exit (SIGTERM or platform equivalent)
    fn terminate(&self, pid: u32) -> Result<()>;

    /// Kill the process without giving it a chance to clean up
    fn force_kill(&self, pid: u32) -> Result<()>;

    fn host_info(&self) -> HostInfo;
}
