//! Concurrent process inventory with snapshot diffing.
//!
//! A refresh cycle enumerates PIDs, gathers each one under a bounded
//! concurrency limit and per-process deadline, diffs the result against the
//! previous snapshot and publishes an [`EngineEvent`] to subscribers.

pub mod blacklist;
pub mod collector;
pub mod diff;
pub mod engine;
pub mod gatherer;
pub mod kill;
pub mod lifecycle;
pub mod query;
pub mod service;
pub mod snapshot_store;
pub mod source;
pub mod sysinfo_source;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod types;

pub use blacklist::{Blacklist, BlacklistEntry};
pub use collector::Collector;
pub use diff::DiffPolicy;
pub use engine::ProcessEngine;
pub use gatherer::Gatherer;
pub use kill::KillExecutor;
pub use lifecycle::RefreshController;
pub use query::{query, QueryOptions, QueryResult, SortField};
pub use service::{PluginLifecycle, ProcessManager};
pub use snapshot_store::SnapshotStore;
pub use source::{ProcessHandle, ProcessSource};
pub use sysinfo_source::SysinfoSource;
pub use types::{
    EngineEvent, HostInfo, KillOutcome, MemorySample, ProcessInfo, ProcessUpdateEvent, Snapshot,
    SystemInfo,
};
