use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Single-letter status code of a zombie process
pub const STATUS_ZOMBIE: &str = "Z";

/// Reason attached to records cut short because the process is a zombie
pub const ZOMBIE_REASON: &str = "zombie process";

/// Best-effort view of one process at one instant.
///
/// Fields that could not be read keep their zero value. When the record was
/// deliberately cut short `partial_data` is set and `error_reason` says why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub exe_path: String,
    pub cmdline: String,
    pub cpu_percent: f64,
    pub memory_percent: f32,
    pub memory_bytes: u64,
    pub memory_mb: f64,
    pub status: String,
    pub username: String,
    pub create_time: i64, // Unix timestamp (ms)
    pub num_threads: i32,
    pub num_fds: i32,
    pub is_system: bool,
    pub partial_data: bool,
    pub error_reason: String,
}

impl ProcessInfo {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            ..Default::default()
        }
    }

    /// Flag the record as incomplete. `reason` must be non-empty.
    pub fn mark_partial<S: Into<String>>(&mut self, reason: S) {
        let reason = reason.into();
        debug_assert!(!reason.is_empty());
        self.partial_data = true;
        self.error_reason = reason;
    }

    pub fn is_zombie(&self) -> bool {
        self.status == STATUS_ZOMBIE
    }

    pub fn set_memory_bytes(&mut self, bytes: u64) {
        self.memory_bytes = bytes;
        self.memory_mb = bytes as f64 / (1024.0 * 1024.0);
    }
}

/// Resident memory of one process
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemorySample {
    pub rss_bytes: u64,
    pub percent: f32,
}

/// Immutable PID -> ProcessInfo mapping captured by one refresh cycle
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    processes: HashMap<u32, ProcessInfo>,
    taken_at: i64, // Unix timestamp (ms)
}

impl Snapshot {
    /// Build a snapshot. A later record for an already seen PID replaces the earlier one.
    pub fn new<I>(processes: I) -> Self
    where
        I: IntoIterator<Item = ProcessInfo>,
    {
        Self {
            processes: processes.into_iter().map(|p| (p.pid, p)).collect(),
            taken_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessInfo> {
        self.processes.get(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.processes.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn pids(&self) -> impl Iterator<Item = u32> + '_ {
        self.processes.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessInfo> {
        self.processes.values()
    }

    pub fn taken_at(&self) -> i64 {
        self.taken_at
    }

    /// All records ordered by PID
    pub fn to_sorted_vec(&self) -> Vec<ProcessInfo> {
        let mut list: Vec<_> = self.processes.values().cloned().collect();
        list.sort_by_key(|p| p.pid);
        list
    }
}

/// Change set between two consecutive snapshots.
///
/// Serialized with a `type` tag of `incremental` or `full`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ProcessUpdateEvent {
    Incremental {
        added: Vec<ProcessInfo>,
        updated: Vec<ProcessInfo>,
        removed: Vec<u32>,
    },
    Full {
        full_list: Vec<ProcessInfo>,
    },
}

impl ProcessUpdateEvent {
    pub fn is_full(&self) -> bool {
        matches!(self, ProcessUpdateEvent::Full { .. })
    }

    /// True for an incremental event that carries no change at all
    pub fn is_noop(&self) -> bool {
        match self {
            ProcessUpdateEvent::Incremental {
                added,
                updated,
                removed,
            } => added.is_empty() && updated.is_empty() && removed.is_empty(),
            ProcessUpdateEvent::Full { .. } => false,
        }
    }
}

/// Outcome of a kill request, published after the call returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillOutcome {
    pub pid: u32,
    pub force: bool,
    pub success: bool,
    pub error: Option<String>,
}

/// Events published to the view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum EngineEvent {
    #[serde(rename = "process:update")]
    ProcessUpdate(ProcessUpdateEvent),
    #[serde(rename = "process:killed")]
    KillCompleted(KillOutcome),
    #[serde(rename = "process:error")]
    Error { message: String },
}

impl EngineEvent {
    pub const UPDATE: &'static str = "process:update";
    pub const KILLED: &'static str = "process:killed";
    pub const ERROR: &'static str = "process:error";

    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::ProcessUpdate(_) => Self::UPDATE,
            EngineEvent::KillCompleted(_) => Self::KILLED,
            EngineEvent::Error { .. } => Self::ERROR,
        }
    }
}

/// Host-level facts reported by the process source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub hostname: String,
    pub uptime: u64,    // seconds
    pub boot_time: u64, // Unix timestamp (s)
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub hostname: String,
    pub uptime: u64,
    pub boot_time: u64,
    pub proc_count: usize,
    pub os: String,
    pub arch: String,
}

impl SystemInfo {
    pub fn from_host(host: HostInfo, proc_count: usize) -> Self {
        Self {
            hostname: host.hostname,
            uptime: host.uptime,
            boot_time: host.boot_time,
            proc_count,
            os: host.os,
            arch: host.arch,
        }
    }
}
