//! Per-PID circuit breaker for expensive or unreliable field reads.
//!
//! Once a field read for a PID times out or fails, the PID is flagged and later
//! cycles skip that read. Flags are sticky while the PID keeps showing up;
//! [`Blacklist::sweep`] drops entries whose PID has been missing from two
//! consecutive snapshots so a reused PID starts clean.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

/// Consecutive sweeps a PID may be absent before its entry is dropped
const ABSENT_SWEEPS_BEFORE_PURGE: u8 = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlacklistEntry {
    pub skip_cpu: Option<String>,
    pub skip_memory: Option<String>,
    /// Reserved: skip every expensive read
    pub skip_all: Option<String>,
    absent_sweeps: u8,
}

pub struct Blacklist {
    entries: RwLock<HashMap<u32, BlacklistEntry>>,
    zombie_patterns: Vec<String>,
}

impl Blacklist {
    /// Create an empty blacklist with the given zombie name substrings
    pub fn new(zombie_patterns: Vec<String>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            zombie_patterns: zombie_patterns
                .into_iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    pub fn should_skip_cpu(&self, pid: u32) -> bool {
        self.entries
            .read()
            .get(&pid)
            .is_some_and(|e| e.skip_cpu.is_some() || e.skip_all.is_some())
    }

    pub fn should_skip_memory(&self, pid: u32) -> bool {
        self.entries
            .read()
            .get(&pid)
            .is_some_and(|e| e.skip_memory.is_some() || e.skip_all.is_some())
    }

    pub fn should_skip_all(&self, pid: u32) -> bool {
        self.entries
            .read()
            .get(&pid)
            .is_some_and(|e| e.skip_all.is_some())
    }

    pub fn mark_skip_cpu<S: Into<String>>(&self, pid: u32, reason: S) {
        let reason = reason.into();
        log::debug!("Skipping CPU sampling for PID {}: {}", pid, reason);
        self.entries.write().entry(pid).or_default().skip_cpu = Some(reason);
    }

    pub fn mark_skip_memory<S: Into<String>>(&self, pid: u32, reason: S) {
        let reason = reason.into();
        log::debug!("Skipping memory reads for PID {}: {}", pid, reason);
        self.entries.write().entry(pid).or_default().skip_memory = Some(reason);
    }

    pub fn mark_skip_all<S: Into<String>>(&self, pid: u32, reason: S) {
        let reason = reason.into();
        log::debug!("Skipping expensive reads for PID {}: {}", pid, reason);
        self.entries.write().entry(pid).or_default().skip_all = Some(reason);
    }

    /// Check a process name against the known zombie patterns
    pub fn is_zombie_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.zombie_patterns.iter().any(|p| name.contains(p.as_str()))
    }

    pub fn entry(&self, pid: u32) -> Option<BlacklistEntry> {
        self.entries.read().get(&pid).cloned()
    }

    /// Age out entries against the PIDs of a freshly committed snapshot.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, live_pids: &HashSet<u32>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();

        entries.retain(|pid, entry| {
            if live_pids.contains(pid) {
                entry.absent_sweeps = 0;
                true
            } else {
                entry.absent_sweeps += 1;
                entry.absent_sweeps < ABSENT_SWEEPS_BEFORE_PURGE
            }
        });

        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("Purged {} blacklist entries for exited processes", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
