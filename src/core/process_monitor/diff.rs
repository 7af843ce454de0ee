//! Snapshot comparison.
//!
//! Produces the smallest event that brings a view holding `previous` up to
//! `current`, falling back to a full list when the table churned heavily.

use super::types::{ProcessInfo, ProcessUpdateEvent, Snapshot};
use crate::core::config::EngineConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct DiffPolicy {
    pub cpu_threshold: f64,
    pub memory_threshold: f32,
    /// More added or removed processes than this yields a full event
    pub full_refresh_threshold: usize,
}

impl Default for DiffPolicy {
    fn default() -> Self {
        Self {
            cpu_threshold: 1.0,
            memory_threshold: 0.5,
            full_refresh_threshold: 50,
        }
    }
}

impl DiffPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            cpu_threshold: config.cpu_change_threshold,
            memory_threshold: config.memory_change_threshold,
            full_refresh_threshold: config.full_refresh_threshold,
        }
    }

    /// True when the change is large enough to be worth sending.
    /// Jitter below the thresholds is ignored.
    pub fn has_changed(&self, old: &ProcessInfo, new: &ProcessInfo) -> bool {
        (old.cpu_percent - new.cpu_percent).abs() > self.cpu_threshold
            || (old.memory_percent - new.memory_percent).abs() > self.memory_threshold
            || old.status != new.status
    }

    pub fn diff(&self, previous: &Snapshot, current: &Snapshot) -> ProcessUpdateEvent {
        let mut added = Vec::new();
        let mut updated = Vec::new();

        for info in current.iter() {
            match previous.get(info.pid) {
                None => added.push(info.clone()),
                Some(old) if self.has_changed(old, info) => updated.push(info.clone()),
                Some(_) => {}
            }
        }

        let mut removed: Vec<u32> = previous.pids().filter(|pid| !current.contains(*pid)).collect();

        if previous.is_empty()
            || added.len() > self.full_refresh_threshold
            || removed.len() > self.full_refresh_threshold
        {
            return ProcessUpdateEvent::Full {
                full_list: current.to_sorted_vec(),
            };
        }

        added.sort_by_key(|p| p.pid);
        updated.sort_by_key(|p| p.pid);
        removed.sort_unstable();

        ProcessUpdateEvent::Incremental {
            added,
            updated,
            removed,
        }
    }
}
