//! One refresh cycle: enumerate, collect, diff, commit, publish.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;

use super::blacklist::Blacklist;
use super::collector::Collector;
use super::diff::DiffPolicy;
use super::gatherer::Gatherer;
use super::snapshot_store::SnapshotStore;
use super::source::ProcessSource;
use super::types::{EngineEvent, ProcessInfo, ProcessUpdateEvent, Snapshot};
use crate::core::config::EngineConfig;
use crate::error::{ProcwatchError, Result};
use crate::platform::SystemProcessClassifier;

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct ProcessEngine {
    source: Arc<dyn ProcessSource>,
    collector: Collector,
    blacklist: Arc<Blacklist>,
    store: SnapshotStore,
    policy: DiffPolicy,
    events_tx: broadcast::Sender<EngineEvent>,
    /// Serializes refresh cycles so commits never interleave
    cycle: Mutex<()>,
}

impl ProcessEngine {
    pub fn new(
        source: Arc<dyn ProcessSource>,
        classifier: Arc<dyn SystemProcessClassifier>,
        config: &EngineConfig,
    ) -> Self {
        let blacklist = Arc::new(Blacklist::new(config.zombie_name_patterns.clone()));
        let gatherer = Gatherer::new(
            Arc::clone(&source),
            Arc::clone(&blacklist),
            classifier,
            config.process_timeout(),
            config.cpu_timeout(),
        );
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            source,
            collector: Collector::new(gatherer, config.max_concurrent),
            blacklist,
            store: SnapshotStore::new(),
            policy: DiffPolicy::from_config(config),
            events_tx,
            cycle: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &Arc<dyn ProcessSource> {
        &self.source
    }

    pub fn blacklist(&self) -> &Arc<Blacklist> {
        &self.blacklist
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        // send() only fails when nobody is listening
        let _ = self.events_tx.send(event);
    }

    /// Gather one process straight from the source, bypassing the snapshot
    pub async fn gather_fresh(&self, pid: u32) -> Option<ProcessInfo> {
        self.source.refresh_pid(pid).await;
        self.collector.gatherer().gather(pid).await
    }

    /// Run a cycle and always commit its result
    pub async fn refresh(&self) -> Result<Option<ProcessUpdateEvent>> {
        self.refresh_if(|| true).await
    }

    /// Run a cycle; commit and publish only if `still_wanted()` holds once
    /// collection has finished.
    ///
    /// Returns `Ok(None)` when the result was discarded. An enumeration
    /// failure leaves the current snapshot in place.
    pub async fn refresh_if<F>(&self, still_wanted: F) -> Result<Option<ProcessUpdateEvent>>
    where
        F: Fn() -> bool,
    {
        let _cycle = self.cycle.lock().await;
        let started = Instant::now();

        let pids = match self.source.list_pids().await {
            Ok(pids) => pids,
            Err(e) => {
                let e = match e {
                    ProcwatchError::Enumeration(_) => e,
                    other => ProcwatchError::enumeration(other.to_string()),
                };
                log::error!("Refresh cycle aborted: {}", e);
                self.emit(EngineEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let snapshot = self.collector.collect(&pids).await;

        if !still_wanted() {
            log::debug!(
                "Discarding refresh of {} processes, view no longer active",
                snapshot.len()
            );
            return Ok(None);
        }

        // Only cycles write the store and they hold `cycle`, so `current()`
        // is still the snapshot this one replaces
        let previous = self.store.current();
        let event = self.policy.diff(&previous, &snapshot);
        let live: HashSet<u32> = snapshot.pids().collect();

        self.store.swap(snapshot);
        self.blacklist.sweep(&live);

        log::debug!(
            "Refresh cycle finished in {:?} ({} processes, full: {})",
            started.elapsed(),
            live.len(),
            event.is_full()
        );

        self.emit(EngineEvent::ProcessUpdate(event.clone()));
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::process_monitor::testing::{MockProcess, MockSource};
    use crate::platform::LinuxClassifier;

    fn engine(source: &Arc<MockSource>) -> ProcessEngine {
        ProcessEngine::new(
            Arc::clone(source) as Arc<dyn ProcessSource>,
            Arc::new(LinuxClassifier),
            &EngineConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_refresh_is_full_then_incremental() {
        let source = Arc::new(MockSource::with_processes(vec![
            MockProcess::new(1, "init").cpu(0.5),
            MockProcess::new(2, "shell").cpu(1.0),
        ]));
        let engine = engine(&source);

        let event = engine.refresh().await.unwrap().unwrap();
        assert!(event.is_full());

        source.update(2, |p| p.cpu = 40.0);
        source.insert(MockProcess::new(3, "editor"));
        source.remove(1);

        match engine.refresh().await.unwrap().unwrap() {
            ProcessUpdateEvent::Incremental {
                added,
                updated,
                removed,
            } => {
                assert_eq!(added.len(), 1);
                assert_eq!(added[0].pid, 3);
                assert_eq!(updated.len(), 1);
                assert_eq!(updated[0].pid, 2);
                assert_eq!(removed, vec![1]);
            }
            other => panic!("expected incremental event, got {:?}", other),
        }
        assert_eq!(engine.current().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_rotates_store_against_diffed_snapshot() {
        let source = Arc::new(MockSource::with_processes(vec![MockProcess::new(1, "init")]));
        let engine = engine(&source);

        engine.refresh().await.unwrap();
        let first = engine.current();

        source.insert(MockProcess::new(2, "shell"));
        let event = engine.refresh().await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&engine.store().previous(), &first));
        assert_eq!(engine.current().len(), 2);
        match event {
            ProcessUpdateEvent::Incremental { added, removed, .. } => {
                assert_eq!(added.len(), 1);
                assert_eq!(added[0].pid, 2);
                assert!(removed.is_empty());
            }
            other => panic!("expected incremental event, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enumeration_failure_keeps_snapshot() {
        let source = Arc::new(MockSource::with_processes(vec![MockProcess::new(1, "init")]));
        let engine = engine(&source);
        engine.refresh().await.unwrap();

        let mut events = engine.subscribe();
        source.set_fail_enumeration(true);

        let err = engine.refresh().await.unwrap_err();
        assert!(matches!(err, ProcwatchError::Enumeration(_)));
        assert_eq!(engine.current().len(), 1);

        let event = events.try_recv().unwrap();
        assert_eq!(event.name(), EngineEvent::ERROR);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discarded_cycle_does_not_commit() {
        let source = Arc::new(MockSource::with_processes(vec![MockProcess::new(1, "init")]));
        let engine = engine(&source);
        let mut events = engine.subscribe();

        let result = engine.refresh_if(|| false).await.unwrap();
        assert!(result.is_none());
        assert!(engine.current().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zombie_blacklist_survives_cycles() {
        let source = Arc::new(MockSource::with_processes(vec![
            MockProcess::new(1, "init"),
            MockProcess::new(9, "reaped").status("Z"),
        ]));
        let engine = engine(&source);

        engine.refresh().await.unwrap();
        assert!(engine.blacklist().should_skip_cpu(9));

        let zombie = engine.current().get(9).cloned().unwrap();
        assert!(zombie.partial_data);
        assert!(!zombie.error_reason.is_empty());
        assert_eq!(zombie.cpu_percent, 0.0);
        assert_eq!(zombie.memory_percent, 0.0);

        // Reaped: the entry ages out after two cycles without the PID
        source.remove(9);
        engine.refresh().await.unwrap();
        assert!(engine.blacklist().should_skip_cpu(9));
        engine.refresh().await.unwrap();
        assert!(!engine.blacklist().should_skip_cpu(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gather_fresh_reads_source() {
        let source = Arc::new(MockSource::with_processes(vec![MockProcess::new(4, "vim")]));
        let engine = engine(&source);

        let info = engine.gather_fresh(4).await.unwrap();
        assert_eq!(info.name, "vim");
        assert!(engine.current().is_empty());
        assert!(engine.gather_fresh(5).await.is_none());
    }
}
