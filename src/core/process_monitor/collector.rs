use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::gatherer::Gatherer;
use super::types::Snapshot;

/// Runs one gather per PID with a fixed cap on how many are in flight
pub struct Collector {
    gatherer: Gatherer,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Collector {
    pub fn new(gatherer: Gatherer, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            gatherer,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn gatherer(&self) -> &Gatherer {
        &self.gatherer
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Gather every PID and assemble the results into a snapshot.
    ///
    /// Returns only after all gathers have finished. PIDs whose process
    /// vanished are left out.
    pub async fn collect(&self, pids: &[u32]) -> Snapshot {
        let mut seen = HashSet::with_capacity(pids.len());
        let mut tasks = JoinSet::new();

        for &pid in pids {
            if !seen.insert(pid) {
                continue;
            }

            // Semaphore is never closed, acquire only fails after close()
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };

            let gatherer = self.gatherer.clone();
            tasks.spawn(async move {
                let _permit = permit;
                gatherer.gather(pid).await
            });
        }

        let mut processes = Vec::with_capacity(seen.len());
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(Some(info)) => processes.push(info),
                Ok(None) => {}
                Err(e) => log::warn!("Process gather task failed: {}", e),
            }
        }

        log::debug!(
            "Collected {} of {} processes",
            processes.len(),
            seen.len()
        );

        Snapshot::new(processes)
    }
}
