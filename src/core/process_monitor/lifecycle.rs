//! Starts and stops the periodic refresh as the process view comes and goes.
//!
//! Every activation gets its own stop channel and generation number. A loop
//! left over from an earlier activation can neither be stopped by nor publish
//! into a later one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::engine::ProcessEngine;
use crate::error::{ProcwatchError, Result};

/// Generation value meaning "no activation"
const INACTIVE: u64 = 0;

struct Activation {
    generation: u64,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct RefreshController {
    engine: Arc<ProcessEngine>,
    runtime: Handle,
    period: Duration,
    activation: Mutex<Option<Activation>>,
    active_generation: Arc<AtomicU64>,
    next_generation: AtomicU64,
    shutdown_tx: broadcast::Sender<()>,
    shut_down: AtomicBool,
}

impl RefreshController {
    pub fn new(engine: Arc<ProcessEngine>, runtime: Handle, period: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        Self {
            engine,
            runtime,
            period,
            activation: Mutex::new(None),
            active_generation: Arc::new(AtomicU64::new(INACTIVE)),
            next_generation: AtomicU64::new(INACTIVE),
            shutdown_tx,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.activation.lock().is_some()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Inactive -> Active: refresh now, then every period.
    ///
    /// Returns false if already active or shut down.
    pub fn on_view_enter(&self) -> bool {
        if self.is_shut_down() {
            log::warn!("Ignoring view enter after shutdown");
            return false;
        }

        let mut activation = self.activation.lock();
        if activation.is_some() {
            log::debug!("Process view already active");
            return false;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.active_generation.store(generation, Ordering::SeqCst);

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = self.runtime.spawn(refresh_loop(
            Arc::clone(&self.engine),
            self.period,
            generation,
            Arc::clone(&self.active_generation),
            stop_rx,
            self.shutdown_tx.subscribe(),
        ));

        *activation = Some(Activation {
            generation,
            stop_tx,
            task,
        });

        log::info!(
            "Process view active (activation {}), refreshing every {:?}",
            generation,
            self.period
        );
        true
    }

    /// Active -> Inactive. A cycle already running finishes but is not published.
    pub fn on_view_leave(&self) -> bool {
        let Some(activation) = self.activation.lock().take() else {
            return false;
        };

        let _ = self.active_generation.compare_exchange(
            activation.generation,
            INACTIVE,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        let _ = activation.stop_tx.send(());

        log::info!("Process view inactive (activation {})", activation.generation);
        true
    }

    /// One-shot refresh in the background, independent of the ticker.
    ///
    /// Returns false without refreshing after shutdown.
    pub fn force_refresh(&self) -> bool {
        if self.is_shut_down() {
            log::warn!("Ignoring forced refresh after shutdown");
            return false;
        }

        let engine = Arc::clone(&self.engine);
        self.runtime.spawn(async move {
            if let Err(e) = engine.refresh().await {
                log::warn!("Forced refresh failed: {}", e);
            }
        });
        true
    }

    /// One-shot refresh, awaited
    pub async fn refresh_now(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(ProcwatchError::runtime("refresh controller is shut down"));
        }
        self.engine.refresh().await.map(|_| ())
    }

    /// Stop every refresh loop for good
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.active_generation.store(INACTIVE, Ordering::SeqCst);
        // send() only fails if no loop is subscribed
        let _ = self.shutdown_tx.send(());

        if let Some(activation) = self.activation.lock().take() {
            activation.task.abort();
        }

        log::info!("Refresh controller shut down");
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        if let Some(activation) = self.activation.get_mut().take() {
            activation.task.abort();
        }
    }
}

async fn refresh_loop(
    engine: Arc<ProcessEngine>,
    period: Duration,
    generation: u64,
    active_generation: Arc<AtomicU64>,
    mut stop_rx: oneshot::Receiver<()>,
    mut shutdown: broadcast::Receiver<()>,
) {
    // First tick fires immediately
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let still_active = || active_generation.load(Ordering::SeqCst) == generation;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !still_active() {
                    break;
                }
                if let Err(e) = engine.refresh_if(still_active).await {
                    log::warn!("Refresh cycle failed: {}", e);
                }
            }
            _ = &mut stop_rx => {
                log::debug!("Refresh loop for activation {} stopped", generation);
                break;
            }
            _ = shutdown.recv() => {
                log::debug!("Refresh loop for activation {} shutting down", generation);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::core::process_monitor::source::ProcessSource;
    use crate::core::process_monitor::testing::{MockProcess, MockSource};
    use crate::core::process_monitor::types::EngineEvent;
    use crate::platform::LinuxClassifier;
    use tokio::sync::broadcast::error::TryRecvError;

    fn controller(source: &Arc<MockSource>) -> RefreshController {
        let engine = Arc::new(ProcessEngine::new(
            Arc::clone(source) as Arc<dyn ProcessSource>,
            Arc::new(LinuxClassifier),
            &EngineConfig::default(),
        ));
        RefreshController::new(engine, Handle::current(), Duration::from_secs(10))
    }

    fn source() -> Arc<MockSource> {
        Arc::new(MockSource::with_processes(vec![
            MockProcess::new(1, "init"),
            MockProcess::new(2, "shell"),
        ]))
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_refreshes_immediately_then_ticks() {
        let source = source();
        let controller = controller(&source);
        let mut events = controller.engine.subscribe();

        assert!(controller.on_view_enter());
        let first = events.recv().await.unwrap();
        assert_eq!(first.name(), EngineEvent::UPDATE);

        let second = tokio::time::timeout(Duration::from_secs(11), events.recv()).await;
        assert!(matches!(second, Ok(Ok(_))));
        assert_eq!(source.list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_stops_events() {
        let source = source();
        let controller = controller(&source);
        let mut events = controller.engine.subscribe();

        controller.on_view_enter();
        events.recv().await.unwrap();

        assert!(controller.on_view_leave());
        tokio::time::sleep(Duration::from_secs(15)).await;
        settle().await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        // Re-entering produces exactly one immediate event
        assert!(controller.on_view_enter());
        events.recv().await.unwrap();
        settle().await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_enter_is_noop() {
        let source = source();
        let controller = controller(&source);

        assert!(controller.on_view_enter());
        assert!(!controller.on_view_enter());
        assert!(controller.is_active());
        assert!(controller.on_view_leave());
        assert!(!controller.on_view_leave());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_and_blocks_reentry() {
        let source = source();
        let controller = controller(&source);
        let mut events = controller.engine.subscribe();

        controller.on_view_enter();
        events.recv().await.unwrap();

        controller.shutdown();
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;

        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert!(!controller.on_view_enter());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_refresh_after_shutdown() {
        let source = source();
        let controller = controller(&source);
        let mut events = controller.engine.subscribe();

        controller.shutdown();

        assert!(!controller.force_refresh());
        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        let err = controller.refresh_now().await.unwrap_err();
        assert!(matches!(err, ProcwatchError::Runtime(_)));
        assert!(controller.engine.current().is_empty());
        assert_eq!(source.list_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_works_while_inactive() {
        let source = source();
        let controller = controller(&source);

        controller.refresh_now().await.unwrap();
        assert_eq!(controller.engine.current().len(), 2);
        assert!(!controller.is_active());
    }
}
