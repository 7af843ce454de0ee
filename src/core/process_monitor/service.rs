//! API surface consumed by the process view and the host plugin framework.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast;

use super::engine::ProcessEngine;
use super::kill::KillExecutor;
use super::lifecycle::RefreshController;
use super::query::{query, QueryOptions, QueryResult};
use super::source::ProcessSource;
use super::sysinfo_source::SysinfoSource;
use super::types::{EngineEvent, KillOutcome, ProcessInfo, Snapshot, SystemInfo};
use crate::core::config::EngineConfig;
use crate::error::{ProcwatchError, Result};
use crate::platform::{platform_classifier, SystemProcessClassifier};

/// Hooks the host framework calls over the plugin's lifetime
pub trait PluginLifecycle {
    fn init(&self) -> Result<()>;
    fn service_startup(&self) -> Result<()>;
    fn service_shutdown(&self) -> Result<()>;
    fn on_view_enter(&self);
    fn on_view_leave(&self);
}

pub struct ProcessManager {
    config: EngineConfig,
    engine: Arc<ProcessEngine>,
    controller: RefreshController,
    killer: KillExecutor,
    started: AtomicBool,
}

impl ProcessManager {
    pub fn new(source: Arc<dyn ProcessSource>, config: EngineConfig, runtime: Handle) -> Self {
        let classifier: Arc<dyn SystemProcessClassifier> = Arc::from(platform_classifier());
        Self::with_classifier(source, classifier, config, runtime)
    }

    pub fn with_classifier(
        source: Arc<dyn ProcessSource>,
        classifier: Arc<dyn SystemProcessClassifier>,
        config: EngineConfig,
        runtime: Handle,
    ) -> Self {
        let engine = Arc::new(ProcessEngine::new(Arc::clone(&source), classifier, &config));
        let controller =
            RefreshController::new(Arc::clone(&engine), runtime, config.refresh_interval());

        Self {
            config,
            engine,
            controller,
            killer: KillExecutor::new(source),
            started: AtomicBool::new(false),
        }
    }

    /// Manager backed by the operating system's process table
    pub fn with_sysinfo(config: EngineConfig, runtime: Handle) -> Self {
        Self::new(Arc::new(SysinfoSource::new()), config, runtime)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.engine.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.engine.current()
    }

    pub fn is_active(&self) -> bool {
        self.controller.is_active()
    }

    /// Filter, sort and page the current snapshot
    pub fn get_processes(&self, options: &QueryOptions) -> Result<QueryResult> {
        if self.controller.is_shut_down() {
            return Err(ProcwatchError::runtime("process service is shut down"));
        }
        Ok(query(&self.engine.current(), options))
    }

    /// Fresh read of one process, never served from the snapshot
    pub async fn get_process_detail(&self, pid: u32) -> Result<ProcessInfo> {
        self.engine
            .gather_fresh(pid)
            .await
            .ok_or(ProcwatchError::ProcessNotFound(pid))
    }

    pub fn kill_process(&self, pid: u32) -> Result<()> {
        let result = self.killer.kill(pid);
        self.publish_kill(pid, false, &result);
        result
    }

    pub fn force_kill_process(&self, pid: u32) -> Result<()> {
        let result = self.killer.force_kill(pid);
        self.publish_kill(pid, true, &result);
        result
    }

    fn publish_kill(&self, pid: u32, force: bool, result: &Result<()>) {
        if let Err(e) = result {
            log::warn!("Kill of PID {} failed: {}", pid, e);
        }

        self.engine.emit(EngineEvent::KillCompleted(KillOutcome {
            pid,
            force,
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        }));
    }

    /// Fire-and-forget refresh; ignored once the service has shut down
    pub fn force_refresh(&self) {
        self.controller.force_refresh();
    }

    pub async fn refresh_now(&self) -> Result<()> {
        self.controller.refresh_now().await
    }

    pub fn get_system_info(&self) -> SystemInfo {
        let host = self.engine.source().host_info();
        SystemInfo::from_host(host, self.engine.current().len())
    }
}

impl PluginLifecycle for ProcessManager {
    fn init(&self) -> Result<()> {
        self.config
            .validate()
            .map_err(|e| ProcwatchError::config(e.to_string()))?;
        log::debug!("Process manager initialized: {:?}", self.config);
        Ok(())
    }

    fn service_startup(&self) -> Result<()> {
        if self.controller.is_shut_down() {
            return Err(ProcwatchError::runtime("process service is shut down"));
        }
        if !self.started.swap(true, Ordering::SeqCst) {
            log::info!(
                "Process service started (max {} concurrent gathers)",
                self.config.max_concurrent
            );
        }
        Ok(())
    }

    fn service_shutdown(&self) -> Result<()> {
        self.controller.shutdown();
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn on_view_enter(&self) {
        self.controller.on_view_enter();
    }

    fn on_view_leave(&self) {
        self.controller.on_view_leave();
    }
}
