//! In-memory [`ProcessSource`] with programmable delays and failures.
//!
//! Used by the test suites to drive the refresh pipeline with synthetic
//! process tables.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::source::{ProcessHandle, ProcessSource};
use super::types::{HostInfo, MemorySample};
use crate::error::{ProcwatchError, Result};

#[derive(Debug, Clone, Default)]
pub struct MockProcess {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub exe: String,
    pub cmdline: Vec<String>,
    pub cpu: f64,
    pub memory: MemorySample,
    pub username: String,
    pub create_time: i64,
    pub threads: i32,
    pub fds: i32,
    /// Delay applied to every field read
    pub delay: Duration,
    /// Extra delay applied to the CPU sample only
    pub cpu_delay: Duration,
    pub fail_cpu: bool,
    pub fail_memory: bool,
}

impl MockProcess {
    pub fn new(pid: u32, name: &str) -> Self {
        Self {
            pid,
            name: name.to_string(),
            status: "S".to_string(),
            username: "user".to_string(),
            threads: 1,
            ..Default::default()
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn exe(mut self, exe: &str) -> Self {
        self.exe = exe.to_string();
        self
    }

    pub fn cmdline(mut self, args: &[&str]) -> Self {
        self.cmdline = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn user(mut self, username: &str) -> Self {
        self.username = username.to_string();
        self
    }

    pub fn cpu(mut self, cpu: f64) -> Self {
        self.cpu = cpu;
        self
    }

    pub fn memory(mut self, rss_bytes: u64, percent: f32) -> Self {
        self.memory = MemorySample { rss_bytes, percent };
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn cpu_delay(mut self, delay: Duration) -> Self {
        self.cpu_delay = delay;
        self
    }

    pub fn fail_cpu(mut self) -> Self {
        self.fail_cpu = true;
        self
    }

    pub fn fail_memory(mut self) -> Self {
        self.fail_memory = true;
        self
    }
}

#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

#[derive(Default)]
pub struct MockSource {
    processes: RwLock<HashMap<u32, MockProcess>>,
    in_flight: Arc<InFlight>,
    fail_enumeration: AtomicBool,
    refuse_terminate: AtomicBool,
    refuse_kill: AtomicBool,
    list_calls: AtomicUsize,
    signals: Mutex<Vec<(u32, bool)>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processes<I>(processes: I) -> Self
    where
        I: IntoIterator<Item = MockProcess>,
    {
        let source = Self::new();
        for process in processes {
            source.insert(process);
        }
        source
    }

    pub fn insert(&self, process: MockProcess) {
        self.processes.write().insert(process.pid, process);
    }

    pub fn remove(&self, pid: u32) -> Option<MockProcess> {
        self.processes.write().remove(&pid)
    }

    /// Mutate a process in place; returns false if it does not exist
    pub fn update<F>(&self, pid: u32, change: F) -> bool
    where
        F: FnOnce(&mut MockProcess),
    {
        match self.processes.write().get_mut(&pid) {
            Some(process) => {
                change(process);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.processes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.read().is_empty()
    }

    pub fn set_fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    pub fn set_refuse_terminate(&self, refuse: bool) {
        self.refuse_terminate.store(refuse, Ordering::SeqCst);
    }

    pub fn set_refuse_kill(&self, refuse: bool) {
        self.refuse_kill.store(refuse, Ordering::SeqCst);
    }

    /// Highest number of handles that were open at the same time
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.max.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Delivered signals as (pid, forced)
    pub fn signals(&self) -> Vec<(u32, bool)> {
        self.signals.lock().clone()
    }
}

#[async_trait]
impl ProcessSource for MockSource {
    async fn list_pids(&self) -> Result<Vec<u32>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(ProcwatchError::enumeration("process table unavailable"));
        }
        Ok(self.processes.read().keys().copied().collect())
    }

    async fn open(&self, pid: u32) -> Option<Arc<dyn ProcessHandle>> {
        let process = self.processes.read().get(&pid).cloned()?;

        let current = self.in_flight.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.in_flight.max.fetch_max(current, Ordering::SeqCst);

        Some(Arc::new(MockHandle {
            process,
            in_flight: Arc::clone(&self.in_flight),
        }))
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        if !self.processes.read().contains_key(&pid) {
            return Err(ProcwatchError::ProcessNotFound(pid));
        }
        if self.refuse_terminate.load(Ordering::SeqCst) {
            return Err(ProcwatchError::termination_failed(pid, "SIGTERM ignored"));
        }
        self.processes.write().remove(&pid);
        self.signals.lock().push((pid, false));
        Ok(())
    }

    fn force_kill(&self, pid: u32) -> Result<()> {
        if !self.processes.read().contains_key(&pid) {
            return Err(ProcwatchError::ProcessNotFound(pid));
        }
        if self.refuse_kill.load(Ordering::SeqCst) {
            return Err(ProcwatchError::termination_failed(pid, "operation not permitted"));
        }
        self.processes.write().remove(&pid);
        self.signals.lock().push((pid, true));
        Ok(())
    }

    fn host_info(&self) -> HostInfo {
        HostInfo {
            hostname: "mockhost".to_string(),
            uptime: 3600,
            boot_time: 1_700_000_000,
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
        }
    }
}

struct MockHandle {
    process: MockProcess,
    in_flight: Arc<InFlight>,
}

impl MockHandle {
    async fn pause(&self) {
        if !self.process.delay.is_zero() {
            tokio::time::sleep(self.process.delay).await;
        }
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.in_flight.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessHandle for MockHandle {
    fn pid(&self) -> u32 {
        self.process.pid
    }

    async fn name(&self) -> Result<String> {
        self.pause().await;
        Ok(self.process.name.clone())
    }

    async fn status(&self) -> Result<String> {
        self.pause().await;
        Ok(self.process.status.clone())
    }

    async fn exe(&self) -> Result<String> {
        self.pause().await;
        Ok(self.process.exe.clone())
    }

    async fn cmdline(&self) -> Result<Vec<String>> {
        self.pause().await;
        Ok(self.process.cmdline.clone())
    }

    async fn cpu_percent(&self) -> Result<f64> {
        self.pause().await;
        if !self.process.cpu_delay.is_zero() {
            tokio::time::sleep(self.process.cpu_delay).await;
        }
        if self.process.fail_cpu {
            return Err(ProcwatchError::field("cpu sample failed"));
        }
        Ok(self.process.cpu)
    }

    async fn memory(&self) -> Result<MemorySample> {
        self.pause().await;
        if self.process.fail_memory {
            return Err(ProcwatchError::field("memory info unavailable"));
        }
        Ok(self.process.memory)
    }

    async fn username(&self) -> Result<String> {
        self.pause().await;
        Ok(self.process.username.clone())
    }

    async fn create_time(&self) -> Result<i64> {
        self.pause().await;
        Ok(self.process.create_time)
    }

    async fn num_threads(&self) -> Result<i32> {
        self.pause().await;
        Ok(self.process.threads)
    }

    async fn num_fds(&self) -> Result<i32> {
        self.pause().await;
        Ok(self.process.fds)
    }
}
