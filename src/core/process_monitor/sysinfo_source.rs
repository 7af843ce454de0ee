//! [`ProcessSource`] backed by the `sysinfo` crate.
//!
//! `list_pids` refreshes CPU and memory for the whole table in one pass, since
//! sysinfo derives CPU usage from the time between two table refreshes. Every
//! other OS read is per PID and runs on the blocking pool: `open` re-reads the
//! executable, command line and owner of one process, and the thread and
//! descriptor counts come straight from `/proc`. The gatherer's deadline
//! therefore bounds all per-process OS work.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::{
    MemoryRefreshKind, Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate,
    RefreshKind, Signal, System, UpdateKind, Users,
};

use super::source::{ProcessHandle, ProcessSource};
use super::types::{HostInfo, MemorySample};
use crate::error::{ProcwatchError, Result};

/// Fields refreshed for every process once per cycle
fn enumeration_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing().with_cpu().with_memory()
}

/// Fields refreshed per PID when a handle is opened
fn detail_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing()
        .with_exe(UpdateKind::OnlyIfNotSet)
        .with_cmd(UpdateKind::OnlyIfNotSet)
        .with_user(UpdateKind::OnlyIfNotSet)
}

fn full_kind() -> ProcessRefreshKind {
    enumeration_kind()
        .with_exe(UpdateKind::OnlyIfNotSet)
        .with_cmd(UpdateKind::OnlyIfNotSet)
        .with_user(UpdateKind::OnlyIfNotSet)
}

/// Map a sysinfo status onto the single-letter codes used by `ps`
pub fn status_code(status: ProcessStatus) -> &'static str {
    match status {
        ProcessStatus::Run => "R",
        ProcessStatus::Sleep => "S",
        ProcessStatus::Idle => "I",
        ProcessStatus::Zombie => "Z",
        ProcessStatus::Stop => "T",
        ProcessStatus::Tracing => "t",
        ProcessStatus::Dead => "X",
        ProcessStatus::UninterruptibleDiskSleep => "D",
        ProcessStatus::Wakekill => "K",
        ProcessStatus::Waking => "W",
        ProcessStatus::Parked => "P",
        ProcessStatus::LockBlocked => "L",
        _ => "?",
    }
}

/// Run blocking OS work off the async workers
async fn blocking<T, F>(read: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(read)
        .await
        .map_err(|e| ProcwatchError::field(format!("blocking read failed: {}", e)))?
}

pub struct SysinfoSource {
    system: Arc<Mutex<System>>,
    users: Arc<Mutex<Users>>,
    total_memory: u64,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_memory(MemoryRefreshKind::nothing().with_ram())
            .with_processes(enumeration_kind());

        let system = System::new_with_specifics(refresh_kind);
        let total_memory = system.total_memory();

        Self {
            system: Arc::new(Mutex::new(system)),
            users: Arc::new(Mutex::new(Users::new_with_refreshed_list())),
            total_memory,
        }
    }

    /// Refresh a single PID without touching the rest of the table.
    ///
    /// Returns false when the process no longer exists.
    fn refresh_one(system: &mut System, pid: u32, kind: ProcessRefreshKind) -> bool {
        let pid = Pid::from_u32(pid);
        let updated = system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), false, kind);
        updated > 0 && system.process(pid).is_some()
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessSource for SysinfoSource {
    async fn list_pids(&self) -> Result<Vec<u32>> {
        let system = Arc::clone(&self.system);
        let users = Arc::clone(&self.users);

        // Walking the whole process table is blocking I/O
        tokio::task::spawn_blocking(move || {
            *users.lock() = Users::new_with_refreshed_list();

            let mut system = system.lock();
            system.refresh_processes_specifics(ProcessesToUpdate::All, true, enumeration_kind());
            system
                .processes()
                .keys()
                .map(|pid| pid.as_u32())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| ProcwatchError::enumeration(e.to_string()))
    }

    async fn open(&self, pid: u32) -> Option<Arc<dyn ProcessHandle>> {
        let system = Arc::clone(&self.system);
        let users = Arc::clone(&self.users);

        let facts = blocking(move || {
            let mut system = system.lock();
            if !Self::refresh_one(&mut system, pid, detail_kind()) {
                return Err(ProcwatchError::ProcessNotFound(pid));
            }

            let process = system
                .process(Pid::from_u32(pid))
                .ok_or(ProcwatchError::ProcessNotFound(pid))?;
            let username = process
                .user_id()
                .and_then(|uid| users.lock().get_user_by_id(uid).map(|u| u.name().to_string()));

            Ok(ProcessFacts::read(process, username))
        })
        .await;

        match facts {
            Ok(facts) => Some(Arc::new(SysinfoHandle {
                pid,
                facts,
                total_memory: self.total_memory,
            })),
            Err(e) => {
                log::trace!("Cannot open PID {}: {}", pid, e);
                None
            }
        }
    }

    async fn refresh_pid(&self, pid: u32) {
        let system = Arc::clone(&self.system);
        let _ = blocking(move || Ok(Self::refresh_one(&mut system.lock(), pid, full_kind()))).await;
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        let mut system = self.system.lock();
        if !Self::refresh_one(&mut system, pid, ProcessRefreshKind::nothing()) {
            return Err(ProcwatchError::ProcessNotFound(pid));
        }

        let process = system
            .process(Pid::from_u32(pid))
            .ok_or(ProcwatchError::ProcessNotFound(pid))?;

        match process.kill_with(Signal::Term) {
            Some(true) => Ok(()),
            Some(false) => Err(ProcwatchError::termination_failed(
                pid,
                "SIGTERM could not be delivered",
            )),
            None => Err(ProcwatchError::termination_failed(
                pid,
                "graceful termination is not supported on this platform",
            )),
        }
    }

    fn force_kill(&self, pid: u32) -> Result<()> {
        let mut system = self.system.lock();
        if !Self::refresh_one(&mut system, pid, ProcessRefreshKind::nothing()) {
            return Err(ProcwatchError::ProcessNotFound(pid));
        }

        let process = system
            .process(Pid::from_u32(pid))
            .ok_or(ProcwatchError::ProcessNotFound(pid))?;

        if process.kill() {
            Ok(())
        } else {
            Err(ProcwatchError::termination_failed(
                pid,
                "kill signal could not be delivered",
            ))
        }
    }

    fn host_info(&self) -> HostInfo {
        HostInfo {
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
            uptime: System::uptime(),
            boot_time: System::boot_time(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Values copied out of the shared table when a handle is opened
struct ProcessFacts {
    name: String,
    status: &'static str,
    exe: Option<String>,
    cmd: Vec<String>,
    cpu: f32,
    rss: u64,
    username: Option<String>,
    start_time: u64,
}

impl ProcessFacts {
    fn read(process: &Process, username: Option<String>) -> Self {
        Self {
            name: process.name().to_string_lossy().to_string(),
            status: status_code(process.status()),
            exe: process.exe().map(|path| path.to_string_lossy().to_string()),
            cmd: process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy().to_string())
                .collect(),
            cpu: process.cpu_usage(),
            rss: process.memory(),
            username,
            start_time: process.start_time(),
        }
    }
}

struct SysinfoHandle {
    pid: u32,
    facts: ProcessFacts,
    total_memory: u64,
}

#[async_trait]
impl ProcessHandle for SysinfoHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn name(&self) -> Result<String> {
        Ok(self.facts.name.clone())
    }

    async fn status(&self) -> Result<String> {
        Ok(self.facts.status.to_string())
    }

    async fn exe(&self) -> Result<String> {
        self.facts
            .exe
            .clone()
            .ok_or_else(|| ProcwatchError::field("executable path unavailable"))
    }

    async fn cmdline(&self) -> Result<Vec<String>> {
        Ok(self.facts.cmd.clone())
    }

    async fn cpu_percent(&self) -> Result<f64> {
        Ok(self.facts.cpu as f64)
    }

    async fn memory(&self) -> Result<MemorySample> {
        let rss = self.facts.rss;
        Ok(MemorySample {
            rss_bytes: rss,
            percent: if self.total_memory > 0 {
                (rss as f32 / self.total_memory as f32) * 100.0
            } else {
                0.0
            },
        })
    }

    async fn username(&self) -> Result<String> {
        self.facts
            .username
            .clone()
            .ok_or_else(|| ProcwatchError::field("owner unavailable"))
    }

    async fn create_time(&self) -> Result<i64> {
        Ok(self.facts.start_time as i64 * 1000)
    }

    async fn num_threads(&self) -> Result<i32> {
        let pid = self.pid;
        blocking(move || count_threads(pid)).await
    }

    async fn num_fds(&self) -> Result<i32> {
        let pid = self.pid;
        blocking(move || count_open_fds(pid)).await
    }
}

/// Value of the `Threads:` line of a `/proc/<pid>/status` document
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_thread_count(status: &str) -> Option<i32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Threads:"))
        .and_then(|value| value.trim().parse().ok())
}

#[cfg(target_os = "linux")]
fn count_threads(pid: u32) -> Result<i32> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid))?;
    parse_thread_count(&status).ok_or_else(|| ProcwatchError::field("thread count missing"))
}

#[cfg(not(target_os = "linux"))]
fn count_threads(_pid: u32) -> Result<i32> {
    Err(ProcwatchError::field(
        "thread count unavailable on this platform",
    ))
}

#[cfg(target_os = "linux")]
fn count_open_fds(pid: u32) -> Result<i32> {
    let entries = std::fs::read_dir(format!("/proc/{}/fd", pid))?;
    Ok(entries.flatten().count() as i32)
}

#[cfg(not(target_os = "linux"))]
fn count_open_fds(_pid: u32) -> Result<i32> {
    Err(ProcwatchError::field(
        "open file descriptor count unavailable on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(status_code(ProcessStatus::Zombie), "Z");
        assert_eq!(status_code(ProcessStatus::Run), "R");
        assert_eq!(status_code(ProcessStatus::Sleep), "S");
    }

    #[test]
    fn test_parse_thread_count() {
        let status = "Name:\tcargo\nState:\tS (sleeping)\nThreads:\t12\nVmRSS:\t1024 kB\n";
        assert_eq!(parse_thread_count(status), Some(12));
        assert_eq!(parse_thread_count("Name:\tcargo\n"), None);
    }

    #[tokio::test]
    async fn test_lists_current_process() {
        let source = SysinfoSource::new();
        let pids = source.list_pids().await.unwrap();
        assert!(pids.contains(&std::process::id()));
    }

    #[tokio::test]
    async fn test_open_current_process() {
        let source = SysinfoSource::new();
        source.list_pids().await.unwrap();

        let handle = source.open(std::process::id()).await;
        assert!(handle.is_some());
        let handle = handle.unwrap();
        assert!(!handle.name().await.unwrap().is_empty());
        assert!(!handle.cmdline().await.unwrap().is_empty());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_thread_count_includes_main_thread() {
        fn kernel_threads() -> i32 {
            let status = std::fs::read_to_string("/proc/self/status").unwrap();
            parse_thread_count(&status).unwrap()
        }

        let source = SysinfoSource::new();
        source.list_pids().await.unwrap();
        let handle = source.open(std::process::id()).await.unwrap();

        // Other tests start and stop threads; retry until the count holds still
        for _ in 0..10 {
            let before = kernel_threads();
            let counted = handle.num_threads().await.unwrap();
            let after = kernel_threads();
            if before == after {
                assert_eq!(counted, before);
                return;
            }
        }
        panic!("thread count never settled");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_open_file_count_is_read() {
        let source = SysinfoSource::new();
        source.list_pids().await.unwrap();
        let handle = source.open(std::process::id()).await.unwrap();

        // stdin, stdout and stderr at the very least
        assert!(handle.num_fds().await.unwrap() >= 3);
    }

    #[tokio::test]
    async fn test_gathers_current_process_from_os() {
        use crate::core::process_monitor::blacklist::Blacklist;
        use crate::core::process_monitor::gatherer::Gatherer;
        use crate::platform::LinuxClassifier;
        use std::time::Duration;

        let source = Arc::new(SysinfoSource::new());
        source.list_pids().await.unwrap();

        let gatherer = Gatherer::new(
            Arc::clone(&source) as Arc<dyn ProcessSource>,
            Arc::new(Blacklist::new(Vec::new())),
            Arc::new(LinuxClassifier),
            Duration::from_secs(2),
            Duration::from_secs(1),
        );
        let info = gatherer.gather(std::process::id()).await.unwrap();

        assert!(!info.name.is_empty());
        assert!(!info.cmdline.is_empty());
        assert!(!info.partial_data);
        if cfg!(target_os = "linux") {
            assert!(info.num_threads >= 1);
            assert!(info.num_fds >= 3);
        }
    }

    #[tokio::test]
    async fn test_open_invalid_pid_returns_none() {
        let source = SysinfoSource::new();
        source.list_pids().await.unwrap();
        assert!(source.open(999_999_999).await.is_none());
    }

    #[test]
    fn test_terminate_invalid_pid_is_not_found() {
        let source = SysinfoSource::new();
        let err = source.terminate(999_999_999).unwrap_err();
        assert!(err.is_not_found());
    }
}
