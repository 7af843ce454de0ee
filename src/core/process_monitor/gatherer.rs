//! Turns one PID into a best-effort [`ProcessInfo`] under a time budget.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use super::blacklist::Blacklist;
use super::source::ProcessSource;
use super::types::{ProcessInfo, ZOMBIE_REASON};
use crate::error::Result;
use crate::platform::SystemProcessClassifier;

const TIMEOUT_REASON: &str = "gather timed out";

/// Reads fields against one shared deadline and remembers whether it ran out
struct FieldReader {
    deadline: Instant,
    timed_out: bool,
}

impl FieldReader {
    async fn read<T, F>(&mut self, read: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout_at(self.deadline, read).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(_)) => None,
            Err(_) => {
                self.timed_out = true;
                None
            }
        }
    }
}

#[derive(Clone)]
pub struct Gatherer {
    source: Arc<dyn ProcessSource>,
    blacklist: Arc<Blacklist>,
    classifier: Arc<dyn SystemProcessClassifier>,
    process_timeout: Duration,
    cpu_timeout: Duration,
}

impl Gatherer {
    pub fn new(
        source: Arc<dyn ProcessSource>,
        blacklist: Arc<Blacklist>,
        classifier: Arc<dyn SystemProcessClassifier>,
        process_timeout: Duration,
        cpu_timeout: Duration,
    ) -> Self {
        Self {
            source,
            blacklist,
            classifier,
            process_timeout,
            cpu_timeout,
        }
    }

    pub fn blacklist(&self) -> &Arc<Blacklist> {
        &self.blacklist
    }

    /// Gather one process. `None` means the process could not be opened.
    pub async fn gather(&self, pid: u32) -> Option<ProcessInfo> {
        let deadline = Instant::now() + self.process_timeout;

        let handle = match timeout_at(deadline, self.source.open(pid)).await {
            Ok(Some(handle)) => handle,
            Ok(None) => return None,
            Err(_) => {
                log::debug!("Timed out opening PID {}", pid);
                return None;
            }
        };

        let mut reader = FieldReader {
            deadline,
            timed_out: false,
        };
        let mut info = ProcessInfo::new(pid);

        if let Some(name) = reader.read(handle.name()).await {
            info.name = name;
        }
        if self.blacklist.is_zombie_name(&info.name) {
            info.mark_partial(ZOMBIE_REASON);
            return Some(info);
        }

        if let Some(status) = reader.read(handle.status()).await {
            info.status = status;
        }
        if info.is_zombie() {
            self.blacklist.mark_skip_cpu(pid, ZOMBIE_REASON);
            self.blacklist.mark_skip_memory(pid, ZOMBIE_REASON);
            info.mark_partial(ZOMBIE_REASON);
            return Some(info);
        }

        if let Some(exe) = reader.read(handle.exe()).await {
            info.exe_path = exe;
        }
        if let Some(args) = reader.read(handle.cmdline()).await {
            info.cmdline = args.join(" ");
        }

        if !self.blacklist.should_skip_cpu(pid) {
            // CPU sampling can block, so it gets a tighter budget of its own
            let cpu_deadline = (Instant::now() + self.cpu_timeout).min(deadline);
            match timeout_at(cpu_deadline, handle.cpu_percent()).await {
                Ok(Ok(cpu)) => info.cpu_percent = cpu,
                Ok(Err(e)) => self.blacklist.mark_skip_cpu(pid, e.to_string()),
                Err(_) => self.blacklist.mark_skip_cpu(pid, "cpu sample timed out"),
            }
        }

        if !self.blacklist.should_skip_memory(pid) {
            if let Some(memory) = reader.read(handle.memory()).await {
                info.set_memory_bytes(memory.rss_bytes);
                info.memory_percent = memory.percent;
            }
        }

        if let Some(username) = reader.read(handle.username()).await {
            info.username = username;
        }
        if let Some(create_time) = reader.read(handle.create_time()).await {
            info.create_time = create_time;
        }
        if let Some(threads) = reader.read(handle.num_threads()).await {
            info.num_threads = threads;
        }
        if let Some(fds) = reader.read(handle.num_fds()).await {
            info.num_fds = fds;
        }

        info.is_system = self.classifier.is_system(&info.username, &info.exe_path);

        if reader.timed_out {
            info.mark_partial(TIMEOUT_REASON);
        }

        log::trace!("Gathered PID {} ({})", pid, info.name);
        Some(info)
    }
}
