use std::sync::Arc;

use super::source::ProcessSource;
use crate::error::{ProcwatchError, Result};

/// Sends termination signals to single processes
pub struct KillExecutor {
    source: Arc<dyn ProcessSource>,
}

impl KillExecutor {
    pub fn new(source: Arc<dyn ProcessSource>) -> Self {
        Self { source }
    }

    /// Terminate gracefully, escalating to a forced kill if that fails.
    ///
    /// Errors only when both attempts fail.
    pub fn kill(&self, pid: u32) -> Result<()> {
        let graceful = match self.source.terminate(pid) {
            Ok(()) => {
                log::info!("Sent graceful termination to PID {}", pid);
                return Ok(());
            }
            Err(e) => e,
        };

        log::warn!(
            "Graceful termination of PID {} failed ({}), escalating to kill",
            pid,
            graceful
        );

        match self.source.force_kill(pid) {
            Ok(()) => {
                log::info!("Force killed PID {}", pid);
                Ok(())
            }
            Err(forced) if forced.is_not_found() || graceful.is_not_found() => {
                Err(ProcwatchError::ProcessNotFound(pid))
            }
            Err(forced) => Err(ProcwatchError::termination_failed(
                pid,
                format!("graceful: {}; forced: {}", graceful, forced),
            )),
        }
    }

    /// Kill without the graceful step
    pub fn force_kill(&self, pid: u32) -> Result<()> {
        self.source.force_kill(pid)?;
        log::info!("Force killed PID {}", pid);
        Ok(())
    }
}
