// Command handlers module
pub mod config;
pub mod detail;
pub mod info;
pub mod kill;
pub mod list;
pub mod watch;

use std::time::Duration;

use anyhow::Result;
use tokio::runtime::Runtime;

use crate::core::process_monitor::ProcessManager;

/// Take two snapshots a CPU sampling interval apart so usage figures are meaningful
pub(crate) fn prime_snapshot(manager: &ProcessManager, runtime: &Runtime) -> Result<()> {
    runtime.block_on(async {
        manager.refresh_now().await?;
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.max(Duration::from_millis(200)))
            .await;
        manager.refresh_now().await
    })?;
    Ok(())
}
