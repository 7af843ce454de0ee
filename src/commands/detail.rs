use anyhow::{Context, Result};
use clap::ArgMatches;
use tokio::runtime::Runtime;

use crate::core::process_monitor::ProcessManager;
use crate::ui::print_process_detail;

pub fn execute(matches: &ArgMatches, manager: &ProcessManager, runtime: &Runtime) -> Result<()> {
    let pid = matches
        .get_one::<u32>("pid")
        .copied()
        .context("PID argument is required")?;

    super::prime_snapshot(manager, runtime)?;
    let info = runtime.block_on(manager.get_process_detail(pid))?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_process_detail(&info);
    }

    Ok(())
}
