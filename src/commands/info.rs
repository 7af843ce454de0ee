use anyhow::Result;
use clap::ArgMatches;
use tokio::runtime::Runtime;

use crate::core::process_monitor::ProcessManager;
use crate::ui::print_system_info;

pub fn execute(matches: &ArgMatches, manager: &ProcessManager, runtime: &Runtime) -> Result<()> {
    // proc_count comes from the snapshot
    runtime.block_on(manager.refresh_now())?;
    let info = manager.get_system_info();

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_system_info(&info);
    }

    Ok(())
}
