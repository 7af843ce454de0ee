use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::process_monitor::ProcessManager;

pub fn execute(matches: &ArgMatches, manager: &ProcessManager) -> Result<()> {
    let pid = matches
        .get_one::<u32>("pid")
        .copied()
        .context("PID argument is required")?;
    let force = matches.get_flag("force");

    if force {
        manager.force_kill_process(pid)?;
        println!("{}", format!("Process {} killed", pid).green());
    } else {
        manager.kill_process(pid)?;
        println!("{}", format!("Process {} terminated", pid).green());
    }

    Ok(())
}
