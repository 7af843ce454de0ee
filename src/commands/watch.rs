//! Keeps the process view active and streams engine events to stdout.

use anyhow::Result;
use clap::ArgMatches;
use colored::Colorize;
use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use crate::core::process_monitor::{EngineEvent, PluginLifecycle, ProcessManager};
use crate::ui::summarize_update;

fn print_event(event: &EngineEvent, summary: bool) -> Result<()> {
    if !summary {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    let stamp = chrono::Local::now().format("%H:%M:%S");
    match event {
        EngineEvent::ProcessUpdate(update) => {
            println!("[{}] {}", stamp, summarize_update(update));
        }
        EngineEvent::KillCompleted(outcome) => {
            println!("[{}] kill {} success={}", stamp, outcome.pid, outcome.success);
        }
        EngineEvent::Error { message } => {
            println!("[{}] {}", stamp, message.red());
        }
    }
    Ok(())
}

pub fn execute(matches: &ArgMatches, manager: &ProcessManager, runtime: &Runtime) -> Result<()> {
    let summary = matches.get_flag("summary");

    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    eprintln!("{}", "Watching processes, press Ctrl+C to stop".dimmed());

    let mut events = manager.subscribe();
    manager.on_view_enter();

    let result: Result<()> = runtime.block_on(async {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => print_event(&event, summary)?,
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Event stream lagged, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop_rx.recv() => break,
            }
        }
        Ok(())
    });

    manager.on_view_leave();
    result
}
