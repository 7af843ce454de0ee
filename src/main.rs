use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};

use procwatch::commands;
use procwatch::core::config::EngineConfig;
use procwatch::core::process_monitor::{PluginLifecycle, ProcessManager};

fn cli() -> Command {
    Command::new("procwatch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect, watch and terminate running processes")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Config file to use instead of the default location")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("list")
                .about("List running processes")
                .arg(
                    Arg::new("search")
                        .short('s')
                        .long("search")
                        .value_name("TERM")
                        .help("Case-insensitive match on name, executable, command line or PID"),
                )
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .value_name("FIELD")
                        .help("Sort by pid, name, cpu or memory")
                        .default_value("pid"),
                )
                .arg(
                    Arg::new("desc")
                        .long("desc")
                        .help("Sort in descending order")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("system")
                        .short('a')
                        .long("system")
                        .help("Include system processes")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("limit")
                        .short('n')
                        .long("limit")
                        .help("Maximum number of rows (0 for all)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0"),
                )
                .arg(
                    Arg::new("offset")
                        .long("offset")
                        .help("Number of rows to skip")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0"),
                )
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("detail")
                .about("Show a fresh reading of one process")
                .arg(pid_arg())
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("kill")
                .about("Terminate a process, escalating to a forced kill if needed")
                .arg(pid_arg())
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help("Skip graceful termination")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Show host information")
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("watch")
                .about("Stream process updates as JSON lines until Ctrl+C")
                .arg(
                    Arg::new("summary")
                        .long("summary")
                        .help("Print one human-readable line per event instead of JSON")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the configuration file (use 'procwatch config --help' for subcommands)")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("path").about("Print the config file location"))
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(
                    Command::new("init").about("Write the default configuration").arg(
                        Arg::new("force")
                            .long("force")
                            .help("Overwrite an existing file")
                            .action(clap::ArgAction::SetTrue),
                    ),
                ),
        )
}

fn pid_arg() -> Arg {
    Arg::new("pid")
        .help("Process ID")
        .required(true)
        .index(1)
        .value_parser(clap::value_parser!(u32))
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Print JSON instead of a table")
        .action(clap::ArgAction::SetTrue)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::load_default(),
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config_path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);

    // The config command must work even when the file on disk is invalid
    if let Some(("config", sub_matches)) = matches.subcommand() {
        return commands::config::execute(sub_matches, config_path);
    }

    let config = load_config(config_path)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .thread_name("procwatch-worker")
        .build()
        .context("Failed to start async runtime")?;

    let manager = ProcessManager::with_sysinfo(config, runtime.handle().clone());
    manager.init()?;
    manager.service_startup()?;

    let result = match matches.subcommand() {
        Some(("list", sub_matches)) => commands::list::execute(sub_matches, &manager, &runtime),
        Some(("detail", sub_matches)) => {
            commands::detail::execute(sub_matches, &manager, &runtime)
        }
        Some(("kill", sub_matches)) => commands::kill::execute(sub_matches, &manager),
        Some(("info", sub_matches)) => commands::info::execute(sub_matches, &manager, &runtime),
        Some(("watch", sub_matches)) => commands::watch::execute(sub_matches, &manager, &runtime),
        _ => {
            println!("Welcome to procwatch!");
            println!("Use 'procwatch --help' for more information.");
            Ok(())
        }
    };

    manager.service_shutdown()?;
    result
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    procwatch::init_logging(matches.get_flag("verbose"));

    run(&matches)
}
