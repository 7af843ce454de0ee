use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::core::config::EngineConfig;

fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => EngineConfig::default_path(),
    }
}

pub fn execute(matches: &ArgMatches, path: Option<&Path>) -> Result<()> {
    let path = resolve_path(path)?;

    match matches.subcommand() {
        Some(("path", _)) => {
            println!("{}", path.display());
        }
        Some(("show", _)) => {
            let config = EngineConfig::load(&path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Some(("init", sub_matches)) => {
            if path.exists() && !sub_matches.get_flag("force") {
                println!(
                    "{}",
                    format!("Config already exists at {}", path.display()).yellow()
                );
                println!("{}", "Use --force to overwrite it with the defaults.".dimmed());
                return Ok(());
            }

            EngineConfig::default()
                .save(&path)
                .with_context(|| format!("Failed to initialize config at {:?}", path))?;
            println!(
                "{} {}",
                "✓".green(),
                format!("Wrote default config to {}", path.display())
            );
        }
        _ => {
            println!("Use 'procwatch config --help' for more information.");
        }
    }

    Ok(())
}
