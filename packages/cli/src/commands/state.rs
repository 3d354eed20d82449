use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tessera_domain::{to_domain, ProjectionContext};

#[derive(Debug, Args)]
pub struct StateArgs {
    /// Replay only the first N events
    #[arg(short, long)]
    pub until: Option<i64>,

    /// Print the domain projection instead of the stored document
    #[arg(long)]
    pub domain: bool,

    /// Timestamp (ms) used for missing timestamps in the domain projection
    #[arg(long)]
    pub now: Option<i64>,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn state(args: StateArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let repository = config.open_repository(cwd)?;

    let storage = repository.state_at(args.until)?;
    let document = if args.domain {
        let now = args.now.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        let domain = to_domain(&storage, &ProjectionContext::new(&config.project_id, now));
        serde_json::to_value(domain)?
    } else {
        storage
    };
    let text = serde_json::to_string_pretty(&document)?;

    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, text)?;
            eprintln!("  {} Wrote {}", "✓".green(), path.display());
        }
        None => println!("{}", text),
    }

    Ok(())
}
