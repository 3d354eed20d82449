use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tessera_editor::RepositoryConfig;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Project id the log belongs to
    #[arg(short, long, default_value = "default-project")]
    pub project_id: String,

    /// Event log path
    #[arg(short, long, default_value = ".tessera/events.jsonl")]
    pub log: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    // Check if config already exists
    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Tessera project...".bright_blue().bold());

    let config = Config {
        project_id: args.project_id.clone(),
        log: args.log.clone(),
        repository: RepositoryConfig::default(),
    };

    // The log itself is created on the first append
    if let Some(log_dir) = config.get_log_path(cwd).parent() {
        if !log_dir.exists() {
            fs::create_dir_all(log_dir)?;
            println!("  {} Created {}", "✓".green(), log_dir.display());
        }
    }

    let config_json = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, config_json)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("{}", "✅ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Write a command, e.g. {{\"type\": \"scene.create\", \"payload\": {{\"sceneId\": \"s1\", \"name\": \"Intro\"}}}}");
    println!("  2. Run: tessera apply command.json");
    println!("  3. Run: tessera state");

    Ok(())
}
