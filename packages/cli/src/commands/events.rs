use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tessera_editor::{RepositoryEvent, TypedEvent};

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Print each event as a JSON line
    #[arg(long)]
    pub json: bool,
}

pub fn events(args: EventsArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let repository = config.open_repository(cwd)?;

    if args.json {
        for event in repository.events() {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(());
    }

    if repository.is_empty() {
        println!("{}", "⚠️  No events journaled".yellow());
        return Ok(());
    }

    println!(
        "{} events in {}",
        repository.len(),
        config.get_log_path(cwd).display()
    );
    for (index, event) in repository.events().iter().enumerate() {
        println!("  {:>5}  {:<14} {}", index, event.kind().cyan(), describe(event));
    }

    Ok(())
}

/// One-line summary of `event`
fn describe(event: &RepositoryEvent) -> String {
    match event {
        RepositoryEvent::Typed(TypedEvent::TypedCommand(typed)) => format!(
            "{} ({}) by {}",
            typed.command.kind.bright_white(),
            typed.command.id,
            typed.command.actor.user_id
        ),
        RepositoryEvent::Typed(TypedEvent::TypedSnapshot(snapshot)) => {
            format!("project {}", snapshot.state.project.id)
        }
        RepositoryEvent::Action(action) => action
            .target()
            .map(|target| target.to_string())
            .unwrap_or_default(),
    }
}
