use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tessera_domain::{Actor, Command};

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// JSON file holding one command or an array of commands
    pub command: PathBuf,

    /// User id recorded on commands that carry no actor
    #[arg(long, default_value = "cli")]
    pub user: String,
}

/// A command as written by hand; everything but `type` is optional
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandDraft {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    id: Option<String>,
    actor: Option<Actor>,
    client_ts: Option<i64>,
    #[serde(default)]
    partitions: Vec<String>,
}

impl CommandDraft {
    fn into_command(self, project_id: &str, user: &str) -> Command {
        let actor = self.actor.unwrap_or_else(|| Actor::new(user, "tessera-cli"));
        let mut command = Command::new(project_id, &self.kind, self.payload, actor).with_partitions(self.partitions);
        if let Some(id) = self.id {
            command = command.with_id(id);
        }
        if let Some(client_ts) = self.client_ts {
            command = command.with_client_ts(client_ts);
        }
        command
    }
}

fn read_drafts(content: &str) -> Result<Vec<CommandDraft>> {
    let value: Value = serde_json::from_str(content)?;
    let drafts = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<CommandDraft>, _>>()?,
        Value::Object(_) => vec![serde_json::from_value(value)?],
        _ => return Err(anyhow!("Expected a command object or an array of commands")),
    };
    Ok(drafts)
}

pub fn apply(args: ApplyArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let mut repository = config.open_repository(cwd)?;

    let content = fs::read_to_string(&args.command)
        .with_context(|| format!("Cannot read {}", args.command.display()))?;
    let drafts = read_drafts(&content)?;

    for draft in drafts {
        let command = draft.into_command(&config.project_id, &args.user);
        let kind = command.kind.clone();
        let id = command.id.clone();
        let outcome = repository
            .apply_command(command)
            .with_context(|| format!("{} ({}) was rejected", kind, id))?;
        println!(
            "  {} {} ({}) → {} event, {}",
            "✓".green(),
            kind.bright_white(),
            id,
            outcome.event_count,
            outcome.mode
        );
    }

    println!("{} events journaled", repository.len());
    Ok(())
}
