use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use tessera_domain::engine::assert_domain_invariants;
use tessera_domain::{check_round_trip, to_domain, ProjectionContext};
use tessera_editor::{EditorError, EventStore, ProjectRepository};

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Stop at the first failing history index
    #[arg(long)]
    pub fail_fast: bool,

    /// Timestamp (ms) used for missing timestamps while projecting
    #[arg(long)]
    pub now: Option<i64>,
}

pub fn check(args: CheckArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let repository = config.open_repository(cwd)?;
    let now = args.now.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    println!(
        "🔍 {} {} events of {}",
        "Checking".green().bold(),
        repository.len(),
        config.project_id
    );

    let mut failed = 0;
    let states = repository.len() + 1;
    for index in 0..states {
        if let Err(e) = check_prefix(&repository, index, &config.project_id, now) {
            failed += 1;
            println!("  {} after {} events: {} [{}]", "✗".red(), index, e, e.code());
            if args.fail_fast {
                break;
            }
        }
    }

    if !repository.verify()? {
        return Err(anyhow!("Cached state differs from a cold replay"));
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} history states failed", failed, states));
    }

    println!("  {} {} history states passed", "✓".green(), states);
    Ok(())
}

/// Model version, domain invariants and round trip of the state after
/// the first `index` events
fn check_prefix<S: EventStore>(
    repository: &ProjectRepository<S>,
    index: usize,
    project_id: &str,
    now: i64,
) -> Result<(), EditorError> {
    let storage = repository.state_at(index)?;
    let ctx = ProjectionContext::new(project_id, now);
    assert_domain_invariants(&to_domain(&storage, &ctx))?;
    check_round_trip(&storage, &ctx)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;
    use tessera_domain::{Actor, Command};

    fn args() -> CheckArgs {
        CheckArgs {
            fail_fast: false,
            now: Some(0),
        }
    }

    #[test]
    fn test_check_passes_on_healthy_log() {
        let dir = TempDir::new().unwrap();
        let cwd = dir.path().display().to_string();
        let config = Config::default();
        {
            let mut repository = config.open_repository(&cwd).unwrap();
            for (kind, payload) in [
                ("scene.create", json!({"sceneId": "s1", "name": "Intro"})),
                ("section.create", json!({"sectionId": "x1", "sceneId": "s1", "name": "Main"})),
                ("variable.create", json!({"variableId": "v1", "name": "score", "variableType": "number", "initialValue": 0})),
            ] {
                let command = Command::new("default-project", kind, payload, Actor::new("u", "c")).with_client_ts(1);
                repository.apply_command(command).unwrap();
            }
        }
        check(args(), &cwd).unwrap();
    }

    #[test]
    fn test_check_fails_on_unsupported_model_version() {
        let dir = TempDir::new().unwrap();
        let cwd = dir.path().display().to_string();
        let log = Config::default().get_log_path(&cwd);
        fs::create_dir_all(log.parent().unwrap()).unwrap();
        fs::write(&log, "{\"type\":\"init\",\"payload\":{\"value\":{\"model_version\":1}}}\n").unwrap();

        assert!(check(args(), &cwd).is_err());
    }
}
