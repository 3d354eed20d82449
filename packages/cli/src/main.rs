mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{apply, check, events, init, state, ApplyArgs, CheckArgs, EventsArgs, InitArgs, StateArgs};
use tracing_subscriber::EnvFilter;

/// Tessera CLI - inspect, replay and edit a project's event log
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new Tessera project
    Init(InitArgs),

    /// List journaled events
    Events(EventsArgs),

    /// Print the project state, optionally as of an earlier event
    State(StateArgs),

    /// Apply commands from a JSON file
    Apply(ApplyArgs),

    /// Replay every history index and check it
    Check(CheckArgs),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|_| ".".to_string());

    let result = match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Events(args) => events(args, &cwd),
        Command::State(args) => state(args, &cwd),
        Command::Apply(args) => apply(args, &cwd),
        Command::Check(args) => check(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
