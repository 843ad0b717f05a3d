//! Context Stamp CLI
//!
//! Deterministic, hashable context bundles for frontend codebases.
//!
//! ## Commands
//!
//! - `build` - Extract, link and pack the project once, then write the artifacts
//! - `watch` - Build, then keep the artifacts current as files change
//! - `compare` - Diff two snapshots; exit code 0 on PASS, 1 on DRIFT or error

use clap::{ArgAction, Parser, Subcommand};
use std::process::ExitCode;

mod command;

use command::{BuildArgs, CompareArgs, WatchArgs};

#[derive(Parser, Debug)]
#[command(name = "context-stamp", version, about, propagate_version = true)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build context bundles for a project
    Build(BuildArgs),
    /// Rebuild context bundles whenever sources change
    Watch(WatchArgs),
    /// Compare two snapshots for drift
    Compare(CompareArgs),
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // stdout carries command output only
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .target(env_logger::Target::Stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Build(args) => command::build::run(args).await,
        Command::Watch(args) => command::watch::run(args).await,
        Command::Compare(args) => command::compare::run(args).await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
