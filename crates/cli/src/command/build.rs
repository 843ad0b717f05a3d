use super::ProjectArgs;
use anyhow::Result;
use clap::Args;
use context_indexer::build_project;
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the build report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: BuildArgs) -> Result<ExitCode> {
    let config = args.project.config().await?;
    let project = args.project.open(config)?;
    let report = build_project(&project).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "Packed {} bundles from {} modules into {} ({} files, {} ms)",
        report.bundles,
        report.contracts,
        project.out_dir().display(),
        report.files_written,
        report.duration_ms
    );
    for failure in &report.failures {
        println!("  skipped {}: {}", failure.entry_id, failure.reason);
    }
    for err in &report.pack_errors {
        println!("  no bundle: {err}");
    }
    if report.cycles > 0 {
        println!("  {} import cycles", report.cycles);
    }
    Ok(ExitCode::SUCCESS)
}
