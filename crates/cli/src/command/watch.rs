use super::ProjectArgs;
use anyhow::{Context, Result};
use clap::Args;
use context_indexer::{WatchController, WatchOptions, WatchUpdate};
use context_snapshot::read_watch_status;
use std::process::ExitCode;
use tokio::sync::broadcast::error::RecvError;

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Quiet period before a batch of changes is rebuilt
    #[arg(long)]
    pub debounce_ms: Option<u64>,
}

pub async fn run(args: WatchArgs) -> Result<ExitCode> {
    let mut config = args.project.config().await?;
    if let Some(ms) = args.debounce_ms {
        config.debounce_ms = ms;
    }
    let project = args.project.open(config)?;

    match read_watch_status(project.root()).await {
        Ok(Some(status)) if status.pid != std::process::id() => log::warn!(
            "Another watch session (pid {}) may be active for {}",
            status.pid,
            status.project_root
        ),
        Ok(_) => {}
        Err(err) => log::warn!("Unreadable watch status marker: {err}"),
    }

    let options = WatchOptions::from_config(project.config());
    let root = project.root().to_path_buf();
    let controller = WatchController::start(project, options)
        .with_context(|| format!("Failed to watch {}", root.display()))?;
    println!("Watching {} (Ctrl-C to stop)", root.display());

    let mut updates = controller.subscribe_updates();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => print_update(&update),
                Err(RecvError::Lagged(skipped)) => log::warn!("Skipped {skipped} watch updates"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    controller.wait().await?;
    Ok(ExitCode::SUCCESS)
}

fn print_update(update: &WatchUpdate) {
    if let Some(err) = &update.error {
        println!("[rebuild failed] {err}");
        return;
    }
    let kind = if update.full_rebuild { "full" } else { "incremental" };
    let drift = update
        .drift
        .map(|d| {
            format!(
                ", {} (+{} -{} ~{})",
                d.verdict, d.added, d.removed, d.changed
            )
        })
        .unwrap_or_default();
    println!(
        "[{kind}] {} changed, {} repacked, {} dropped in {} ms{drift}",
        update.changed_files.len(),
        update.repacked.len(),
        update.dropped.len(),
        update.duration_ms
    );
}
