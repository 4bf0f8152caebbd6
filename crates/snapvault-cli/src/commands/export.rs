//! Export command - bundle assets into one ZIP archive.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use snapvault_core::pipeline::DEFAULT_CONCURRENCY;
use snapvault_core::vault::{AssetId, ExportSelection};

use crate::output::format_size;
use crate::{unlock, Cli, Service};

#[derive(ClapArgs, Clone)]
pub struct Args {
    pub username: String,

    /// Export only these asset ids (repeatable); default is everything
    #[arg(long = "asset", value_name = "ID")]
    pub assets: Vec<String>,

    /// Destination path (default: derived from the vault name)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Concurrent hydrations
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

#[instrument(level = "info", name = "cmd::export", skip_all, fields(username = %args.username))]
pub async fn execute(service: &Service, cli: &Cli, args: &Args) -> Result<()> {
    let vault = unlock(service, cli, &args.username).await?;

    let selection = if args.assets.is_empty() {
        ExportSelection::All
    } else {
        let ids = args
            .assets
            .iter()
            .map(|raw| {
                raw.parse::<AssetId>()
                    .map_err(|e| anyhow::anyhow!("invalid asset id {raw}: {e}"))
            })
            .collect::<Result<Vec<_>>>()?;
        ExportSelection::Subset(ids)
    };

    let job = service
        .export_assets(&vault, &selection)
        .context("export refused")?
        .with_concurrency(args.concurrency);

    let mut progress = job.progress();
    let mut progress_open = true;
    let run = job.run();
    tokio::pin!(run);

    let outcome = loop {
        tokio::select! {
            result = &mut run => break result.context("export failed")?,
            changed = progress.changed(), if progress_open => {
                if changed.is_ok() {
                    let snapshot = progress.borrow_and_update().clone();
                    eprint!(
                        "\r[{}/{}] {} {}          ",
                        snapshot.completed,
                        snapshot.total,
                        snapshot.phase,
                        snapshot.current.as_deref().unwrap_or("")
                    );
                    let _ = std::io::stderr().flush();
                } else {
                    progress_open = false;
                }
            }
        }
    };
    eprintln!();

    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&outcome.file_name));
    std::fs::write(&destination, &outcome.archive)
        .with_context(|| format!("could not write {}", destination.display()))?;

    println!(
        "Exported {} asset(s) ({}) to {}",
        outcome.archived.len(),
        format_size(outcome.archive.len() as u64),
        destination.display()
    );
    if !outcome.failed.is_empty() {
        eprintln!("{} asset(s) failed to hydrate:", outcome.failed.len());
        for failed in &outcome.failed {
            eprintln!("  {} ({}): {}", failed.name, failed.id, failed.error);
        }
        eprintln!("Retry just these with repeated --asset flags.");
    }
    Ok(())
}
