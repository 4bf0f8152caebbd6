//! Get command - download a single asset.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;

use snapvault_core::vault::AssetId;

use crate::output::format_size;
use crate::{unlock, Cli, Service};

#[derive(ClapArgs, Clone)]
pub struct Args {
    pub username: String,

    /// Asset id (as shown by `snapvault open`)
    pub asset_id: String,

    /// Destination path (default: the asset's original name)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn execute(service: &Service, cli: &Cli, args: &Args) -> Result<()> {
    let asset_id: AssetId = args
        .asset_id
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid asset id: {e}"))?;

    let vault = unlock(service, cli, &args.username).await?;
    let (asset, bytes) = service
        .download_asset(&vault, asset_id)
        .await
        .context("download failed")?;

    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&asset.name));
    std::fs::write(&destination, &bytes)
        .with_context(|| format!("could not write {}", destination.display()))?;

    println!(
        "Wrote {} ({}) to {}",
        asset.name,
        format_size(bytes.len() as u64),
        destination.display()
    );
    Ok(())
}
