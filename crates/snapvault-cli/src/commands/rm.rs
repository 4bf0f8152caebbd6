//! Rm command - drop an asset record from a vault.
//!
//! Removal is irreversible: the record is gone and the remote object is
//! abandoned, so the command refuses to run without `--yes`.

use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;

use snapvault_core::vault::AssetId;

use crate::{unlock, Cli, Service};

#[derive(ClapArgs, Clone)]
pub struct Args {
    pub username: String,

    /// Asset id (as shown by `snapvault open`)
    pub asset_id: String,

    /// Confirm the irreversible removal
    #[arg(long)]
    pub yes: bool,
}

pub async fn execute(service: &Service, cli: &Cli, args: &Args) -> Result<()> {
    if !args.yes {
        bail!("asset removal is irreversible; pass --yes to confirm");
    }
    let asset_id: AssetId = args
        .asset_id
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid asset id: {e}"))?;

    let vault = unlock(service, cli, &args.username).await?;
    let name = vault
        .asset(asset_id)
        .map(|asset| asset.name.clone())
        .unwrap_or_default();
    let vault = service
        .remove_asset(&vault, asset_id)
        .await
        .context("removal failed")?;

    println!("Removed {name}. {} asset(s) remain.", vault.assets.len());
    Ok(())
}
