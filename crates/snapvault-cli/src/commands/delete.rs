//! Delete command - permanently destroy a vault.

use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;

use crate::{unlock, Cli, Service};

#[derive(ClapArgs, Clone)]
pub struct Args {
    pub username: String,

    /// Confirm the permanent deletion
    #[arg(long)]
    pub yes: bool,
}

pub async fn execute(service: &Service, cli: &Cli, args: &Args) -> Result<()> {
    if !args.yes {
        bail!("deletion is permanent and total; pass --yes to confirm");
    }
    let vault = unlock(service, cli, &args.username).await?;
    let assets = vault.assets.len();
    service.delete_vault(&vault).await.context("deletion failed")?;
    println!(
        "Vault \"{}\" deleted ({assets} asset record(s) discarded).",
        vault.username
    );
    Ok(())
}
