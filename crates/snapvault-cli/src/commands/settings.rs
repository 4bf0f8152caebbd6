//! Settings commands - rename, view-only toggle, share link, emergency lock.

use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use url::Url;

use snapvault_core::vault::share_link as make_share_link;

use crate::config::Config;
use crate::{unlock, Cli, Service};

#[derive(ClapArgs, Clone)]
pub struct RenameArgs {
    pub username: String,

    /// New display name
    pub name: String,
}

pub async fn rename(service: &Service, cli: &Cli, args: &RenameArgs) -> Result<()> {
    let vault = unlock(service, cli, &args.username).await?;
    let vault = service
        .rename_vault(&vault, args.name.clone())
        .await
        .context("rename failed")?;
    println!("Vault is now \"{}\".", vault.label());
    Ok(())
}

#[derive(ClapArgs, Clone)]
pub struct ViewOnlyArgs {
    pub username: String,
}

pub async fn view_only(service: &Service, cli: &Cli, args: &ViewOnlyArgs) -> Result<()> {
    let vault = unlock(service, cli, &args.username).await?;
    let vault = service
        .toggle_view_only(&vault)
        .await
        .context("toggle failed")?;
    if vault.is_view_only {
        println!("View-only mode is on: listing works, downloads and exports are refused.");
    } else {
        println!("View-only mode is off: full access restored.");
    }
    Ok(())
}

#[derive(ClapArgs, Clone)]
pub struct ShareLinkArgs {
    pub username: String,

    /// Base URL of the web front end (default: app.share_base from config)
    #[arg(long)]
    pub base: Option<String>,
}

pub async fn share_link(
    service: &Service,
    config: &Config,
    cli: &Cli,
    args: &ShareLinkArgs,
) -> Result<()> {
    let base = args
        .base
        .clone()
        .or_else(|| config.app.share_base.clone())
        .context("no share base URL; pass --base or set app.share_base in the config")?;
    let base: Url = base.parse().context("invalid share base URL")?;

    let vault = unlock(service, cli, &args.username).await?;
    println!("{}", make_share_link(&base, &vault));
    Ok(())
}

#[derive(ClapArgs, Clone)]
pub struct PanicArgs {
    pub username: String,

    /// Confirm the one-way lock
    #[arg(long)]
    pub yes: bool,
}

pub async fn panic_lock(service: &Service, cli: &Cli, args: &PanicArgs) -> Result<()> {
    if !args.yes {
        bail!("the emergency lock is one-way and needs manual recovery; pass --yes to confirm");
    }
    let vault = unlock(service, cli, &args.username).await?;
    service.panic_lock(&vault).await.context("lock failed")?;
    println!("Vault locked. All further authentication will be refused.");
    Ok(())
}
