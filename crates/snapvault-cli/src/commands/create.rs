//! Create command - claim a username and set up an empty vault.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;

use snapvault_core::vault::{ExpiryPolicy, NewVault};

use crate::{read_pin, Cli, Service};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Username to claim (at least 3 characters, stored lowercased)
    pub username: String,

    /// Cosmetic display name
    #[arg(long)]
    pub name: Option<String>,

    /// Retention hint: 24h, 7d, 30d or never
    #[arg(long, default_value = "24h")]
    pub expiry: String,
}

pub async fn execute(service: &Service, cli: &Cli, args: &Args) -> Result<()> {
    let expiry_policy: ExpiryPolicy = args
        .expiry
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("invalid --expiry")?;

    let pin = read_pin(cli, true)?;
    let vault = service
        .create_vault(NewVault {
            username: args.username.clone(),
            display_name: args.name.clone(),
            pin,
            expiry_policy,
        })
        .await
        .context("vault creation failed")?;

    println!("Vault created.");
    println!("  username: {}", vault.username);
    println!("  id:       {}", vault.id);
    println!("  expiry:   {}", vault.expiry_policy);
    println!("Five wrong PIN attempts will lock the vault permanently.");
    Ok(())
}
