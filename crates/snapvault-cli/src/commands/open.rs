//! Open command - unlock a vault and show its contents.

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;

use crate::output::{create_table, format_size};
use crate::{unlock, Cli, Service};

#[derive(ClapArgs, Clone)]
pub struct Args {
    pub username: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct VaultOutput {
    id: String,
    username: String,
    display_name: Option<String>,
    expiry: String,
    view_only: bool,
    asset_count: usize,
    total_bytes: u64,
    assets: Vec<AssetOutput>,
}

#[derive(Serialize)]
struct AssetOutput {
    id: String,
    name: String,
    size: u64,
    mime_type: String,
    uploaded_at: String,
}

pub async fn execute(service: &Service, cli: &Cli, args: &Args) -> Result<()> {
    let vault = unlock(service, cli, &args.username).await?;

    if args.json {
        let output = VaultOutput {
            id: vault.id.to_string(),
            username: vault.username.clone(),
            display_name: vault.display_name.clone(),
            expiry: vault.expiry_policy.to_string(),
            view_only: vault.is_view_only,
            asset_count: vault.assets.len(),
            total_bytes: vault.total_size(),
            assets: vault
                .assets
                .iter()
                .map(|asset| AssetOutput {
                    id: asset.id.to_string(),
                    name: asset.name.clone(),
                    size: asset.size_bytes,
                    mime_type: asset.mime_type.clone(),
                    uploaded_at: asset.uploaded_at.to_rfc3339(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} ({} assets, {}{})",
        vault.label(),
        vault.assets.len(),
        format_size(vault.total_size()),
        if vault.is_view_only { ", view-only" } else { "" }
    );

    if vault.assets.is_empty() {
        println!("The vault is empty.");
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Id", "Name", "Size", "Type", "Uploaded"]);
    for asset in &vault.assets {
        table.add_row(vec![
            asset.id.to_string(),
            asset.name.clone(),
            format_size(asset.size_bytes),
            asset.mime_type.clone(),
            asset.uploaded_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
