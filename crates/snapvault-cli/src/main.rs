#![deny(unsafe_code)]

//! Command-line interface for snapvault vaults.

mod commands;
mod config;
mod output;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use snapvault_core::auth::AuthError;
use snapvault_core::store::RestVaultStore;
use snapvault_core::transfer::BotApiTransfer;
use snapvault_core::vault::{ServiceError, Vault, VaultService};

use crate::config::Config;

/// The service type every command runs against.
pub type Service = VaultService<RestVaultStore, BotApiTransfer>;

/// Command-line interface for snapvault vaults
#[derive(Parser)]
#[command(name = "snapvault")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Claim a vault
    snapvault create ghost --name \"Holiday 2026\" --expiry 7d

    # Inspect it (prompts for the PIN)
    snapvault open ghost

    # Add files and export everything as a ZIP
    snapvault add ghost photo1.jpg photo2.jpg
    snapvault export ghost -o holiday.zip

    # Pipe the PIN from a secret manager
    echo \"$PIN\" | snapvault --pin-stdin open ghost
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the config file (default: ~/.config/snapvault/config.toml)
    #[arg(long, global = true, env = "SNAPVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Vault PIN (insecure; prefer --pin-stdin or the interactive prompt)
    #[arg(long, env = "SNAPVAULT_PIN", hide_env_values = true, global = true)]
    pin: Option<String>,

    /// Read the PIN from stdin (single line)
    #[arg(long, conflicts_with = "pin", global = true)]
    pin_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init(commands::init::Args),

    /// Claim a username and create an empty vault
    Create(commands::create::Args),

    /// Unlock a vault and list its contents
    Open(commands::open::Args),

    /// Upload files into a vault
    Add(commands::add::Args),

    /// Remove an asset record from a vault
    Rm(commands::rm::Args),

    /// Download one asset
    Get(commands::get::Args),

    /// Export assets as a single ZIP archive
    Export(commands::export::Args),

    /// Change the vault's display name
    Rename(commands::settings::RenameArgs),

    /// Toggle view-only mode
    ViewOnly(commands::settings::ViewOnlyArgs),

    /// Print the shareable access link
    ShareLink(commands::settings::ShareLinkArgs),

    /// Emergency-lock the vault until manual recovery
    Panic(commands::settings::PanicArgs),

    /// Permanently delete the vault
    Delete(commands::delete::Args),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Init(args) = &cli.command {
        return commands::init::execute(cli.config.as_deref(), args);
    }

    let config = Config::load(cli.config.as_deref())?;
    let service = build_service(&config)?;

    match &cli.command {
        Commands::Init(_) => unreachable!("handled above"),
        Commands::Create(args) => commands::create::execute(&service, &cli, args).await,
        Commands::Open(args) => commands::open::execute(&service, &cli, args).await,
        Commands::Add(args) => commands::add::execute(&service, &cli, args).await,
        Commands::Rm(args) => commands::rm::execute(&service, &cli, args).await,
        Commands::Get(args) => commands::get::execute(&service, &cli, args).await,
        Commands::Export(args) => commands::export::execute(&service, &cli, args).await,
        Commands::Rename(args) => commands::settings::rename(&service, &cli, args).await,
        Commands::ViewOnly(args) => commands::settings::view_only(&service, &cli, args).await,
        Commands::ShareLink(args) => {
            commands::settings::share_link(&service, &config, &cli, args).await
        }
        Commands::Panic(args) => commands::settings::panic_lock(&service, &cli, args).await,
        Commands::Delete(args) => commands::delete::execute(&service, &cli, args).await,
    }
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("snapvault={default},snapvault_core={default}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_service(config: &Config) -> Result<Service> {
    let store = RestVaultStore::new(&config.store.url, &config.store.api_key)
        .context("failed to set up the metadata store client")?;
    let transfer = BotApiTransfer::new(&config.transfer.bot_token, &config.transfer.chat_id)
        .context("failed to set up the asset transfer client")?
        .with_api_base(&config.transfer.api_base);
    Ok(VaultService::new(store, transfer))
}

/// Obtain the PIN from the flag, stdin, or an interactive prompt.
pub fn read_pin(cli: &Cli, confirm: bool) -> Result<SecretString> {
    if let Some(pin) = &cli.pin {
        return Ok(SecretString::from(pin.clone()));
    }
    if cli.pin_stdin {
        let mut line = String::new();
        std::io::stdin()
            .read_to_string(&mut line)
            .context("failed to read PIN from stdin")?;
        return Ok(SecretString::from(line.trim().to_string()));
    }

    let pin = rpassword::prompt_password("PIN: ").context("failed to read PIN")?;
    if confirm {
        let again = rpassword::prompt_password("Confirm PIN: ").context("failed to read PIN")?;
        if pin != again {
            bail!("PINs do not match");
        }
    }
    Ok(SecretString::from(pin))
}

/// Authenticate and hand the vault to the command, translating the
/// state-machine outcomes into actionable messages.
pub async fn unlock(service: &Service, cli: &Cli, username: &str) -> Result<Vault> {
    let pin = read_pin(cli, false)?;
    match service.authenticate(username, &pin).await {
        Ok(vault) => Ok(vault),
        Err(ServiceError::Auth(AuthError::VaultNotFound)) => {
            bail!("no vault is registered under \"{username}\"")
        }
        Err(ServiceError::Auth(AuthError::Locked)) => {
            bail!("this vault is locked and can only be recovered out of band")
        }
        Err(ServiceError::Auth(AuthError::InvalidPin)) => {
            bail!("invalid PIN (repeated failures will lock the vault)")
        }
        Err(other) => Err(other).context("authentication failed"),
    }
}
