//! CLI configuration.
//!
//! Lives at `~/.config/snapvault/config.toml` unless overridden; secrets can
//! also come from `SNAPVAULT_STORE_KEY` and `SNAPVAULT_BOT_TOKEN` so the
//! file itself never has to hold them.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const TEMPLATE: &str = r#"# snapvault configuration

[store]
# REST endpoint of the metadata row store.
url = "https://project.supabase.co/rest/v1"
# May be left empty and supplied via SNAPVAULT_STORE_KEY instead.
api_key = ""

[transfer]
# May be left empty and supplied via SNAPVAULT_BOT_TOKEN instead.
bot_token = ""
chat_id = ""

[app]
# Base URL for shareable vault links (optional).
# share_base = "https://vault.example/app"
"#;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub store: StoreConfig,
    pub transfer: TransferConfig,
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StoreConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TransferConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AppConfig {
    pub share_base: Option<String>,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Config {
    /// Resolve the config path: explicit override first, then the platform
    /// config directory.
    pub fn path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        let dirs = ProjectDirs::from("", "", "snapvault")
            .context("could not determine the config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::path(explicit)?;
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("no config at {} (run `snapvault init` first)", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("invalid config at {}", path.display()))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Write the starter template, refusing to clobber an existing file.
    pub fn write_template(explicit: Option<&Path>) -> Result<PathBuf> {
        let path = Self::path(explicit)?;
        if path.exists() {
            bail!("config already exists at {}", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("could not create {}", parent.display()))?;
        }
        std::fs::write(&path, TEMPLATE)
            .with_context(|| format!("could not write {}", path.display()))?;
        Ok(path)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("SNAPVAULT_STORE_KEY") {
            self.store.api_key = key;
        }
        if let Ok(token) = std::env::var("SNAPVAULT_BOT_TOKEN") {
            self.transfer.bot_token = token;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.store.api_key.is_empty() {
            bail!("store api_key is not set (config or SNAPVAULT_STORE_KEY)");
        }
        if self.transfer.bot_token.is_empty() {
            bail!("transfer bot_token is not set (config or SNAPVAULT_BOT_TOKEN)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [store]
            url = "https://x.supabase.co/rest/v1"
            api_key = "anon"

            [transfer]
            bot_token = "123:abc"
            chat_id = "42"

            [app]
            share_base = "https://vault.example"
            "#,
        )
        .unwrap();
        assert_eq!(config.transfer.api_base, "https://api.telegram.org");
        assert_eq!(config.app.share_base.as_deref(), Some("https://vault.example"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn template_parses_but_fails_validation_without_secrets() {
        let config: Config = toml::from_str(TEMPLATE).unwrap();
        assert!(config.validate().is_err());
    }
}
