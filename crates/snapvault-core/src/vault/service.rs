//! Caller-facing vault operations.
//!
//! [`VaultService`] is an explicit context object composing the store, the
//! transfer client and the hasher; callers construct one and pass it around
//! instead of sharing any global session state. There is no durable
//! server-side session either: `authenticate` returns the [`Vault`] and the
//! caller re-presents it to subsequent operations.

use bytes::Bytes;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use crate::auth::{validate_pin, AccessController, AuthError, PinError, PinHasher};
use crate::pipeline::{ExportJob, HydrateError, Hydrator};
use crate::store::{StoreError, VaultStore};
use crate::transfer::{AssetTransfer, TransferError, TransferProgress};

use super::model::{Asset, AssetId, ExpiryPolicy, NewVaultRecord, Vault, VaultId, VaultSettingsPatch};

/// Minimum username length at creation.
pub const MIN_USERNAME_LEN: usize = 3;

/// Errors from the caller-facing operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("username must be at least {MIN_USERNAME_LEN} characters")]
    UsernameTooShort,

    #[error("asset {0} not found in this vault")]
    AssetNotFound(AssetId),

    /// The vault is in view-only mode and the operation would hand raw
    /// bytes to the caller.
    #[error("vault is in view-only mode")]
    ViewOnly,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Pin(#[from] PinError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Hydrate(#[from] HydrateError),
}

/// Input to [`VaultService::create_vault`].
#[derive(Debug, Clone)]
pub struct NewVault {
    pub username: String,
    pub display_name: Option<String>,
    pub pin: SecretString,
    pub expiry_policy: ExpiryPolicy,
}

/// One file to add to a vault.
#[derive(Debug, Clone)]
pub struct AssetSource {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// An upload the remote store turned away.
#[derive(Debug)]
pub struct RejectedUpload {
    pub name: String,
    pub error: TransferError,
}

/// Result of [`VaultService::add_assets`]: the updated vault plus whatever
/// could not be uploaded. Nothing is dropped silently.
#[derive(Debug)]
pub struct AddOutcome {
    pub vault: Vault,
    pub rejected: Vec<RejectedUpload>,
}

/// Which assets an export run covers.
#[derive(Debug, Clone)]
pub enum ExportSelection {
    All,
    Subset(Vec<AssetId>),
}

/// The vault operations facade.
#[derive(Debug)]
pub struct VaultService<S, T> {
    store: S,
    transfer: T,
    hasher: PinHasher,
}

impl<S: VaultStore, T: AssetTransfer> VaultService<S, T> {
    pub fn new(store: S, transfer: T) -> Self {
        Self::with_hasher(store, transfer, PinHasher::new())
    }

    /// Service with a caller-supplied hasher (tests use cheap parameters).
    pub fn with_hasher(store: S, transfer: T, hasher: PinHasher) -> Self {
        Self {
            store,
            transfer,
            hasher,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    /// Claim a username and create an empty vault behind it.
    ///
    /// Usernames are trimmed and stored lowercased, which is what makes the
    /// uniqueness constraint case-insensitive.
    #[instrument(level = "info", skip_all, fields(username = %new.username))]
    pub async fn create_vault(&self, new: NewVault) -> Result<Vault, ServiceError> {
        let username = new.username.trim().to_lowercase();
        if username.len() < MIN_USERNAME_LEN {
            return Err(ServiceError::UsernameTooShort);
        }
        validate_pin(&new.pin)?;

        let hasher = self.hasher.clone();
        let pin = new.pin.clone();
        let pin_digest = tokio::task::spawn_blocking(move || hasher.hash(&pin))
            .await
            .map_err(|e| PinError::Hash(e.to_string()))??;

        let vault = self
            .store
            .create(NewVaultRecord {
                username,
                display_name: new.display_name,
                pin_digest,
                expiry_policy: new.expiry_policy,
            })
            .await?;
        info!(vault = %vault.id, "vault created");
        Ok(vault)
    }

    /// Authenticate against a vault; see [`AccessController::authenticate`]
    /// for the lockout rules.
    pub async fn authenticate(
        &self,
        username: &str,
        pin: &SecretString,
    ) -> Result<Vault, ServiceError> {
        Ok(AccessController::new(&self.store, &self.hasher)
            .authenticate(username, pin)
            .await?)
    }

    pub async fn vault_by_id(&self, id: VaultId) -> Result<Option<Vault>, ServiceError> {
        Ok(self.store.find_by_id(id).await?)
    }

    /// Upload files and append their records to the vault's asset sequence,
    /// in input order. Per-file upload failures are collected in the
    /// outcome rather than aborting the batch; the records of the files
    /// that did make it are always persisted.
    #[instrument(level = "info", skip_all, fields(vault = %vault.id, files = sources.len()))]
    pub async fn add_assets<F>(
        &self,
        vault: &Vault,
        sources: Vec<AssetSource>,
        on_progress: F,
    ) -> Result<AddOutcome, ServiceError>
    where
        F: Fn(&str, TransferProgress) + Clone + Send + 'static,
    {
        let mut assets = vault.assets.clone();
        let mut rejected = Vec::new();

        for source in sources {
            let size = source.bytes.len() as u64;
            let progress = {
                let name = source.name.clone();
                let on_progress = on_progress.clone();
                move |update: TransferProgress| on_progress(&name, update)
            };
            match self
                .transfer
                .upload(source.bytes, &source.name, progress)
                .await
            {
                Ok(handle) => {
                    assets.push(Asset::new(source.name, size, source.mime_type, handle));
                }
                Err(error) => {
                    warn!(name = %source.name, %error, "upload rejected");
                    rejected.push(RejectedUpload {
                        name: source.name,
                        error,
                    });
                }
            }
        }

        let vault = self.store.replace_assets(vault.id, assets).await?;
        Ok(AddOutcome { vault, rejected })
    }

    /// Remove one asset record. Irreversible; the remote object is
    /// abandoned, not reclaimed.
    #[instrument(level = "info", skip(self, vault), fields(vault = %vault.id))]
    pub async fn remove_asset(&self, vault: &Vault, asset_id: AssetId) -> Result<Vault, ServiceError> {
        if vault.asset(asset_id).is_none() {
            return Err(ServiceError::AssetNotFound(asset_id));
        }
        let remaining: Vec<Asset> = vault
            .assets
            .iter()
            .filter(|asset| asset.id != asset_id)
            .cloned()
            .collect();
        Ok(self.store.replace_assets(vault.id, remaining).await?)
    }

    /// Fetch one asset's bytes for local possession. Refused in view-only
    /// mode; plain viewing goes through [`Hydrator`] directly and stays
    /// allowed.
    pub async fn download_asset(
        &self,
        vault: &Vault,
        asset_id: AssetId,
    ) -> Result<(Asset, Bytes), ServiceError> {
        if vault.is_view_only {
            return Err(ServiceError::ViewOnly);
        }
        let mut asset = vault
            .asset(asset_id)
            .cloned()
            .ok_or(ServiceError::AssetNotFound(asset_id))?;
        let bytes = Hydrator::new(&self.transfer).fetch(&mut asset).await?;
        Ok((asset, bytes))
    }

    /// Update the cosmetic display name.
    pub async fn rename_vault(
        &self,
        vault: &Vault,
        display_name: impl Into<String>,
    ) -> Result<Vault, ServiceError> {
        Ok(self
            .store
            .update_settings(
                vault.id,
                VaultSettingsPatch {
                    display_name: Some(display_name.into()),
                    ..Default::default()
                },
            )
            .await?)
    }

    pub async fn toggle_view_only(&self, vault: &Vault) -> Result<Vault, ServiceError> {
        Ok(self
            .store
            .update_settings(
                vault.id,
                VaultSettingsPatch {
                    is_view_only: Some(!vault.is_view_only),
                    ..Default::default()
                },
            )
            .await?)
    }

    /// Emergency self-lock; one-way.
    pub async fn panic_lock(&self, vault: &Vault) -> Result<Vault, ServiceError> {
        Ok(AccessController::new(&self.store, &self.hasher)
            .panic_lock(vault.id)
            .await?)
    }

    /// Destroy the vault row. Irreversible and total; remote objects are
    /// abandoned.
    #[instrument(level = "info", skip(self, vault), fields(vault = %vault.id))]
    pub async fn delete_vault(&self, vault: &Vault) -> Result<(), ServiceError> {
        Ok(self.store.delete(vault.id).await?)
    }

    /// Configure a bulk export over all or a subset of the vault's assets.
    /// The returned job still has to be [`run`](ExportJob::run).
    pub fn export_assets(
        &self,
        vault: &Vault,
        selection: &ExportSelection,
    ) -> Result<ExportJob<'_, T>, ServiceError> {
        if vault.is_view_only {
            return Err(ServiceError::ViewOnly);
        }
        let assets: Vec<Asset> = match selection {
            ExportSelection::All => vault.assets.clone(),
            ExportSelection::Subset(ids) => vault
                .assets
                .iter()
                .filter(|asset| ids.contains(&asset.id))
                .cloned()
                .collect(),
        };
        let stem = archive_stem(vault.label());
        Ok(ExportJob::new(&self.transfer, assets, stem))
    }
}

/// Deep link handing a vault id to the access screen of a web front end.
pub fn share_link(base: &Url, vault: &Vault) -> Url {
    let mut link = base.clone();
    link.set_fragment(Some(&format!("?vaultId={}", vault.id)));
    link
}

fn archive_stem(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_control() || matches!(c, '/' | '\\') { '-' } else { c })
        .collect();
    format!("snapvault-{cleaned}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_links_carry_the_vault_id_in_the_fragment() {
        let vault = Vault::from_new(NewVaultRecord {
            username: "ghost".into(),
            display_name: None,
            pin_digest: String::new(),
            expiry_policy: ExpiryPolicy::OneDay,
        });
        let base = Url::parse("https://vault.example/app").unwrap();
        let link = share_link(&base, &vault);
        assert_eq!(
            link.as_str(),
            format!("https://vault.example/app#?vaultId={}", vault.id)
        );
    }

    #[test]
    fn archive_stems_never_contain_path_separators() {
        assert_eq!(archive_stem("Holiday/2026"), "snapvault-Holiday-2026");
        assert_eq!(archive_stem("plain"), "snapvault-plain");
    }
}
