//! The metadata row-store boundary.
//!
//! Vault records live in an external row store keyed by vault id with a
//! unique username column. [`VaultStore`] is the CRUD facade the rest of the
//! crate programs against; adapters own the mapping between their wire
//! schema and the in-memory [`Vault`].
//!
//! All operations are atomic at single-vault granularity. Concurrent writers
//! to the same vault id must not corrupt the asset sequence; last writer
//! wins at the adapter.

pub mod memory;
pub mod rest;

use thiserror::Error;

use crate::vault::{Asset, NewVaultRecord, Vault, VaultId, VaultSettingsPatch};

pub use memory::MemoryVaultStore;
pub use rest::RestVaultStore;

/// Errors surfaced by row-store adapters.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The username uniqueness constraint was violated on create.
    #[error("username already claimed by another vault")]
    UsernameTaken,

    /// The targeted vault does not exist.
    #[error("vault {0} not found")]
    NotFound(VaultId),

    /// The backing store rejected or failed the request, or its response
    /// could not be decoded into the vault schema.
    #[error("row store request failed: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// CRUD facade over the metadata row store.
#[allow(async_fn_in_trait)]
pub trait VaultStore {
    /// Insert a fresh vault. Fails with [`StoreError::UsernameTaken`] when
    /// the username is already claimed (matched case-insensitively).
    async fn create(&self, record: NewVaultRecord) -> Result<Vault, StoreError>;

    /// Look a vault up by username, case-insensitively.
    async fn find_by_username(&self, username: &str) -> Result<Option<Vault>, StoreError>;

    async fn find_by_id(&self, id: VaultId) -> Result<Option<Vault>, StoreError>;

    /// Replace the full asset sequence of one vault.
    async fn replace_assets(&self, id: VaultId, assets: Vec<Asset>) -> Result<Vault, StoreError>;

    /// Apply a partial settings update.
    async fn update_settings(
        &self,
        id: VaultId,
        patch: VaultSettingsPatch,
    ) -> Result<Vault, StoreError>;

    /// Bump the failed-attempt counter and set the lock flag in the same
    /// atomic update once the counter reaches `lock_threshold`. Two
    /// concurrent failures must both observe their own increment; neither
    /// may miss the threshold crossing.
    async fn record_failed_attempt(
        &self,
        id: VaultId,
        lock_threshold: u32,
    ) -> Result<Vault, StoreError>;

    /// Irreversible, total removal of the vault row.
    async fn delete(&self, id: VaultId) -> Result<(), StoreError>;
}
