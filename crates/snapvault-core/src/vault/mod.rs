//! Vault domain model and the caller-facing service operations.

pub mod model;
pub mod service;

pub use model::{
    Asset, AssetId, CachedLocator, ExpiryPolicy, NewVaultRecord, Vault, VaultId,
    VaultSettingsPatch,
};
pub use service::{
    share_link, AddOutcome, AssetSource, ExportSelection, NewVault, RejectedUpload, ServiceError,
    VaultService, MIN_USERNAME_LEN,
};
