//! Domain types for vaults and their assets.
//!
//! A [`Vault`] is identity plus access gate plus an ordered asset index. The
//! asset bytes themselves live in the remote blob store; each [`Asset`] only
//! carries the durable [`RemoteHandle`] needed to get them back.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::transfer::RemoteHandle;

/// Globally unique, immutable vault identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultId(Uuid);

impl VaultId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VaultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for VaultId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Asset identifier, unique within its vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AssetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Retention hint for external sweeping tooling.
///
/// The core never sweeps expired vaults itself; the policy is stored and
/// handed to whoever drives `delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExpiryPolicy {
    #[default]
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "never")]
    Never,
}

impl ExpiryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryPolicy::OneDay => "24h",
            ExpiryPolicy::SevenDays => "7d",
            ExpiryPolicy::ThirtyDays => "30d",
            ExpiryPolicy::Never => "never",
        }
    }
}

impl fmt::Display for ExpiryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpiryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" | "1d" => Ok(ExpiryPolicy::OneDay),
            "7d" => Ok(ExpiryPolicy::SevenDays),
            "30d" => Ok(ExpiryPolicy::ThirtyDays),
            "never" => Ok(ExpiryPolicy::Never),
            other => Err(format!("unknown expiry policy: {other}")),
        }
    }
}

/// A short-lived, session-local reference to previously fetched bytes.
///
/// Fetch URLs derived from a [`RemoteHandle`] rotate and expire outside our
/// control, so a locator is never persisted and must be revalidated with an
/// existence probe before reuse.
#[derive(Debug, Clone)]
pub struct CachedLocator {
    pub url: Url,
    pub resolved_at: Instant,
}

impl CachedLocator {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            resolved_at: Instant::now(),
        }
    }
}

/// One stored object inside a vault.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: AssetId,
    /// Original filename; used as-is for export. Not guaranteed unique
    /// within a vault.
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    /// Durable reference into the remote blob store. Write-once: replacing
    /// an asset means removing this record and creating a new one.
    pub remote_handle: RemoteHandle,
    pub uploaded_at: DateTime<Utc>,
    /// Best-effort locator from an earlier fetch. Never crosses a process
    /// boundary.
    pub cached_locator: Option<CachedLocator>,
}

impl Asset {
    pub fn new(name: String, size_bytes: u64, mime_type: String, handle: RemoteHandle) -> Self {
        Self {
            id: AssetId::new(),
            name,
            size_bytes,
            mime_type,
            remote_handle: handle,
            uploaded_at: Utc::now(),
            cached_locator: None,
        }
    }
}

/// Identity, access gate and asset index of one vault.
#[derive(Debug, Clone)]
pub struct Vault {
    pub id: VaultId,
    /// Unique across all vaults (matched case-insensitively); immutable.
    pub username: String,
    /// Cosmetic only.
    pub display_name: Option<String>,
    /// Output of the secret hasher; never plaintext.
    pub pin_digest: String,
    /// Insertion order defines display and export order.
    pub assets: Vec<Asset>,
    pub created_at: DateTime<Utc>,
    pub expiry_policy: ExpiryPolicy,
    /// Reset to 0 on success, bumped on every failed PIN check.
    pub failed_attempts: u32,
    /// One-way within this crate; cleared only by out-of-band administration.
    pub is_locked: bool,
    /// While set, operations that hand raw bytes to the caller are refused.
    pub is_view_only: bool,
}

impl Vault {
    /// Materialise a fresh record for a create operation. Adapters that let
    /// the backing store assign ids overwrite `id`/`created_at` from the
    /// returned row.
    pub fn from_new(record: NewVaultRecord) -> Self {
        Self {
            id: VaultId::new(),
            username: record.username,
            display_name: record.display_name,
            pin_digest: record.pin_digest,
            assets: Vec::new(),
            created_at: Utc::now(),
            expiry_policy: record.expiry_policy,
            failed_attempts: 0,
            is_locked: false,
            is_view_only: false,
        }
    }

    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Sum of recorded asset sizes in bytes.
    pub fn total_size(&self) -> u64 {
        self.assets.iter().map(|a| a.size_bytes).sum()
    }

    /// Name used for human-facing labels: display name when set, else the
    /// username.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Input to [`crate::store::VaultStore::create`].
#[derive(Debug, Clone)]
pub struct NewVaultRecord {
    pub username: String,
    pub display_name: Option<String>,
    pub pin_digest: String,
    pub expiry_policy: ExpiryPolicy,
}

/// Partial settings update, applied atomically at single-vault granularity.
#[derive(Debug, Clone, Default)]
pub struct VaultSettingsPatch {
    pub display_name: Option<String>,
    pub is_locked: Option<bool>,
    pub is_view_only: Option<bool>,
    pub failed_attempts: Option<u32>,
}

impl VaultSettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.is_locked.is_none()
            && self.is_view_only.is_none()
            && self.failed_attempts.is_none()
    }
}
