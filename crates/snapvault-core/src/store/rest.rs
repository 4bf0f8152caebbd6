//! PostgREST-style row-store adapter.
//!
//! Talks to a hosted row store (Supabase in the original deployment) over
//! its REST surface: one `vaults` table addressed with column filters, with
//! `Prefer: return=representation` so every write hands back the updated
//! row. This module owns the wire schema; the rest of the crate only ever
//! sees [`Vault`].

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::transfer::RemoteHandle;
use crate::vault::{
    Asset, AssetId, ExpiryPolicy, NewVaultRecord, Vault, VaultId, VaultSettingsPatch,
};

use super::{StoreError, VaultStore};

const TABLE: &str = "vaults";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// [`VaultStore`] backed by a PostgREST row store.
#[derive(Debug, Clone)]
pub struct RestVaultStore {
    http: reqwest::Client,
    /// Base REST endpoint without trailing slash, e.g.
    /// `https://project.supabase.co/rest/v1`.
    base: String,
}

impl RestVaultStore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, StoreError> {
        let key_value = HeaderValue::from_str(api_key)
            .map_err(|e| StoreError::Backend(format!("invalid api key: {e}")))?;
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| StoreError::Backend(format!("invalid api key: {e}")))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("apikey"), key_value);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .user_agent("snapvault")
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/{TABLE}", self.base)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rpc/{function}", self.base)
    }

    async fn expect_rows(resp: Response) -> Result<Vec<VaultRow>, StoreError> {
        let status = resp.status();
        if status == StatusCode::CONFLICT {
            // Unique-violation (23505) on the username column.
            return Err(StoreError::UsernameTaken);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("{status}: {body}")));
        }
        Ok(resp.json().await?)
    }

    async fn single_row(resp: Response, id: VaultId) -> Result<Vault, StoreError> {
        Self::expect_rows(resp)
            .await?
            .into_iter()
            .next()
            .map(VaultRow::into_vault)
            .ok_or(StoreError::NotFound(id))
    }
}

impl VaultStore for RestVaultStore {
    async fn create(&self, record: NewVaultRecord) -> Result<Vault, StoreError> {
        debug!(username = %record.username, "creating vault row");
        let resp = self
            .http
            .post(self.table_url())
            .header("Prefer", "return=representation")
            .json(&[InsertRow::from(record)])
            .send()
            .await?;
        Self::expect_rows(resp)
            .await?
            .into_iter()
            .next()
            .map(VaultRow::into_vault)
            .ok_or_else(|| StoreError::Backend("insert returned no representation".into()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Vault>, StoreError> {
        // Usernames are stored lowercased, so an eq filter on the lowered
        // input gives case-insensitive matching.
        let resp = self
            .http
            .get(self.table_url())
            .query(&[
                ("username", format!("eq.{}", username.to_lowercase())),
                ("limit", "1".into()),
            ])
            .send()
            .await?;
        Ok(Self::expect_rows(resp)
            .await?
            .into_iter()
            .next()
            .map(VaultRow::into_vault))
    }

    async fn find_by_id(&self, id: VaultId) -> Result<Option<Vault>, StoreError> {
        let resp = self
            .http
            .get(self.table_url())
            .query(&[("id", format!("eq.{id}")), ("limit", "1".into())])
            .send()
            .await?;
        Ok(Self::expect_rows(resp)
            .await?
            .into_iter()
            .next()
            .map(VaultRow::into_vault))
    }

    async fn replace_assets(&self, id: VaultId, assets: Vec<Asset>) -> Result<Vault, StoreError> {
        debug!(vault = %id, count = assets.len(), "replacing asset sequence");
        let images: Vec<AssetRow> = assets.into_iter().map(AssetRow::from).collect();
        let resp = self
            .http
            .patch(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&AssetsBody { images })
            .send()
            .await?;
        Self::single_row(resp, id).await
    }

    async fn update_settings(
        &self,
        id: VaultId,
        patch: VaultSettingsPatch,
    ) -> Result<Vault, StoreError> {
        if patch.is_empty() {
            return self.find_by_id(id).await?.ok_or(StoreError::NotFound(id));
        }
        let resp = self
            .http
            .patch(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&SettingsBody::from(patch))
            .send()
            .await?;
        Self::single_row(resp, id).await
    }

    async fn record_failed_attempt(
        &self,
        id: VaultId,
        lock_threshold: u32,
    ) -> Result<Vault, StoreError> {
        // Single-statement bump on the backend (the `record_failed_attempt`
        // SQL function), so racing failures cannot miss the threshold.
        let resp = self
            .http
            .post(self.rpc_url("record_failed_attempt"))
            .json(&FailedAttemptCall {
                vault_id: id,
                lock_threshold,
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("{status}: {body}")));
        }
        let row: VaultRow = resp.json().await?;
        Ok(row.into_vault())
    }

    async fn delete(&self, id: VaultId) -> Result<(), StoreError> {
        debug!(vault = %id, "deleting vault row");
        let resp = self
            .http
            .delete(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("{status}: {body}")));
        }
        Ok(())
    }
}

/// One `vaults` row as the store returns it.
#[derive(Debug, Deserialize)]
struct VaultRow {
    id: VaultId,
    username: String,
    #[serde(default)]
    vault_name: Option<String>,
    pin_hash: String,
    #[serde(default)]
    images: Vec<AssetRow>,
    created_at: DateTime<Utc>,
    expiry: ExpiryPolicy,
    is_emergency_locked: bool,
    failed_attempts: u32,
    is_view_only: bool,
}

impl VaultRow {
    fn into_vault(self) -> Vault {
        Vault {
            id: self.id,
            username: self.username,
            display_name: self.vault_name,
            pin_digest: self.pin_hash,
            assets: self.images.into_iter().map(AssetRow::into_asset).collect(),
            created_at: self.created_at,
            expiry_policy: self.expiry,
            failed_attempts: self.failed_attempts,
            is_locked: self.is_emergency_locked,
            is_view_only: self.is_view_only,
        }
    }
}

/// Insert payload; the store assigns `id` and `created_at`.
#[derive(Serialize)]
struct InsertRow {
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    vault_name: Option<String>,
    pin_hash: String,
    expiry: ExpiryPolicy,
    images: Vec<AssetRow>,
    is_emergency_locked: bool,
    failed_attempts: u32,
    is_view_only: bool,
}

impl From<NewVaultRecord> for InsertRow {
    fn from(record: NewVaultRecord) -> Self {
        Self {
            username: record.username,
            vault_name: record.display_name,
            pin_hash: record.pin_digest,
            expiry: record.expiry_policy,
            images: Vec::new(),
            is_emergency_locked: false,
            failed_attempts: 0,
            is_view_only: false,
        }
    }
}

/// One asset entry inside the `images` JSON column. Key casing matches what
/// the original web client wrote into the column.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetRow {
    id: AssetId,
    name: String,
    size: u64,
    mime_type: String,
    remote_handle: RemoteHandle,
    uploaded_at: DateTime<Utc>,
}

impl AssetRow {
    fn into_asset(self) -> Asset {
        Asset {
            id: self.id,
            name: self.name,
            size_bytes: self.size,
            mime_type: self.mime_type,
            remote_handle: self.remote_handle,
            uploaded_at: self.uploaded_at,
            // Locators never survive the wire.
            cached_locator: None,
        }
    }
}

impl From<Asset> for AssetRow {
    fn from(asset: Asset) -> Self {
        Self {
            id: asset.id,
            name: asset.name,
            size: asset.size_bytes,
            mime_type: asset.mime_type,
            remote_handle: asset.remote_handle,
            uploaded_at: asset.uploaded_at,
        }
    }
}

#[derive(Serialize)]
struct AssetsBody {
    images: Vec<AssetRow>,
}

#[derive(Serialize)]
struct SettingsBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    vault_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_emergency_locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_view_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_attempts: Option<u32>,
}

impl From<VaultSettingsPatch> for SettingsBody {
    fn from(patch: VaultSettingsPatch) -> Self {
        Self {
            vault_name: patch.display_name,
            is_emergency_locked: patch.is_locked,
            is_view_only: patch.is_view_only,
            failed_attempts: patch.failed_attempts,
        }
    }
}

#[derive(Serialize)]
struct FailedAttemptCall {
    vault_id: VaultId,
    lock_threshold: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_maps_to_domain_vault() {
        let json = r#"{
            "id": "7b7e9df8-6f0e-4f7b-90db-54a837ba9d6c",
            "username": "ghost",
            "vault_name": "Holiday",
            "pin_hash": "$scrypt$ln=15,r=8,p=1$c2FsdA$aGFzaA",
            "images": [{
                "id": "0a4d9df8-6f0e-4f7b-90db-54a837ba9d6c",
                "name": "beach.jpg",
                "size": 120345,
                "mimeType": "image/jpeg",
                "remoteHandle": "BAACAgQAAx0Eabcdefg",
                "uploadedAt": "2026-07-01T09:30:00Z"
            }],
            "created_at": "2026-06-30T20:00:00Z",
            "expiry": "7d",
            "is_emergency_locked": false,
            "failed_attempts": 2,
            "is_view_only": true
        }"#;

        let row: VaultRow = serde_json::from_str(json).unwrap();
        let vault = row.into_vault();
        assert_eq!(vault.username, "ghost");
        assert_eq!(vault.display_name.as_deref(), Some("Holiday"));
        assert_eq!(vault.expiry_policy, ExpiryPolicy::SevenDays);
        assert_eq!(vault.failed_attempts, 2);
        assert!(vault.is_view_only);
        assert_eq!(vault.assets.len(), 1);

        let asset = &vault.assets[0];
        assert_eq!(asset.name, "beach.jpg");
        assert_eq!(asset.size_bytes, 120_345);
        assert_eq!(asset.remote_handle.as_str(), "BAACAgQAAx0Eabcdefg");
        assert!(asset.cached_locator.is_none());
    }

    #[test]
    fn asset_row_uses_camel_case_keys() {
        let asset = Asset::new(
            "cat.png".into(),
            42,
            "image/png".into(),
            RemoteHandle::from("handle-1"),
        );
        let value = serde_json::to_value(AssetRow::from(asset)).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(keys.contains(&"mimeType"));
        assert!(keys.contains(&"remoteHandle"));
        assert!(keys.contains(&"uploadedAt"));
    }

    #[test]
    fn settings_body_serialises_only_set_fields() {
        let body = SettingsBody::from(VaultSettingsPatch {
            failed_attempts: Some(0),
            ..Default::default()
        });
        let value = serde_json::to_value(body).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["failed_attempts"], 0);
    }
}
