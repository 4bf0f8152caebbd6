//! In-memory row store.
//!
//! Backs the test suites and works as an ephemeral single-process backend.
//! Per-vault atomicity comes from `DashMap` entry locks: every mutation runs
//! under the entry's shard lock, so a settings patch or counter bump is one
//! indivisible update.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::vault::{Asset, NewVaultRecord, Vault, VaultId, VaultSettingsPatch};

use super::{StoreError, VaultStore};

/// `DashMap`-backed [`VaultStore`].
#[derive(Debug, Default)]
pub struct MemoryVaultStore {
    vaults: DashMap<VaultId, Vault>,
    /// Lowercased username -> vault id; the uniqueness constraint.
    by_username: DashMap<String, VaultId>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored vaults.
    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    fn with_vault<R>(
        &self,
        id: VaultId,
        apply: impl FnOnce(&mut Vault) -> R,
    ) -> Result<R, StoreError> {
        let mut entry = self.vaults.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        Ok(apply(entry.value_mut()))
    }
}

impl VaultStore for MemoryVaultStore {
    async fn create(&self, record: NewVaultRecord) -> Result<Vault, StoreError> {
        let key = record.username.to_lowercase();
        // The entry API keeps claim-check and insert one atomic step.
        match self.by_username.entry(key) {
            Entry::Occupied(_) => Err(StoreError::UsernameTaken),
            Entry::Vacant(slot) => {
                let vault = Vault::from_new(record);
                slot.insert(vault.id);
                self.vaults.insert(vault.id, vault.clone());
                Ok(vault)
            }
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Vault>, StoreError> {
        let id = match self.by_username.get(&username.to_lowercase()) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.vaults.get(&id).map(|v| v.clone()))
    }

    async fn find_by_id(&self, id: VaultId) -> Result<Option<Vault>, StoreError> {
        Ok(self.vaults.get(&id).map(|v| v.clone()))
    }

    async fn replace_assets(&self, id: VaultId, assets: Vec<Asset>) -> Result<Vault, StoreError> {
        self.with_vault(id, |vault| {
            vault.assets = assets;
            vault.clone()
        })
    }

    async fn update_settings(
        &self,
        id: VaultId,
        patch: VaultSettingsPatch,
    ) -> Result<Vault, StoreError> {
        self.with_vault(id, |vault| {
            if let Some(name) = patch.display_name {
                vault.display_name = Some(name);
            }
            if let Some(locked) = patch.is_locked {
                vault.is_locked = locked;
            }
            if let Some(view_only) = patch.is_view_only {
                vault.is_view_only = view_only;
            }
            if let Some(attempts) = patch.failed_attempts {
                vault.failed_attempts = attempts;
            }
            vault.clone()
        })
    }

    async fn record_failed_attempt(
        &self,
        id: VaultId,
        lock_threshold: u32,
    ) -> Result<Vault, StoreError> {
        self.with_vault(id, |vault| {
            vault.failed_attempts += 1;
            if vault.failed_attempts >= lock_threshold {
                vault.is_locked = true;
            }
            vault.clone()
        })
    }

    async fn delete(&self, id: VaultId) -> Result<(), StoreError> {
        let (_, vault) = self.vaults.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.by_username.remove(&vault.username.to_lowercase());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::ExpiryPolicy;
    use std::sync::Arc;

    fn record(username: &str) -> NewVaultRecord {
        NewVaultRecord {
            username: username.into(),
            display_name: None,
            pin_digest: "$scrypt$test".into(),
            expiry_policy: ExpiryPolicy::Never,
        }
    }

    #[tokio::test]
    async fn create_enforces_unique_usernames() {
        let store = MemoryVaultStore::new();
        store.create(record("ghost")).await.unwrap();
        let err = store.create(record("ghost")).await.unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken));
    }

    #[tokio::test]
    async fn username_uniqueness_is_case_insensitive() {
        let store = MemoryVaultStore::new();
        store.create(record("Ghost")).await.unwrap();
        let err = store.create(record("gHOST")).await.unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken));

        let found = store.find_by_username("GHOST").await.unwrap();
        assert_eq!(found.unwrap().username, "Ghost");
    }

    #[tokio::test]
    async fn settings_patch_is_partial() {
        let store = MemoryVaultStore::new();
        let vault = store.create(record("ghost")).await.unwrap();

        let updated = store
            .update_settings(
                vault.id,
                VaultSettingsPatch {
                    is_view_only: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_view_only);
        assert!(!updated.is_locked);
        assert_eq!(updated.failed_attempts, 0);
    }

    #[tokio::test]
    async fn missing_vault_is_not_found() {
        let store = MemoryVaultStore::new();
        let ghost = VaultId::new();
        let err = store
            .update_settings(ghost, VaultSettingsPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == ghost));
    }

    #[tokio::test]
    async fn delete_releases_the_username() {
        let store = MemoryVaultStore::new();
        let vault = store.create(record("ghost")).await.unwrap();
        store.delete(vault.id).await.unwrap();
        assert!(store.find_by_username("ghost").await.unwrap().is_none());
        // The name can be claimed again.
        store.create(record("ghost")).await.unwrap();
    }

    /// Concurrent failed attempts must not miss the threshold crossing: with
    /// five bumps racing, exactly one observes the counter reach five and
    /// every outcome agrees the vault ended locked.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failed_attempts_never_miss_the_lock() {
        let store = Arc::new(MemoryVaultStore::new());
        let vault = store.create(record("ghost")).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let store = Arc::clone(&store);
            let id = vault.id;
            tasks.push(tokio::spawn(async move {
                store.record_failed_attempt(id, 5).await.unwrap()
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let after = store.find_by_id(vault.id).await.unwrap().unwrap();
        assert_eq!(after.failed_attempts, 5);
        assert!(after.is_locked);
    }
}
