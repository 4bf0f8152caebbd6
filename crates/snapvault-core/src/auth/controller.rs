//! The authentication/lockout state machine.
//!
//! One attempt walks `Anonymous -> Authenticating -> {Authenticated, Locked,
//! Rejected}`. The lock flag is checked before any digest work so a locked
//! vault never leaks whether a guessed PIN would have matched, and a failed
//! check bumps the counter and trips the lock in one atomic store update.

use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::store::{StoreError, VaultStore};
use crate::vault::{Vault, VaultId, VaultSettingsPatch};

use super::pin::{PinError, PinHasher};

/// Consecutive failed attempts after which a vault locks permanently.
pub const LOCK_THRESHOLD: u32 = 5;

/// Authentication outcomes, each distinguishable so a caller can give
/// precise feedback without leaking more than it has to.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No vault under that username.
    #[error("vault not found")]
    VaultNotFound,

    /// The vault is locked; nothing about the PIN was checked.
    #[error("vault is locked")]
    Locked,

    /// The PIN did not match.
    #[error("invalid PIN")]
    InvalidPin,

    #[error(transparent)]
    Pin(#[from] PinError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Gate in front of a vault: verifies credentials and drives the lockout
/// counter.
#[derive(Debug)]
pub struct AccessController<'a, S> {
    store: &'a S,
    hasher: &'a PinHasher,
}

impl<'a, S: VaultStore> AccessController<'a, S> {
    pub fn new(store: &'a S, hasher: &'a PinHasher) -> Self {
        Self { store, hasher }
    }

    /// Validate username plus PIN and hand back the vault on success.
    ///
    /// Success resets the failed-attempt counter; failure bumps it and trips
    /// the permanent lock once it reaches [`LOCK_THRESHOLD`]. There is no
    /// durable session: the caller holds the returned [`Vault`] and
    /// re-presents it for subsequent operations.
    #[instrument(level = "info", skip_all, fields(username = %username))]
    pub async fn authenticate(
        &self,
        username: &str,
        pin: &SecretString,
    ) -> Result<Vault, AuthError> {
        let vault = self
            .store
            .find_by_username(username)
            .await?
            .ok_or(AuthError::VaultNotFound)?;

        // Locked vaults refuse before any digest work.
        if vault.is_locked {
            info!(vault = %vault.id, "authentication refused: locked");
            return Err(AuthError::Locked);
        }

        // Digest verification is slow by design; keep it off the runtime.
        let hasher = self.hasher.clone();
        let candidate = pin.clone();
        let digest = vault.pin_digest.clone();
        let matched =
            tokio::task::spawn_blocking(move || hasher.verify(&candidate, &digest))
                .await
                .map_err(|e| PinError::Hash(e.to_string()))??;

        if matched {
            let vault = if vault.failed_attempts > 0 {
                self.store
                    .update_settings(
                        vault.id,
                        VaultSettingsPatch {
                            failed_attempts: Some(0),
                            ..Default::default()
                        },
                    )
                    .await?
            } else {
                vault
            };
            info!(vault = %vault.id, "authentication succeeded");
            return Ok(vault);
        }

        let after = self
            .store
            .record_failed_attempt(vault.id, LOCK_THRESHOLD)
            .await?;
        if after.is_locked {
            warn!(vault = %after.id, attempts = after.failed_attempts, "lock threshold reached");
            Err(AuthError::Locked)
        } else {
            info!(vault = %after.id, attempts = after.failed_attempts, "invalid PIN");
            Err(AuthError::InvalidPin)
        }
    }

    /// Emergency self-lock: one-way, independent of the attempt counter,
    /// and only ever caller-invoked.
    #[instrument(level = "info", skip(self))]
    pub async fn panic_lock(&self, id: VaultId) -> Result<Vault, AuthError> {
        let vault = self
            .store
            .update_settings(
                id,
                VaultSettingsPatch {
                    is_locked: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        warn!(vault = %vault.id, "emergency lock engaged");
        Ok(vault)
    }
}
