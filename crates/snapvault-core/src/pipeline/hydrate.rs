//! Single-asset hydration.
//!
//! Fetch URLs rotate and expire, so a cached locator is only ever a hint: it
//! gets a lightweight existence probe before reuse and a fresh resolve when
//! the probe fails. Within one pipeline run the freshly resolved URL is
//! remembered per asset, so repeated hydrations of the same asset converge
//! to a single resolve instead of multiplying network calls.

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::transfer::{AssetTransfer, TransferError};
use crate::vault::{Asset, AssetId, CachedLocator};

/// Per-item hydration failures. Collected, not thrown, during batch export.
#[derive(Error, Debug)]
pub enum HydrateError {
    /// The remote handle could not currently be resolved; retryable.
    #[error("remote handle could not be resolved")]
    Unresolvable,

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Resolves assets to live fetch URLs, revalidating cached locators.
#[derive(Debug)]
pub struct Hydrator<'a, T> {
    transfer: &'a T,
    /// Fresh URLs resolved during this run.
    resolved: DashMap<AssetId, Url>,
}

impl<'a, T: AssetTransfer> Hydrator<'a, T> {
    pub fn new(transfer: &'a T) -> Self {
        Self {
            transfer,
            resolved: DashMap::new(),
        }
    }

    /// Return a live locator for the asset.
    ///
    /// Idempotent: a live cached locator is reused as-is, a stale one is
    /// replaced by a fresh resolve, and the result is written back to
    /// `asset.cached_locator`.
    pub async fn locator(&self, asset: &mut Asset) -> Result<Url, HydrateError> {
        if let Some(cached) = &asset.cached_locator {
            if self.transfer.probe(&cached.url).await {
                return Ok(cached.url.clone());
            }
            debug!(asset = %asset.id, "cached locator went stale");
        }

        if let Some(url) = self.resolved.get(&asset.id).map(|url| url.clone()) {
            if self.transfer.probe(&url).await {
                asset.cached_locator = Some(CachedLocator::new(url.clone()));
                return Ok(url);
            }
            self.resolved.remove(&asset.id);
        }

        let url = self
            .transfer
            .resolve(&asset.remote_handle)
            .await?
            .ok_or(HydrateError::Unresolvable)?;
        self.resolved.insert(asset.id, url.clone());
        asset.cached_locator = Some(CachedLocator::new(url.clone()));
        Ok(url)
    }

    /// Hydrate the asset all the way to bytes.
    pub async fn fetch(&self, asset: &mut Asset) -> Result<Bytes, HydrateError> {
        let url = self.locator(asset).await?;
        Ok(self.transfer.fetch(&url).await?)
    }
}
