//! The remote blob-store boundary.
//!
//! Assets are pushed to a message-based object store through a bot-style
//! upload API. An upload yields an opaque [`RemoteHandle`] that is durable
//! for the life of the asset; URLs derived from it rotate and expire, so
//! [`AssetTransfer::resolve`] must be called fresh for every hydration
//! attempt and its result never cached across sessions.

pub mod bot_api;
pub mod memory;

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub use bot_api::BotApiTransfer;
pub use memory::MemoryTransfer;

/// Hard per-item ceiling enforced before upload, matching the remote
/// store's own limit.
pub const MAX_ASSET_BYTES: u64 = 20 * 1024 * 1024;

/// Opaque, durable reference to uploaded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteHandle(String);

impl RemoteHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RemoteHandle {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for RemoteHandle {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upload progress snapshot handed to the caller's callback.
#[derive(Debug, Clone, Copy)]
pub struct TransferProgress {
    /// Fraction complete (0.0 to 1.0).
    pub fraction: f32,
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

/// Errors from the blob-store boundary.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The payload exceeds the remote store's per-item ceiling. Not
    /// retryable.
    #[error("payload exceeds the remote store's {MAX_ASSET_BYTES}-byte ceiling")]
    SizeRejected,

    /// No acknowledgment within the operation's window. Retryable by the
    /// caller.
    #[error("transfer timed out")]
    Timeout,

    /// The remote store refused the operation. Not retryable without caller
    /// intervention.
    #[error("remote store refused the transfer ({status}): {detail}")]
    Refused { status: u16, detail: String },

    /// The remote store answered with something we could not interpret.
    #[error("malformed response from remote store")]
    MalformedResponse,

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransferError::Timeout
        } else {
            TransferError::Network(err.to_string())
        }
    }
}

/// The blob-store client: push bytes up, turn handles back into bytes.
#[allow(async_fn_in_trait)]
pub trait AssetTransfer {
    /// Stream a payload to the remote store, reporting progress as bytes go
    /// out. Returns the durable handle for the stored object.
    async fn upload<F>(
        &self,
        bytes: Bytes,
        filename: &str,
        on_progress: F,
    ) -> Result<RemoteHandle, TransferError>
    where
        F: Fn(TransferProgress) + Send + 'static;

    /// Exchange a durable handle for a short-lived fetch URL. `Ok(None)`
    /// means the handle could not currently be resolved, which callers
    /// treat as retryable rather than fatal.
    async fn resolve(&self, handle: &RemoteHandle) -> Result<Option<Url>, TransferError>;

    /// Download the bytes behind a previously resolved URL.
    async fn fetch(&self, url: &Url) -> Result<Bytes, TransferError>;

    /// Lightweight existence check for a possibly stale locator.
    async fn probe(&self, url: &Url) -> bool;
}
