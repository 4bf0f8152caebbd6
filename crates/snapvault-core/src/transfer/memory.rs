//! In-memory blob store with rotating URLs.
//!
//! Models the awkward part of the real store: every `resolve` mints a new
//! URL generation, and `probe` only vouches for the newest generation, so
//! previously handed-out locators go stale exactly the way rotating fetch
//! URLs do. Fetching an older URL still works as long as the object exists,
//! matching the grace window of the real store.
//!
//! Failure injection (`break_resolve`, `break_fetch`) drives the
//! partial-failure paths in the pipeline tests.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use url::Url;

use super::{AssetTransfer, RemoteHandle, TransferError, TransferProgress, MAX_ASSET_BYTES};

const UPLOAD_CHUNK: usize = 64 * 1024;

/// Scriptable [`AssetTransfer`] double.
#[derive(Debug, Default)]
pub struct MemoryTransfer {
    objects: DashMap<RemoteHandle, Bytes>,
    generation: AtomicU64,
    next_handle: AtomicU64,
    broken_resolve: DashSet<RemoteHandle>,
    broken_fetch: DashSet<RemoteHandle>,
}

impl MemoryTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `resolve` report the handle as currently unresolvable.
    pub fn break_resolve(&self, handle: &RemoteHandle) {
        self.broken_resolve.insert(handle.clone());
    }

    /// Make `fetch` fail for URLs pointing at this handle.
    pub fn break_fetch(&self, handle: &RemoteHandle) {
        self.broken_fetch.insert(handle.clone());
    }

    /// Bytes currently stored for a handle, if any.
    pub fn stored(&self, handle: &RemoteHandle) -> Option<Bytes> {
        self.objects.get(handle).map(|bytes| bytes.clone())
    }

    /// Number of resolves served so far.
    pub fn resolve_count(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn handle_of(url: &Url) -> RemoteHandle {
        RemoteHandle::from(url.path().trim_start_matches('/'))
    }

    fn generation_of(url: &Url) -> Option<u64> {
        url.query_pairs()
            .find(|(key, _)| key == "gen")
            .and_then(|(_, value)| value.parse().ok())
    }
}

impl AssetTransfer for MemoryTransfer {
    async fn upload<F>(
        &self,
        bytes: Bytes,
        _filename: &str,
        on_progress: F,
    ) -> Result<RemoteHandle, TransferError>
    where
        F: Fn(TransferProgress) + Send + 'static,
    {
        if bytes.len() as u64 > MAX_ASSET_BYTES {
            return Err(TransferError::SizeRejected);
        }

        let total = bytes.len() as u64;
        let mut sent = 0u64;
        for chunk in bytes.chunks(UPLOAD_CHUNK) {
            sent += chunk.len() as u64;
            on_progress(TransferProgress {
                fraction: sent as f32 / total.max(1) as f32,
                bytes_sent: sent,
                total_bytes: total,
            });
        }
        if total == 0 {
            on_progress(TransferProgress {
                fraction: 1.0,
                bytes_sent: 0,
                total_bytes: 0,
            });
        }

        let handle = RemoteHandle::from(format!(
            "mem-{}",
            self.next_handle.fetch_add(1, Ordering::SeqCst)
        ));
        self.objects.insert(handle.clone(), bytes);
        Ok(handle)
    }

    async fn resolve(&self, handle: &RemoteHandle) -> Result<Option<Url>, TransferError> {
        if self.broken_resolve.contains(handle) || !self.objects.contains_key(handle) {
            return Ok(None);
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let url = Url::parse(&format!("memory://store/{handle}?gen={generation}"))
            .map_err(|_| TransferError::MalformedResponse)?;
        Ok(Some(url))
    }

    async fn fetch(&self, url: &Url) -> Result<Bytes, TransferError> {
        let handle = Self::handle_of(url);
        if self.broken_fetch.contains(&handle) {
            return Err(TransferError::Refused {
                status: 410,
                detail: "object gone".into(),
            });
        }
        self.objects
            .get(&handle)
            .map(|bytes| bytes.clone())
            .ok_or_else(|| TransferError::Refused {
                status: 404,
                detail: "unknown handle".into(),
            })
    }

    async fn probe(&self, url: &Url) -> bool {
        let current = self.generation.load(Ordering::SeqCst);
        let live_generation = Self::generation_of(url).is_some_and(|g| g == current);
        live_generation && self.objects.contains_key(&Self::handle_of(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[tokio::test]
    async fn upload_reports_monotonic_progress() {
        let transfer = MemoryTransfer::new();
        let calls = Arc::new(AtomicU32::new(0));
        let last = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);
        let last_in = Arc::clone(&last);

        let payload = Bytes::from(vec![7u8; UPLOAD_CHUNK * 2 + 10]);
        let handle = transfer
            .upload(payload.clone(), "blob.bin", move |progress| {
                calls_in.fetch_add(1, Ordering::SeqCst);
                let pct = (progress.fraction * 100.0) as u32;
                assert!(pct >= last_in.swap(pct, Ordering::SeqCst));
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(last.load(Ordering::SeqCst), 100);
        assert_eq!(transfer.stored(&handle).unwrap(), payload);
    }

    #[tokio::test]
    async fn urls_rotate_between_resolves() {
        let transfer = MemoryTransfer::new();
        let handle = transfer
            .upload(Bytes::from_static(b"x"), "x.bin", |_| {})
            .await
            .unwrap();

        let first = transfer.resolve(&handle).await.unwrap().unwrap();
        assert!(transfer.probe(&first).await);

        // A later resolve anywhere rotates the live generation.
        let second = transfer.resolve(&handle).await.unwrap().unwrap();
        assert!(!transfer.probe(&first).await);
        assert!(transfer.probe(&second).await);

        // Stale URLs still fetch while the object exists.
        assert_eq!(transfer.fetch(&first).await.unwrap(), Bytes::from_static(b"x"));
    }

    #[tokio::test]
    async fn broken_resolve_reports_absent() {
        let transfer = MemoryTransfer::new();
        let handle = transfer
            .upload(Bytes::from_static(b"y"), "y.bin", |_| {})
            .await
            .unwrap();
        transfer.break_resolve(&handle);
        assert!(transfer.resolve(&handle).await.unwrap().is_none());
    }
}
