//! Batch export: hydrate an ordered asset list and assemble one archive.
//!
//! Every asset gets a fresh resolve (cached locators are for viewing, not
//! for export), failures stay per-item, and the survivors are zipped in
//! input order with deterministic collision suffixing. Progress is published
//! through a `watch` channel so callers can poll or await updates without
//! ever blocking the pipeline.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::transfer::AssetTransfer;
use crate::vault::{Asset, AssetId};

use super::hydrate::HydrateError;

/// Concurrent hydrations per export run unless the caller chooses otherwise.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Errors that abort a whole export run. Per-item failures never do; they
/// end up in [`ExportOutcome::failed`].
#[derive(Error, Debug)]
pub enum ExportError {
    /// Every selected asset failed to hydrate (or none were selected).
    #[error("no assets could be hydrated for export")]
    Empty,

    /// The caller cancelled the run.
    #[error("export cancelled")]
    Cancelled,

    #[error("archive assembly failed: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive assembly failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Queued,
    Resolving,
    Fetching,
    Assembling,
    Done,
}

impl std::fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExportPhase::Queued => "queued",
            ExportPhase::Resolving => "resolving",
            ExportPhase::Fetching => "fetching",
            ExportPhase::Assembling => "assembling",
            ExportPhase::Done => "done",
        })
    }
}

/// Progress snapshot published after every state change.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    pub phase: ExportPhase,
    /// Items finished (successfully or not) out of `total`.
    pub completed: usize,
    pub total: usize,
    /// Name of the asset currently in flight, when one is.
    pub current: Option<String>,
}

/// Cooperative cancellation for an export run. Cancellation is coarse: items
/// already in flight finish, queued items never start.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// One asset the run could not hydrate, with the reason, so the caller can
/// retry exactly these.
#[derive(Debug)]
pub struct FailedItem {
    pub id: AssetId,
    pub name: String,
    pub error: HydrateError,
}

/// A finished export: the archive plus the failed subset.
#[derive(Debug)]
pub struct ExportOutcome {
    pub archive: Vec<u8>,
    pub file_name: String,
    /// Entry names actually written, in archive order.
    pub archived: Vec<String>,
    pub failed: Vec<FailedItem>,
}

/// A configured batch export over an ordered asset list.
#[derive(Debug)]
pub struct ExportJob<'a, T> {
    transfer: &'a T,
    assets: Vec<Asset>,
    archive_stem: String,
    concurrency: usize,
    cancel: CancelHandle,
    progress: watch::Sender<ExportProgress>,
}

impl<'a, T: AssetTransfer> ExportJob<'a, T> {
    pub fn new(transfer: &'a T, assets: Vec<Asset>, archive_stem: impl Into<String>) -> Self {
        let total = assets.len();
        let (progress, _) = watch::channel(ExportProgress {
            phase: ExportPhase::Queued,
            completed: 0,
            total,
            current: None,
        });
        Self {
            transfer,
            assets,
            archive_stem: archive_stem.into(),
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancelHandle::default(),
            progress,
        }
    }

    pub fn with_concurrency(mut self, bound: usize) -> Self {
        self.concurrency = bound.max(1);
        self
    }

    /// Subscribe to progress updates; any number of receivers may watch.
    pub fn progress(&self) -> watch::Receiver<ExportProgress> {
        self.progress.subscribe()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run the export to completion.
    #[instrument(level = "info", name = "export", skip_all, fields(total = self.assets.len()))]
    pub async fn run(self) -> Result<ExportOutcome, ExportError> {
        let total = self.assets.len();
        if total == 0 {
            return Err(ExportError::Empty);
        }
        info!(concurrency = self.concurrency, "starting export run");

        let completed = AtomicUsize::new(0);
        let completed = &completed;
        let cancel = &self.cancel;
        let progress = &self.progress;
        let transfer = self.transfer;

        // `buffered` (not `buffer_unordered`) keeps results in input order,
        // which the archive layout and the failure report both rely on.
        let results: Vec<Option<Result<Bytes, HydrateError>>> =
            stream::iter(self.assets.iter().map(|asset| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                progress.send_replace(ExportProgress {
                    phase: ExportPhase::Resolving,
                    completed: completed.load(Ordering::SeqCst),
                    total,
                    current: Some(asset.name.clone()),
                });

                let result = async {
                    // Fresh resolve per attempt: derived URLs rotate and any
                    // cached one may already be dead.
                    let url = transfer
                        .resolve(&asset.remote_handle)
                        .await?
                        .ok_or(HydrateError::Unresolvable)?;
                    progress.send_replace(ExportProgress {
                        phase: ExportPhase::Fetching,
                        completed: completed.load(Ordering::SeqCst),
                        total,
                        current: Some(asset.name.clone()),
                    });
                    Ok(transfer.fetch(&url).await?)
                }
                .await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress.send_replace(ExportProgress {
                    phase: ExportPhase::Fetching,
                    completed: done,
                    total,
                    current: None,
                });
                Some(result)
            }))
            .buffered(self.concurrency)
            .collect()
            .await;

        if self.cancel.is_cancelled() {
            info!("export cancelled between items");
            return Err(ExportError::Cancelled);
        }

        let mut fetched: Vec<(usize, Bytes)> = Vec::new();
        let mut failed: Vec<FailedItem> = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Some(Ok(bytes)) => fetched.push((index, bytes)),
                Some(Err(error)) => {
                    let asset = &self.assets[index];
                    warn!(asset = %asset.id, name = %asset.name, %error, "asset failed to hydrate");
                    failed.push(FailedItem {
                        id: asset.id,
                        name: asset.name.clone(),
                        error,
                    });
                }
                None => {}
            }
        }

        if fetched.is_empty() {
            return Err(ExportError::Empty);
        }

        self.progress.send_replace(ExportProgress {
            phase: ExportPhase::Assembling,
            completed: total,
            total,
            current: None,
        });

        let names =
            disambiguate(fetched.iter().map(|(index, _)| self.assets[*index].name.as_str()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for ((_, bytes), name) in fetched.iter().zip(&names) {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(bytes)?;
        }
        let archive = writer.finish()?.into_inner();

        self.progress.send_replace(ExportProgress {
            phase: ExportPhase::Done,
            completed: total,
            total,
            current: None,
        });
        info!(
            archived = names.len(),
            failed = failed.len(),
            bytes = archive.len(),
            "export assembled"
        );

        Ok(ExportOutcome {
            archive,
            file_name: format!("{}.zip", self.archive_stem),
            archived: names,
            failed,
        })
    }
}

/// Resolve duplicate entry names with stable ordinal suffixes: the first
/// occurrence keeps its name, later ones become `name (1).ext`, `name
/// (2).ext`, ... in input order.
fn disambiguate<'n>(names: impl Iterator<Item = &'n str>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut result = Vec::new();
    for name in names {
        let mut candidate = name.to_string();
        let mut ordinal = 0;
        while !used.insert(candidate.clone()) {
            ordinal += 1;
            candidate = ordinal_name(name, ordinal);
        }
        result.push(candidate);
    }
    result
}

fn ordinal_name(name: &str, ordinal: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({ordinal}).{ext}"),
        _ => format!("{name} ({ordinal})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disambiguation_is_stable_and_ordered() {
        let names = disambiguate(["a.jpg", "b.jpg", "a.jpg", "a.jpg"].into_iter());
        assert_eq!(names, vec!["a.jpg", "b.jpg", "a (1).jpg", "a (2).jpg"]);

        // Same input, same output.
        let again = disambiguate(["a.jpg", "b.jpg", "a.jpg", "a.jpg"].into_iter());
        assert_eq!(names, again);
    }

    #[test]
    fn disambiguation_handles_extension_edge_cases() {
        let names = disambiguate(["notes", "notes", ".env", ".env", "tar.gz", "tar.gz"].into_iter());
        assert_eq!(
            names,
            vec![
                "notes",
                "notes (1)",
                ".env",
                ".env (1)",
                "tar.gz",
                "tar (1).gz"
            ]
        );
    }

    #[test]
    fn suffixed_name_colliding_with_a_real_entry_keeps_probing() {
        let names = disambiguate(["a.jpg", "a (1).jpg", "a.jpg"].into_iter());
        assert_eq!(names, vec!["a.jpg", "a (1).jpg", "a (2).jpg"]);
    }
}
