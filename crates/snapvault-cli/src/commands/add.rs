//! Add command - upload local files into a vault.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Args as ClapArgs;
use tracing::instrument;

use snapvault_core::vault::AssetSource;

use crate::{unlock, Cli, Service};

#[derive(ClapArgs, Clone)]
pub struct Args {
    pub username: String,

    /// Files to upload, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[instrument(level = "info", name = "cmd::add", skip_all, fields(files = args.files.len()))]
pub async fn execute(service: &Service, cli: &Cli, args: &Args) -> Result<()> {
    let vault = unlock(service, cli, &args.username).await?;

    let mut sources = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let bytes = std::fs::read(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("{} has no usable file name", path.display()))?;
        sources.push(AssetSource {
            mime_type: guess_mime(path).to_string(),
            name,
            bytes: Bytes::from(bytes),
        });
    }
    if sources.is_empty() {
        bail!("nothing to upload");
    }

    let outcome = service
        .add_assets(&vault, sources, |name, progress| {
            eprint!("\r{name}: {:>3.0}%", progress.fraction * 100.0);
            let _ = std::io::stderr().flush();
            if progress.bytes_sent == progress.total_bytes {
                eprintln!();
            }
        })
        .await
        .context("upload failed")?;

    let added = outcome.vault.assets.len() - vault.assets.len();
    println!("Added {added} of {} file(s).", added + outcome.rejected.len());
    for rejected in &outcome.rejected {
        eprintln!("  rejected {}: {}", rejected.name, rejected.error);
    }
    Ok(())
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_guessing_covers_the_common_cases() {
        assert_eq!(guess_mime(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(guess_mime(Path::new("unknown.xyz")), "application/octet-stream");
        assert_eq!(guess_mime(Path::new("no_extension")), "application/octet-stream");
    }
}
