//! Bot-API client for the message-based object store.
//!
//! Uploads go through the bot `sendDocument` endpoint as multipart posts;
//! the store answers with an opaque `file_id` that stays valid for the life
//! of the object. `getFile` exchanges a `file_id` for a download path that
//! rotates and expires, which is why [`resolve`](BotApiTransfer::resolve)
//! is called fresh on every hydration attempt.

use std::time::Duration;

use bytes::Bytes;
use futures::stream;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{AssetTransfer, RemoteHandle, TransferError, TransferProgress, MAX_ASSET_BYTES};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Large media can take a while on slow uplinks.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_TIMEOUT: Duration = Duration::from_secs(120);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const UPLOAD_CHUNK: usize = 64 * 1024;

/// [`AssetTransfer`] over the bot upload API.
#[derive(Debug, Clone)]
pub struct BotApiTransfer {
    http: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl BotApiTransfer {
    pub fn new(
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Result<Self, TransferError> {
        let http = reqwest::Client::builder().user_agent("snapvault").build()?;
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    /// Point the client at a different API host (proxy or test double).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }
}

impl AssetTransfer for BotApiTransfer {
    #[instrument(level = "debug", skip_all, fields(filename = %filename, size = bytes.len()))]
    async fn upload<F>(
        &self,
        bytes: Bytes,
        filename: &str,
        on_progress: F,
    ) -> Result<RemoteHandle, TransferError>
    where
        F: Fn(TransferProgress) + Send + 'static,
    {
        if bytes.len() as u64 > MAX_ASSET_BYTES {
            return Err(TransferError::SizeRejected);
        }

        let total = bytes.len() as u64;
        let part = Part::stream_with_length(progress_body(bytes, on_progress), total)
            .file_name(filename.to_string());
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .part("document", part);

        let resp = self
            .http
            .post(self.method_url("sendDocument"))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Err(TransferError::SizeRejected);
        }
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(TransferError::Refused {
                status: status.as_u16(),
                detail,
            });
        }

        let envelope: ApiEnvelope<SentMessage> = resp
            .json()
            .await
            .map_err(|_| TransferError::MalformedResponse)?;
        if !envelope.ok {
            return Err(TransferError::Refused {
                status: status.as_u16(),
                detail: envelope.description.unwrap_or_default(),
            });
        }

        // The store may recategorise a document (as video, audio, ...), so
        // look for the file id wherever it landed.
        let file_id = envelope
            .result
            .and_then(extract_file_id)
            .ok_or(TransferError::MalformedResponse)?;
        debug!(%file_id, "upload acknowledged");
        Ok(RemoteHandle::from(file_id))
    }

    #[instrument(level = "debug", skip_all, fields(handle = %handle))]
    async fn resolve(&self, handle: &RemoteHandle) -> Result<Option<Url>, TransferError> {
        let resp = self
            .http
            .get(self.method_url("getFile"))
            .query(&[("file_id", handle.as_str())])
            .timeout(RESOLVE_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        match resp.json::<ApiEnvelope<FileInfo>>().await {
            Ok(envelope) if envelope.ok => match envelope.result.and_then(|info| info.file_path) {
                Some(path) => Ok(Some(file_url(&self.api_base, &self.token, &path)?)),
                None => Ok(None),
            },
            Ok(envelope) => {
                debug!(
                    status = status.as_u16(),
                    detail = envelope.description.as_deref().unwrap_or(""),
                    "handle did not resolve"
                );
                Ok(None)
            }
            Err(_) if !status.is_success() => {
                warn!(status = status.as_u16(), "unparseable resolve failure");
                Ok(None)
            }
            Err(_) => Err(TransferError::MalformedResponse),
        }
    }

    async fn fetch(&self, url: &Url) -> Result<Bytes, TransferError> {
        let resp = self
            .http
            .get(url.clone())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransferError::Refused {
                status: status.as_u16(),
                detail: "stale or expired fetch URL".into(),
            });
        }
        Ok(resp.bytes().await?)
    }

    async fn probe(&self, url: &Url) -> bool {
        self.http
            .head(url.clone())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }
}

/// Chunked request body that reports cumulative progress as each chunk is
/// handed to the transport.
fn progress_body<F>(bytes: Bytes, on_progress: F) -> reqwest::Body
where
    F: Fn(TransferProgress) + Send + 'static,
{
    let total = bytes.len() as u64;
    let mut chunks = Vec::with_capacity(bytes.len() / UPLOAD_CHUNK + 1);
    let mut offset = 0;
    while offset < bytes.len() {
        let end = (offset + UPLOAD_CHUNK).min(bytes.len());
        chunks.push(bytes.slice(offset..end));
        offset = end;
    }

    let mut sent = 0u64;
    let stream = stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        on_progress(TransferProgress {
            fraction: sent as f32 / total.max(1) as f32,
            bytes_sent: sent,
            total_bytes: total,
        });
        Ok::<Bytes, std::io::Error>(chunk)
    }));
    reqwest::Body::wrap_stream(stream)
}

fn file_url(api_base: &str, token: &str, file_path: &str) -> Result<Url, TransferError> {
    Url::parse(&format!("{api_base}/file/bot{token}/{file_path}"))
        .map_err(|_| TransferError::MalformedResponse)
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct SentMessage {
    #[serde(default)]
    document: Option<FileRef>,
    #[serde(default)]
    video: Option<FileRef>,
    #[serde(default)]
    animation: Option<FileRef>,
    #[serde(default)]
    audio: Option<FileRef>,
    /// Photo uploads come back as renditions ordered smallest to largest.
    #[serde(default)]
    photo: Option<Vec<FileRef>>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    file_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct FileInfo {
    #[serde(default)]
    file_path: Option<String>,
}

fn extract_file_id(message: SentMessage) -> Option<String> {
    message
        .document
        .or(message.video)
        .or(message.animation)
        .or(message.audio)
        .map(|file| file.file_id)
        .or_else(|| {
            message
                .photo
                .and_then(|renditions| renditions.into_iter().next_back())
                .map(|file| file.file_id)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_prefers_document() {
        let message: SentMessage = serde_json::from_str(
            r#"{"document": {"file_id": "doc-1"}, "photo": [{"file_id": "ph-1"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_file_id(message).as_deref(), Some("doc-1"));
    }

    #[test]
    fn file_id_falls_back_to_recategorised_media() {
        let message: SentMessage =
            serde_json::from_str(r#"{"video": {"file_id": "vid-1"}}"#).unwrap();
        assert_eq!(extract_file_id(message).as_deref(), Some("vid-1"));
    }

    #[test]
    fn file_id_takes_largest_photo_rendition() {
        let message: SentMessage = serde_json::from_str(
            r#"{"photo": [{"file_id": "small"}, {"file_id": "medium"}, {"file_id": "large"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_file_id(message).as_deref(), Some("large"));
    }

    #[test]
    fn file_id_absent_when_nothing_matches() {
        let message: SentMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(extract_file_id(message), None);
    }

    #[test]
    fn envelope_carries_refusal_description() {
        let envelope: ApiEnvelope<SentMessage> = serde_json::from_str(
            r#"{"ok": false, "description": "Request Entity Too Large"}"#,
        )
        .unwrap();
        assert!(!envelope.ok);
        assert_eq!(
            envelope.description.as_deref(),
            Some("Request Entity Too Large")
        );
    }

    #[test]
    fn fetch_urls_embed_the_rotating_path() {
        let url = file_url("https://api.telegram.org", "123:abc", "documents/file_7.bin").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.telegram.org/file/bot123:abc/documents/file_7.bin"
        );
    }

    #[tokio::test]
    async fn oversize_payload_is_rejected_before_any_network_io() {
        let client = BotApiTransfer::new("123:abc", "42")
            .unwrap()
            .with_api_base("http://127.0.0.1:1");
        let payload = Bytes::from(vec![0u8; (MAX_ASSET_BYTES + 1) as usize]);
        let err = client.upload(payload, "big.bin", |_| {}).await.unwrap_err();
        assert!(matches!(err, TransferError::SizeRejected));
    }
}
