use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use publisher_core::PROGRESS_COMPLETE;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use url::Url;

use crate::PublishSettings;

const REQUESTED_WITH: (&str, &str) = ("X-Requested-With", "XMLHTTPREQUEST");
const ARCHIVE_MIME: &str = "application/zip";
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub endpoint: String,
    pub access_token: String,
    pub title: String,
    pub build_id: Option<String>,
    pub project_id: Option<String>,
    pub archive_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Key identifying the server-side processing job.
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRequest {
    pub endpoint: String,
    pub access_token: String,
    pub key: String,
}

/// Best-effort reading of a status response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressReport {
    pub project_id: String,
    pub url: String,
    /// Clamped to 0..=100.
    pub progress: u8,
    pub error: String,
}

impl ProgressReport {
    /// Finished or failed: no further status query is needed.
    pub fn is_terminal(&self) -> bool {
        self.progress >= PROGRESS_COMPLETE || !self.error.is_empty()
    }

    /// Reported complete and error-free, yet nothing to link to.
    pub fn is_complete_without_url(&self) -> bool {
        self.progress >= PROGRESS_COMPLETE && self.error.is_empty() && self.url.trim().is_empty()
    }

    /// Read a status body leniently: unknown or mistyped fields fall back to
    /// their defaults. Only a body that is not a JSON object is rejected.
    pub fn from_body(body: &str) -> Result<Self, TransportError> {
        let value: Value = serde_json::from_str(body).map_err(|err| {
            TransportError::new(TransportFailure::MalformedResponse, err.to_string())
        })?;
        if !value.is_object() {
            return Err(TransportError::new(
                TransportFailure::MalformedResponse,
                "status body is not an object",
            ));
        }
        let body: StatusBody = serde_json::from_value(value).map_err(|err| {
            TransportError::new(TransportFailure::MalformedResponse, err.to_string())
        })?;
        Ok(Self {
            project_id: body.project_id,
            url: body.url,
            progress: body.progress,
            error: body.error,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StatusBody {
    #[serde(deserialize_with = "lenient_text")]
    project_id: String,
    #[serde(deserialize_with = "lenient_text")]
    url: String,
    #[serde(deserialize_with = "lenient_percent")]
    progress: u8,
    #[serde(deserialize_with = "lenient_text")]
    error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UploadBody {
    key: String,
}

/// Strings as is, numbers as their decimal text, anything else empty.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    })
}

/// Numbers or numeric strings clamped to 0..=100; anything else is 0.
fn lenient_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(raw.clamp(0.0, f64::from(PROGRESS_COMPLETE)) as u8)
}

/// Byte counters shared between an upload and whoever reports its progress.
#[derive(Debug, Default)]
pub struct UploadCounter {
    sent: AtomicU64,
    total: AtomicU64,
    finished: AtomicBool,
}

impl UploadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn add_sent(&self, bytes: u64) {
        self.sent.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Percent of bytes sent, 0 while the total is unknown.
    pub fn percent(&self) -> u8 {
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return 0;
        }
        let sent = self.sent.load(Ordering::SeqCst).min(total);
        (sent.saturating_mul(100) / total) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportFailure,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn aborted() -> Self {
        Self::new(TransportFailure::Aborted, "request aborted")
    }

    pub fn is_aborted(&self) -> bool {
        self.kind == TransportFailure::Aborted
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} ({})", self.kind, self.message)
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    MalformedResponse,
    Aborted,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::InvalidUrl => write!(f, "invalid url"),
            TransportFailure::HttpStatus(code) => write!(f, "http status {code}"),
            TransportFailure::Timeout => write!(f, "timeout"),
            TransportFailure::Network => write!(f, "network error"),
            TransportFailure::MalformedResponse => write!(f, "malformed response"),
            TransportFailure::Aborted => write!(f, "aborted"),
        }
    }
}

#[async_trait::async_trait]
pub trait PublishTransport: Send + Sync {
    /// Send the archive, advancing `counter` as bytes leave.
    async fn upload(
        &self,
        request: UploadRequest,
        counter: Arc<UploadCounter>,
    ) -> Result<UploadReceipt, TransportError>;

    async fn progress(&self, request: ProgressRequest) -> Result<ProgressReport, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: PublishSettings,
}

impl ReqwestTransport {
    pub fn new(settings: PublishSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, TransportError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| TransportError::new(TransportFailure::Network, err.to_string()))
    }
}

#[async_trait::async_trait]
impl PublishTransport for ReqwestTransport {
    async fn upload(
        &self,
        request: UploadRequest,
        counter: Arc<UploadCounter>,
    ) -> Result<UploadReceipt, TransportError> {
        let endpoint = Url::parse(&request.endpoint)
            .map_err(|err| TransportError::new(TransportFailure::InvalidUrl, err.to_string()))?;
        let client = self.build_client()?;

        let payload = Bytes::from(tokio::fs::read(&request.archive_path).await.map_err(|err| {
            TransportError::new(
                TransportFailure::Network,
                format!("cannot read {:?}: {err}", request.archive_path),
            )
        })?);
        let total = payload.len() as u64;
        counter.set_total(total);

        let file_name = request
            .archive_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive.zip".to_string());
        let file_part = Part::stream_with_length(counted_body(payload, counter), total)
            .file_name(file_name)
            .mime_str(ARCHIVE_MIME)
            .map_err(|err| TransportError::new(TransportFailure::Network, err.to_string()))?;

        let mut form = Form::new().text("title", request.title);
        if let Some(build_id) = request.build_id.filter(|id| !id.is_empty()) {
            form = form.text("buildGUID", build_id);
        }
        if let Some(project_id) = request.project_id.filter(|id| !id.is_empty()) {
            form = form.text("projectId", project_id);
        }
        let form = form.part("file", file_part);

        let response = client
            .post(endpoint.as_str())
            .bearer_auth(&request.access_token)
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                TransportFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = response.text().await.map_err(map_reqwest_error)?;
        let body: UploadBody = serde_json::from_str(&body).map_err(|err| {
            TransportError::new(TransportFailure::MalformedResponse, err.to_string())
        })?;
        if body.key.is_empty() {
            return Err(TransportError::new(
                TransportFailure::MalformedResponse,
                "upload response carries no key",
            ));
        }

        Ok(UploadReceipt { key: body.key })
    }

    async fn progress(&self, request: ProgressRequest) -> Result<ProgressReport, TransportError> {
        let mut endpoint = Url::parse(&request.endpoint)
            .map_err(|err| TransportError::new(TransportFailure::InvalidUrl, err.to_string()))?;
        endpoint.query_pairs_mut().append_pair("key", &request.key);
        let client = self.build_client()?;

        let response = client
            .get(endpoint.as_str())
            .bearer_auth(&request.access_token)
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                TransportFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = response.text().await.map_err(map_reqwest_error)?;
        ProgressReport::from_body(&body)
    }
}

/// Request body that streams `payload` in chunks, counting what was handed out.
fn counted_body(payload: Bytes, counter: Arc<UploadCounter>) -> reqwest::Body {
    let chunks = (0..payload.len())
        .step_by(UPLOAD_CHUNK_BYTES)
        .map(|start| payload.slice(start..(start + UPLOAD_CHUNK_BYTES).min(payload.len())))
        .collect::<Vec<_>>();
    let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        counter.add_sent(chunk.len() as u64);
        Ok::<Bytes, std::io::Error>(chunk)
    }));
    reqwest::Body::wrap_stream(stream)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(TransportFailure::Timeout, err.to_string());
    }
    TransportError::new(TransportFailure::Network, err.to_string())
}
