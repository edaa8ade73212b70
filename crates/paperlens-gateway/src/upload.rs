use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::HeaderValue;
use serde::Deserialize;

use crate::endpoint::Endpoint;

const FALLBACK_FILENAME: &str = "uploaded.pdf";
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upload rejected with status {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("upload response is not valid json: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("upload response did not include a paper id")]
    MissingId,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    paper_id: Option<String>,
}

/// Client for the document upload collaborator.
#[derive(Debug, Clone)]
pub struct UploadClient {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl UploadClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            endpoint,
        }
    }

    pub async fn upload_file(&self, path: &Path) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(FALLBACK_FILENAME);
        self.upload(filename, bytes).await
    }

    /// Upload raw document bytes and return the document id assigned by the backend.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, UploadError> {
        let url = self.endpoint.upload_url();
        let size = bytes.len();
        tracing::info!(url = %url, filename, size, "uploading document");

        let resp = self
            .client
            .post(&url)
            .header("x-filename", filename_header(filename))
            .header("content-type", "application/pdf")
            .body(bytes)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            tracing::warn!(status = %status, "upload rejected");
            return Err(UploadError::Rejected {
                status,
                body: text.chars().take(BODY_EXCERPT_CHARS).collect(),
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&text)?;
        let paper_id = parsed
            .paper_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(UploadError::MissingId)?;
        tracing::info!(paper_id = %paper_id, "document uploaded");
        Ok(paper_id)
    }
}

fn filename_header(filename: &str) -> HeaderValue {
    let trimmed = filename.trim();
    if trimmed.is_empty() || !trimmed.is_ascii() {
        return HeaderValue::from_static(FALLBACK_FILENAME);
    }
    HeaderValue::from_str(trimmed).unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_FILENAME))
}
