//! Bundle Service client
//!
//! The bundle service accepts generation requests, reports the status of the
//! job runner that builds a bundle, and publishes a manifest of downloadable
//! bundles. [`BundleServiceClient`] is the seam the tracker and catalog talk
//! through; [`HttpBundleService`] is the reqwest-backed implementation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;
use strum::Display;

use crate::models::bundle::Bundle;
use crate::models::repository::RepositoryId;
use crate::services::download::{self, DownloadError};

/// Result of a generation request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerateOutcome {
    /// A bundle for this repository is already published.
    Exists,
    /// A new job was accepted.
    Triggered,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub outcome: GenerateOutcome,
    #[serde(default, alias = "run_id", alias = "job_id")]
    pub job_id: Option<String>,
    #[serde(default, alias = "run_url", alias = "job_url")]
    pub job_url: Option<String>,
    #[serde(default, alias = "estimated_time", alias = "estimated_duration")]
    pub estimated_duration: Option<String>,
    #[serde(default, alias = "size_estimate")]
    pub size_estimate: Option<String>,
    #[serde(default)]
    pub bundle: Option<Bundle>,
    #[serde(default, alias = "error", alias = "message", alias = "error_message")]
    pub error_message: Option<String>,
}

/// Run state reported by the job runner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[serde(alias = "queued", alias = "pending")]
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobConclusion {
    Success,
    Failure,
    Cancelled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    #[serde(alias = "status")]
    pub state: RunState,
    #[serde(default, alias = "progress", alias = "progress_percent")]
    pub progress_percent: Option<u8>,
    #[serde(default)]
    pub conclusion: Option<JobConclusion>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    Ready,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestResponse {
    pub status: ManifestStatus,
    #[serde(default)]
    pub bundle: Option<Bundle>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogResponse {
    #[serde(default, deserialize_with = "skip_malformed_bundles")]
    pub bundles: Vec<Bundle>,
}

/// Decode catalog entries one at a time, dropping those that do not parse.
fn skip_malformed_bundles<'de, D>(deserializer: D) -> Result<Vec<Bundle>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Bundle>(entry) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed catalog entry");
                None
            }
        })
        .collect())
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    repository: &'a str,
}

/// Operations offered by the bundle service.
#[async_trait]
pub trait BundleServiceClient: Send + Sync {
    /// Ask the service to generate a bundle for `repository`.
    async fn generate(&self, repository: &RepositoryId) -> Result<GenerateResponse, ServiceError>;

    /// Current status of a generation job.
    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ServiceError>;

    /// Whether the bundle for `repository` has been published.
    async fn manifest(&self, repository: &RepositoryId) -> Result<ManifestResponse, ServiceError>;

    /// Every bundle currently published.
    async fn catalog(&self) -> Result<CatalogResponse, ServiceError>;
}

/// HTTP client for the bundle service.
pub struct HttpBundleService {
    http: Client,
    base_url: Url,
}

impl HttpBundleService {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .user_agent(concat!("bundle-tracker/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;

        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ServiceError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ServiceError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { http, base_url })
    }

    /// Download a published bundle to `output_path`.
    pub async fn download<F>(
        &self,
        bundle: &Bundle,
        output_path: &Path,
        progress: F,
    ) -> Result<u64, DownloadError>
    where
        F: FnMut(u64),
    {
        download::download_bundle(&self.http, bundle, output_path, progress).await
    }

    /// Build an endpoint URL from path segments below the base URL.
    ///
    /// Segments are percent-encoded individually, so opaque job ids cannot
    /// escape their path position.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        serde_json::from_str(&body).map_err(ServiceError::Malformed)
    }
}

#[async_trait]
impl BundleServiceClient for HttpBundleService {
    async fn generate(&self, repository: &RepositoryId) -> Result<GenerateResponse, ServiceError> {
        let url = self.endpoint(&["api", "bundles", "generate"])?;
        tracing::debug!(%url, repository = %repository, "Requesting bundle generation");

        let response = self
            .http
            .post(url)
            .json(&GenerateRequest {
                repository: repository.as_str(),
            })
            .send()
            .await?;

        // The service reports validation problems as a 4xx carrying a
        // regular `outcome: error` body; keep its message when present.
        if response.status().is_client_error() && response.status() != StatusCode::NOT_FOUND {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return match serde_json::from_str::<GenerateResponse>(&body) {
                Ok(parsed) if parsed.outcome == GenerateOutcome::Error => Ok(parsed),
                _ => Err(ServiceError::Status {
                    status,
                    body: truncate(&body, 512),
                }),
            };
        }

        Self::read_json(response).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ServiceError> {
        let url = self.endpoint(&["api", "bundles", "jobs", job_id])?;
        let response = self.http.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn manifest(&self, repository: &RepositoryId) -> Result<ManifestResponse, ServiceError> {
        let mut url = self.endpoint(&["api", "bundles", "manifest"])?;
        url.query_pairs_mut()
            .append_pair("repository", repository.as_str());
        let response = self.http.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn catalog(&self) -> Result<CatalogResponse, ServiceError> {
        let url = self.endpoint(&["api", "bundles"])?;
        let response = self.http.get(url).send().await?;
        Self::read_json(response).await
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Error type for bundle service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP request to bundle service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bundle service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse bundle service response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid bundle service URL: {0}")]
    InvalidUrl(String),
}
