//! Scripted bundle service used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bundle_tracker::models::{Bundle, GenerationJob, JobState, RepositoryId};
use bundle_tracker::services::bundle_service::{
    BundleServiceClient, CatalogResponse, GenerateOutcome, GenerateResponse, JobConclusion,
    JobStatusResponse, ManifestResponse, ManifestStatus, RunState, ServiceError,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// A scripted reply: either a value or a simulated transport failure.
#[derive(Clone)]
pub enum Reply<T> {
    Ok(T),
    Unavailable,
}

impl<T> Reply<T> {
    fn into_result(self) -> Result<T, ServiceError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Unavailable => Err(ServiceError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            }),
        }
    }
}

/// A call received by the fake, with the (paused) clock time it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Generate(String),
    JobStatus(String),
    Manifest(String),
    Catalog,
}

/// Replies are taken from the front of each queue; once a queue is empty its
/// `*_default` reply repeats forever.
#[derive(Default)]
struct Script {
    generate: VecDeque<Reply<GenerateResponse>>,
    statuses: VecDeque<Reply<JobStatusResponse>>,
    status_default: Option<Reply<JobStatusResponse>>,
    manifests: VecDeque<Reply<ManifestResponse>>,
    manifest_default: Option<Reply<ManifestResponse>>,
    catalog: Option<Reply<CatalogResponse>>,
}

#[derive(Default)]
pub struct FakeBundleService {
    script: Mutex<Script>,
    calls: Mutex<Vec<(Call, Instant)>>,
    /// When set, `generate` waits for a notification before answering.
    generate_gate: Option<Arc<Notify>>,
    /// When set, `job_status` waits for a notification before answering.
    status_gate: Option<Arc<Notify>>,
    catalog_delay: Duration,
}

impl FakeBundleService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_generate(self, reply: Reply<GenerateResponse>) -> Self {
        self.script.lock().generate.push_back(reply);
        self
    }

    pub fn on_status(self, reply: Reply<JobStatusResponse>) -> Self {
        self.script.lock().statuses.push_back(reply);
        self
    }

    pub fn on_status_default(self, reply: Reply<JobStatusResponse>) -> Self {
        self.script.lock().status_default = Some(reply);
        self
    }

    pub fn on_manifest(self, reply: Reply<ManifestResponse>) -> Self {
        self.script.lock().manifests.push_back(reply);
        self
    }

    pub fn on_manifest_default(self, reply: Reply<ManifestResponse>) -> Self {
        self.script.lock().manifest_default = Some(reply);
        self
    }

    pub fn on_catalog(self, reply: Reply<CatalogResponse>) -> Self {
        self.script.lock().catalog = Some(reply);
        self
    }

    pub fn with_generate_gate(mut self, gate: Arc<Notify>) -> Self {
        self.generate_gate = Some(gate);
        self
    }

    pub fn with_status_gate(mut self, gate: Arc<Notify>) -> Self {
        self.status_gate = Some(gate);
        self
    }

    pub fn with_catalog_delay(mut self, delay: Duration) -> Self {
        self.catalog_delay = delay;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().iter().map(|(call, _)| call.clone()).collect()
    }

    /// Clock times of every job status call, in order.
    pub fn status_call_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(call, _)| matches!(call, Call::JobStatus(_)))
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|(call, _)| pred(call)).count()
    }

    pub fn generate_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Generate(_)))
    }

    pub fn status_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::JobStatus(_)))
    }

    pub fn manifest_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Manifest(_)))
    }

    pub fn catalog_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Catalog))
    }

    fn record(&self, call: Call) {
        self.calls.lock().push((call, Instant::now()));
    }
}

#[async_trait]
impl BundleServiceClient for FakeBundleService {
    async fn generate(&self, repository: &RepositoryId) -> Result<GenerateResponse, ServiceError> {
        self.record(Call::Generate(repository.to_string()));
        if let Some(gate) = &self.generate_gate {
            gate.notified().await;
        }
        let reply = self.script.lock().generate.pop_front();
        reply.unwrap_or(Reply::Unavailable).into_result()
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ServiceError> {
        self.record(Call::JobStatus(job_id.to_string()));
        if let Some(gate) = &self.status_gate {
            gate.notified().await;
        }
        let reply = {
            let mut script = self.script.lock();
            script
                .statuses
                .pop_front()
                .or_else(|| script.status_default.clone())
        };
        reply.unwrap_or(Reply::Unavailable).into_result()
    }

    async fn manifest(&self, repository: &RepositoryId) -> Result<ManifestResponse, ServiceError> {
        self.record(Call::Manifest(repository.to_string()));
        let reply = {
            let mut script = self.script.lock();
            script
                .manifests
                .pop_front()
                .or_else(|| script.manifest_default.clone())
        };
        reply.unwrap_or(Reply::Unavailable).into_result()
    }

    async fn catalog(&self) -> Result<CatalogResponse, ServiceError> {
        self.record(Call::Catalog);
        if !self.catalog_delay.is_zero() {
            tokio::time::sleep(self.catalog_delay).await;
        }
        let reply = self.script.lock().catalog.clone();
        reply.unwrap_or(Reply::Unavailable).into_result()
    }
}

// ── Response builders ────────────────────────────────────────────────

pub fn exists(bundle: Bundle) -> Reply<GenerateResponse> {
    Reply::Ok(GenerateResponse {
        outcome: GenerateOutcome::Exists,
        job_id: None,
        job_url: None,
        estimated_duration: None,
        size_estimate: None,
        bundle: Some(bundle),
        error_message: None,
    })
}

pub fn triggered(job_id: &str, estimate: &str) -> Reply<GenerateResponse> {
    Reply::Ok(GenerateResponse {
        outcome: GenerateOutcome::Triggered,
        job_id: Some(job_id.to_string()),
        job_url: Some(format!("https://ci.example.com/runs/{job_id}")),
        estimated_duration: Some(estimate.to_string()),
        size_estimate: Some("~5MB".to_string()),
        bundle: None,
        error_message: None,
    })
}

pub fn rejected(message: &str) -> Reply<GenerateResponse> {
    Reply::Ok(GenerateResponse {
        outcome: GenerateOutcome::Error,
        job_id: None,
        job_url: None,
        estimated_duration: None,
        size_estimate: None,
        bundle: None,
        error_message: Some(message.to_string()),
    })
}

pub fn running(progress: u8) -> Reply<JobStatusResponse> {
    Reply::Ok(JobStatusResponse {
        state: RunState::InProgress,
        progress_percent: Some(progress),
        conclusion: None,
    })
}

pub fn finished(conclusion: JobConclusion) -> Reply<JobStatusResponse> {
    Reply::Ok(JobStatusResponse {
        state: RunState::Completed,
        progress_percent: Some(100),
        conclusion: Some(conclusion),
    })
}

pub fn manifest_pending() -> Reply<ManifestResponse> {
    Reply::Ok(ManifestResponse {
        status: ManifestStatus::Pending,
        bundle: None,
    })
}

pub fn manifest_ready(bundle: Bundle) -> Reply<ManifestResponse> {
    Reply::Ok(ManifestResponse {
        status: ManifestStatus::Ready,
        bundle: Some(bundle),
    })
}

pub fn catalog(bundles: Vec<Bundle>) -> Reply<CatalogResponse> {
    Reply::Ok(CatalogResponse { bundles })
}

// ── Observer recording ───────────────────────────────────────────────

/// Collects every snapshot an observer receives.
#[derive(Clone, Default)]
pub struct Recorder {
    snapshots: Arc<Mutex<Vec<GenerationJob>>>,
}

impl Recorder {
    pub fn observer(&self) -> impl Fn(&GenerationJob) + Send + Sync + 'static {
        let snapshots = Arc::clone(&self.snapshots);
        move |job: &GenerationJob| snapshots.lock().push(job.clone())
    }

    pub fn states(&self) -> Vec<JobState> {
        self.snapshots.lock().iter().map(|job| job.state).collect()
    }

    pub fn snapshots(&self) -> Vec<GenerationJob> {
        self.snapshots.lock().clone()
    }
}
