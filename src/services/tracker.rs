//! Bundle generation tracker
//!
//! Drives one generation request from submission to a terminal outcome:
//!
//! 1. `start()` validates the input locally, enters `Validating` and submits
//!    the request.
//! 2. An `exists` answer settles immediately (`AlreadyExists`); a `triggered`
//!    answer enters `Triggered` and spawns the polling task.
//! 3. The polling task sleeps one interval, asks the job runner for status,
//!    and on a successful finish confirms the bundle manifest before settling
//!    on `Ready`. A finished job whose manifest is not yet published stays in
//!    `Processing` and keeps polling.
//! 4. The whole polling task runs under one wall-clock budget; when it
//!    elapses the job is forced to `Failed` with a timeout.
//!
//! Every transition is applied under the state lock and only if it still
//! belongs to the active run, so a response that arrives after `reset()` or
//! after a new `start()` is dropped.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use garde::Validate;

use crate::config::TrackerConfig;
use crate::models::bundle::Bundle;
use crate::models::job::{FailureKind, GenerationJob, JobState};
use crate::models::repository::RepositoryId;
use crate::services::bundle_service::{
    BundleServiceClient, GenerateOutcome, GenerateResponse, JobConclusion, ManifestStatus,
    RunState, ServiceError,
};

/// Callback receiving every job snapshot.
///
/// Runs while the tracker's state lock is held, so it must not call back
/// into the tracker.
pub type JobObserver = Arc<dyn Fn(&GenerationJob) + Send + Sync>;

/// Errors returned directly from [`GenerationTracker::start`].
///
/// Failures after submission are reported through the job snapshot instead.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Repository identifier must not be empty")]
    InvalidInput,

    #[error("A generation job is already {0}; reset the tracker before starting another")]
    JobInProgress(JobState),
}

/// Transient failure of a single status check. Logged, never terminal.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Job status check failed: {0}")]
    JobStatus(#[source] ServiceError),

    #[error("Manifest check failed: {0}")]
    Manifest(#[source] ServiceError),

    #[error("Manifest reported ready without a usable bundle")]
    IncompleteManifest,
}

enum PollOutcome {
    Running { progress: Option<u8> },
    AwaitingManifest,
    Ready(Bundle),
    Failed(String),
}

struct TrackerState {
    job: GenerationJob,
    run_id: Option<Uuid>,
    poller: Option<JoinHandle<()>>,
}

struct Inner {
    client: Arc<dyn BundleServiceClient>,
    config: TrackerConfig,
    observer: Option<JobObserver>,
    updates: watch::Sender<GenerationJob>,
    state: Mutex<TrackerState>,
}

/// Tracks a single bundle generation job.
pub struct GenerationTracker {
    inner: Arc<Inner>,
}

impl GenerationTracker {
    pub fn new(client: Arc<dyn BundleServiceClient>, config: TrackerConfig) -> Self {
        Self::build(client, config, None)
    }

    /// Create a tracker that reports every state change to `observer`.
    pub fn with_observer<F>(client: Arc<dyn BundleServiceClient>, config: TrackerConfig, observer: F) -> Self
    where
        F: Fn(&GenerationJob) + Send + Sync + 'static,
    {
        Self::build(client, config, Some(Arc::new(observer)))
    }

    fn build(
        client: Arc<dyn BundleServiceClient>,
        config: TrackerConfig,
        observer: Option<JobObserver>,
    ) -> Self {
        let (updates, _) = watch::channel(GenerationJob::default());
        Self {
            inner: Arc::new(Inner {
                client,
                config,
                observer,
                updates,
                state: Mutex::new(TrackerState {
                    job: GenerationJob::default(),
                    run_id: None,
                    poller: None,
                }),
            }),
        }
    }

    /// Current job snapshot.
    pub fn snapshot(&self) -> GenerationJob {
        self.inner.state.lock().job.clone()
    }

    /// Receive every job snapshot over a watch channel.
    pub fn subscribe(&self) -> watch::Receiver<GenerationJob> {
        self.inner.updates.subscribe()
    }

    /// Wait until the job is no longer in flight and return its snapshot.
    pub async fn settled(&self) -> GenerationJob {
        let mut rx = self.subscribe();
        let result = rx.wait_for(|job| !job.state.is_active()).await.map(|job| job.clone());
        match result {
            Ok(job) => job,
            // The sender lives in `inner`, which outlives `self`.
            Err(_) => self.snapshot(),
        }
    }

    /// Submit a generation request for `input` and start tracking it.
    ///
    /// Returns once the submission has been answered; polling continues in the
    /// background. Fails without contacting the service when the input is
    /// blank or a job is still in flight. A previous terminal job is replaced.
    pub async fn start(&self, input: &str) -> Result<(), TrackerError> {
        let repository = RepositoryId::parse(input).ok_or(TrackerError::InvalidInput)?;
        let run_id = Uuid::new_v4();

        {
            let mut state = self.inner.state.lock();
            if state.job.state.is_active() {
                return Err(TrackerError::JobInProgress(state.job.state));
            }
            if let Some(poller) = state.poller.take() {
                poller.abort();
            }
            state.run_id = Some(run_id);
            state.job = GenerationJob {
                state: JobState::Validating,
                repository: Some(repository.clone()),
                submitted_at: Some(Utc::now()),
                ..GenerationJob::default()
            };
            self.inner.publish(&state.job);
        }

        info!(run_id = %run_id, repository = %repository, "Submitting bundle generation request");
        metrics::counter!("bundle_generation_requests_total").increment(1);

        let response = self.inner.client.generate(&repository).await;
        self.inner.handle_submission(run_id, repository, response);
        Ok(())
    }

    /// Cancel any polling, clear the job and return to `Idle`.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        if let Some(poller) = state.poller.take() {
            poller.abort();
        }
        if let Some(run_id) = state.run_id.take() {
            debug!(run_id = %run_id, "Tracker reset");
        }
        if state.job != GenerationJob::default() {
            state.job = GenerationJob::default();
            self.inner.publish(&state.job);
        }
    }
}

impl Drop for GenerationTracker {
    fn drop(&mut self) {
        if let Some(poller) = self.inner.state.lock().poller.take() {
            poller.abort();
        }
    }
}

impl Inner {
    fn publish(&self, job: &GenerationJob) {
        if job.state.is_terminal() {
            metrics::counter!("bundle_jobs_finished_total", "outcome" => job.state.to_string())
                .increment(1);
        }
        if let Some(observer) = &self.observer {
            observer(job);
        }
        self.updates.send_replace(job.clone());
    }

    fn is_current(&self, run_id: Uuid) -> bool {
        self.state.lock().run_id == Some(run_id)
    }

    /// Apply `update` to the job if `run_id` is still the active run and the
    /// job has not settled. Returns whether the update was applied.
    fn transition(&self, run_id: Uuid, update: impl FnOnce(&mut GenerationJob)) -> bool {
        let mut state = self.state.lock();
        Self::transition_locked(self, &mut state, run_id, update)
    }

    fn transition_locked(
        &self,
        state: &mut TrackerState,
        run_id: Uuid,
        update: impl FnOnce(&mut GenerationJob),
    ) -> bool {
        if state.run_id != Some(run_id) {
            debug!(run_id = %run_id, "Dropping update for superseded run");
            return false;
        }
        if state.job.state.is_terminal() {
            return false;
        }

        let before = state.job.clone();
        update(&mut state.job);
        if state.job != before {
            if state.job.state != before.state {
                debug!(run_id = %run_id, from = %before.state, to = %state.job.state, "Job state changed");
            }
            self.publish(&state.job);
        }
        true
    }

    fn handle_submission(
        self: &Arc<Self>,
        run_id: Uuid,
        repository: RepositoryId,
        response: Result<GenerateResponse, ServiceError>,
    ) {
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(run_id = %run_id, repository = %repository, error = %e, "Generation request failed");
                self.transition(run_id, |job| job.fail(FailureKind::Service, e.to_string()));
                return;
            }
        };

        match response.outcome {
            GenerateOutcome::Exists => match response.bundle.filter(|b| b.validate().is_ok()) {
                Some(bundle) => {
                    info!(run_id = %run_id, bundle = %bundle.full_name(), "Bundle already exists");
                    self.transition(run_id, |job| job.complete(JobState::AlreadyExists, bundle));
                }
                None => {
                    warn!(run_id = %run_id, "Service reported an existing bundle without a usable descriptor");
                    self.transition(run_id, |job| {
                        job.fail(
                            FailureKind::Service,
                            "Bundle service reported an existing bundle but returned no download information",
                        )
                    });
                }
            },
            GenerateOutcome::Triggered => {
                let Some(job_id) = response.job_id.filter(|id| !id.trim().is_empty()) else {
                    warn!(run_id = %run_id, "Service accepted the request without a job id");
                    self.transition(run_id, |job| {
                        job.fail(
                            FailureKind::Service,
                            "Bundle service accepted the request but returned no job id",
                        )
                    });
                    return;
                };

                let mut state = self.state.lock();
                let applied = self.transition_locked(&mut state, run_id, |job| {
                    job.state = JobState::Triggered;
                    job.job_id = Some(job_id.clone());
                    job.job_url = response.job_url;
                    job.estimated_duration = response.estimated_duration;
                    job.size_estimate = response.size_estimate;
                });
                if applied {
                    info!(run_id = %run_id, job_id = %job_id, "Bundle generation triggered");
                    let inner = Arc::clone(self);
                    state.poller = Some(tokio::spawn(inner.run_poller(run_id, job_id, repository)));
                }
            }
            GenerateOutcome::Error => {
                let message = response
                    .error_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Bundle service rejected the generation request".to_string());
                warn!(run_id = %run_id, error = %message, "Generation request rejected");
                self.transition(run_id, |job| job.fail(FailureKind::Service, message));
            }
        }
    }

    async fn run_poller(self: Arc<Self>, run_id: Uuid, job_id: String, repository: RepositoryId) {
        let budget = self.config.timeout;
        let polling = self.poll_until_settled(run_id, &job_id, &repository);

        if tokio::time::timeout(budget, polling).await.is_err() {
            warn!(
                run_id = %run_id,
                job_id = %job_id,
                budget_secs = budget.as_secs(),
                "Bundle generation timed out"
            );
            self.transition(run_id, |job| {
                job.fail(
                    FailureKind::Timeout,
                    format!(
                        "Bundle generation did not finish within {} seconds",
                        budget.as_secs()
                    ),
                )
            });
        }
    }

    async fn poll_until_settled(&self, run_id: Uuid, job_id: &str, repository: &RepositoryId) {
        let mut polls: u32 = 0;

        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            if !self.is_current(run_id) {
                return;
            }

            polls += 1;
            metrics::counter!("bundle_job_polls_total").increment(1);

            match self.check_once(job_id, repository).await {
                Ok(PollOutcome::Running { progress }) => {
                    debug!(run_id = %run_id, job_id = %job_id, polls, ?progress, "Job still running");
                    self.transition(run_id, |job| {
                        job.state = JobState::Processing;
                        if let Some(progress) = progress {
                            job.progress_percent = progress.min(100);
                        }
                    });
                }
                Ok(PollOutcome::AwaitingManifest) => {
                    debug!(run_id = %run_id, job_id = %job_id, polls, "Job finished, manifest not yet published");
                    self.transition(run_id, |job| job.state = JobState::Processing);
                }
                Ok(PollOutcome::Ready(bundle)) => {
                    info!(run_id = %run_id, job_id = %job_id, polls, bundle = %bundle.full_name(), "Bundle ready");
                    self.transition(run_id, |job| job.complete(JobState::Ready, bundle));
                    return;
                }
                Ok(PollOutcome::Failed(message)) => {
                    warn!(run_id = %run_id, job_id = %job_id, polls, error = %message, "Bundle generation failed");
                    self.transition(run_id, |job| job.fail(FailureKind::JobFailed, message));
                    return;
                }
                Err(e) => {
                    metrics::counter!("bundle_job_poll_errors_total").increment(1);
                    warn!(run_id = %run_id, job_id = %job_id, polls, error = %e, "Status check failed, will retry");
                }
            }
        }
    }

    async fn check_once(&self, job_id: &str, repository: &RepositoryId) -> Result<PollOutcome, PollError> {
        let status = self
            .client
            .job_status(job_id)
            .await
            .map_err(PollError::JobStatus)?;

        match status.state {
            RunState::InProgress => {
                return Ok(PollOutcome::Running {
                    progress: status.progress_percent,
                })
            }
            RunState::Completed => match status.conclusion {
                Some(JobConclusion::Success) => {}
                Some(conclusion) => {
                    return Ok(PollOutcome::Failed(format!(
                        "Bundle generation job finished with conclusion '{conclusion}'"
                    )))
                }
                None => {
                    return Ok(PollOutcome::Failed(
                        "Bundle generation job finished without a conclusion".to_string(),
                    ))
                }
            },
        }

        let manifest = self
            .client
            .manifest(repository)
            .await
            .map_err(PollError::Manifest)?;

        match manifest.status {
            ManifestStatus::Pending => Ok(PollOutcome::AwaitingManifest),
            ManifestStatus::Ready => manifest
                .bundle
                .filter(|b| b.validate().is_ok())
                .map(PollOutcome::Ready)
                .ok_or(PollError::IncompleteManifest),
        }
    }
}
