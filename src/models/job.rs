use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::models::bundle::Bundle;
use crate::models::repository::RepositoryId;

/// Lifecycle state of a bundle generation job as seen by the client.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, EnumString, Display, AsRefStr, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Validating,
    AlreadyExists,
    Triggered,
    Processing,
    Ready,
    Failed,
}

impl JobState {
    /// No further automatic transition happens from a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::AlreadyExists | JobState::Ready | JobState::Failed)
    }

    /// A job is in flight between submission and a terminal outcome.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobState::Validating | JobState::Triggered | JobState::Processing
        )
    }
}

/// Category of a terminal failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Submission was rejected or the service answered with something unusable.
    Service,
    /// The job runner reported that the build failed.
    JobFailed,
    /// No terminal outcome within the polling budget.
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub kind: FailureKind,
    pub message: String,
}

/// Snapshot of one bundle generation attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationJob {
    pub state: JobState,
    pub repository: Option<RepositoryId>,
    pub job_id: Option<String>,
    pub job_url: Option<String>,
    pub progress_percent: u8,
    pub estimated_duration: Option<String>,
    pub size_estimate: Option<String>,
    pub error_detail: Option<ErrorDetail>,
    pub bundle: Option<Bundle>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    pub(crate) fn fail(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.state = JobState::Failed;
        self.bundle = None;
        self.error_detail = Some(ErrorDetail {
            kind,
            message: message.into(),
        });
    }

    pub(crate) fn complete(&mut self, state: JobState, bundle: Bundle) {
        self.state = state;
        self.error_detail = None;
        self.bundle = Some(bundle);
    }
}
