//! CodeGraphContext bundle client
//!
//! This library requests generation of repository bundles from the bundle
//! service, tracks the asynchronous generation job until the bundle is
//! published, and browses the catalog of bundles that already exist.

pub mod config;
pub mod models;
pub mod services;

pub use config::{AppConfig, TrackerConfig};
pub use models::{Bundle, GenerationJob, JobState, RepositoryId};
pub use services::bundle_service::{BundleServiceClient, HttpBundleService, ServiceError};
pub use services::catalog::{CatalogBrowser, ALL_CATEGORIES};
pub use services::tracker::{GenerationTracker, TrackerError};

/// Register descriptions for every metric the client records.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "bundle_generation_requests_total",
        "Bundle generation requests submitted"
    );
    metrics::describe_counter!("bundle_job_polls_total", "Job status checks issued");
    metrics::describe_counter!(
        "bundle_job_poll_errors_total",
        "Job status checks that failed and were retried"
    );
    metrics::describe_counter!(
        "bundle_jobs_finished_total",
        "Generation jobs that reached a terminal state, by outcome"
    );
    metrics::describe_counter!(
        "bundle_catalog_fallbacks_total",
        "Catalog loads that fell back to the built-in list"
    );
}
