pub mod bundle;
pub mod job;
pub mod repository;

pub use bundle::{Bundle, BundleSource};
pub use job::{ErrorDetail, FailureKind, GenerationJob, JobState};
pub use repository::RepositoryId;
