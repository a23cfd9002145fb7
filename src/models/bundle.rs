use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// File extension of a packaged bundle.
pub const BUNDLE_EXTENSION: &str = ".cgc";

/// Where a bundle was published from in the registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BundleSource {
    #[serde(alias = "on-demand")]
    OnDemand,
    Weekly,
}

/// Descriptor of a pre-built repository bundle, as published by the bundle service.
///
/// Field aliases accept the snake_case keys written by the registry manifest.
/// Missing required keys decode as empty strings and are rejected by
/// validation, so one bad entry cannot spoil a whole catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default)]
    #[garde(length(min = 1))]
    pub name: String,

    #[serde(alias = "repo", default)]
    #[garde(length(min = 1))]
    pub repository: String,

    #[serde(alias = "bundle_name", alias = "bundle_file_name", default)]
    #[garde(length(min = 1))]
    pub bundle_file_name: String,

    #[serde(default)]
    #[garde(skip)]
    pub version: Option<String>,

    #[serde(alias = "commit", alias = "commit_hash", default = "unknown_commit")]
    #[garde(skip)]
    pub commit_hash: String,

    #[serde(alias = "size", alias = "size_label", default)]
    #[garde(skip)]
    pub size_label: String,

    #[serde(alias = "size_bytes", default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub size_bytes: Option<u64>,

    #[serde(alias = "download_url", default)]
    #[garde(length(min = 1))]
    pub download_url: String,

    #[serde(alias = "generated_at", default)]
    #[garde(skip)]
    pub generated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub description: Option<String>,

    #[serde(alias = "popularity_score", alias = "stars", default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub popularity_score: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub source: Option<BundleSource>,
}

fn unknown_commit() -> String {
    "unknown".to_string()
}

impl Bundle {
    /// Complete bundle name including version and commit, e.g. `flask-main-abc123`.
    pub fn full_name(&self) -> &str {
        if self.bundle_file_name.is_empty() {
            return &self.name;
        }
        self.bundle_file_name
            .strip_suffix(BUNDLE_EXTENSION)
            .unwrap_or(&self.bundle_file_name)
    }

    /// Shell hint for loading the bundle into a local graph.
    pub fn load_command(&self) -> String {
        format!("cgc load {}", self.bundle_file_name)
    }

    /// Case-insensitive substring match on name, repository and description.
    ///
    /// `needle` must already be lowercase.
    pub fn matches_text(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(needle)
            || self.repository.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(needle))
    }
}
