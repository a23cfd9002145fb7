//! Bundle fixtures shared by the integration tests

#![allow(dead_code)]

use bundle_tracker::models::{Bundle, BundleSource};
use chrono::{TimeZone, Utc};

/// A valid bundle generated on the given day of January 2025.
pub fn bundle(name: &str, repository: &str, version: &str, day: u32) -> Bundle {
    let commit = format!("{:07x}", day * 0x1f3d);
    let bundle_file_name = format!("{name}-{version}-{commit}.cgc");
    Bundle {
        name: name.to_string(),
        repository: repository.to_string(),
        download_url: format!("https://bundles.example.com/files/{bundle_file_name}"),
        bundle_file_name,
        version: Some(version.to_string()),
        commit_hash: commit,
        size_label: "1.0MB".to_string(),
        size_bytes: Some(1_048_576),
        generated_at: Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap(),
        category: None,
        description: None,
        popularity_score: None,
        source: Some(BundleSource::OnDemand),
    }
}

pub fn with_category(mut bundle: Bundle, category: &str) -> Bundle {
    bundle.category = Some(category.to_string());
    bundle
}

pub fn with_description(mut bundle: Bundle, description: &str) -> Bundle {
    bundle.description = Some(description.to_string());
    bundle
}

/// The bundle the bundle service publishes for octocat/hello-world.
pub fn hello_world() -> Bundle {
    let mut bundle = bundle("hello-world", "octocat/hello-world", "main", 20);
    bundle.download_url = "https://x/y.cgc".to_string();
    bundle
}

/// A small mixed catalog: one numpy bundle, two Data Science bundles and
/// two versions of flask.
pub fn sample_catalog() -> Vec<Bundle> {
    vec![
        with_description(
            with_category(bundle("numpy", "numpy/numpy", "2.2.1", 3), "Data Science"),
            "Array computing",
        ),
        with_category(bundle("pandas", "pandas-dev/pandas", "2.2.3", 4), "Data Science"),
        with_description(
            with_category(bundle("flask", "pallets/flask", "3.0.3", 5), "Web Framework"),
            "Micro web framework",
        ),
        with_category(bundle("flask", "pallets/flask", "3.1.0", 9), "Web Framework"),
        bundle("click", "pallets/click", "8.1.8", 7),
    ]
}
