//! Built-in bundle list shown when the bundle service cannot be reached.

use chrono::{DateTime, Utc};

use crate::models::bundle::{Bundle, BundleSource};

const RELEASE_BASE: &str =
    "https://github.com/CodeGraphContext/CodeGraphContext/releases/download/bundles-20250106";

struct Entry {
    name: &'static str,
    repository: &'static str,
    version: &'static str,
    commit: &'static str,
    size: &'static str,
    size_bytes: u64,
    category: &'static str,
    description: &'static str,
    popularity: u32,
}

const ENTRIES: &[Entry] = &[
    Entry {
        name: "numpy",
        repository: "numpy/numpy",
        version: "2.2.1",
        commit: "7a3b1c9",
        size: "38.4MB",
        size_bytes: 40_265_318,
        category: "Data Science",
        description: "Fundamental package for array computing in Python",
        popularity: 28_000,
    },
    Entry {
        name: "pandas",
        repository: "pandas-dev/pandas",
        version: "2.2.3",
        commit: "0691c5c",
        size: "52.1MB",
        size_bytes: 54_630_809,
        category: "Data Science",
        description: "Flexible and powerful data analysis and manipulation library",
        popularity: 44_000,
    },
    Entry {
        name: "flask",
        repository: "pallets/flask",
        version: "3.1.0",
        commit: "ab8149b",
        size: "4.2MB",
        size_bytes: 4_404_019,
        category: "Web Framework",
        description: "The Python micro framework for building web applications",
        popularity: 68_000,
    },
    Entry {
        name: "fastapi",
        repository: "fastapi/fastapi",
        version: "0.115.6",
        commit: "c6a6b3d",
        size: "9.7MB",
        size_bytes: 10_171_187,
        category: "Web Framework",
        description: "High performance, easy to learn, fast to code, ready for production",
        popularity: 79_000,
    },
    Entry {
        name: "requests",
        repository: "psf/requests",
        version: "2.32.3",
        commit: "0e322af",
        size: "2.3MB",
        size_bytes: 2_411_724,
        category: "Networking",
        description: "A simple, yet elegant, HTTP library",
        popularity: 52_000,
    },
    Entry {
        name: "httpx",
        repository: "encode/httpx",
        version: "0.28.1",
        commit: "26d48e0",
        size: "3.1MB",
        size_bytes: 3_250_585,
        category: "Networking",
        description: "A next generation HTTP client for Python",
        popularity: 13_000,
    },
];

/// Fixed timestamp of the fallback snapshot (2025-01-06T00:00:00Z).
const GENERATED_AT_SECS: i64 = 1_736_121_600;

/// Deterministic fallback catalog.
pub fn bundles() -> Vec<Bundle> {
    let generated_at = DateTime::<Utc>::from_timestamp(GENERATED_AT_SECS, 0).unwrap_or_default();

    ENTRIES
        .iter()
        .map(|entry| {
            let bundle_file_name = format!("{}-{}-{}.cgc", entry.name, entry.version, entry.commit);
            Bundle {
                name: entry.name.to_string(),
                repository: entry.repository.to_string(),
                download_url: format!("{RELEASE_BASE}/{bundle_file_name}"),
                bundle_file_name,
                version: Some(entry.version.to_string()),
                commit_hash: entry.commit.to_string(),
                size_label: entry.size.to_string(),
                size_bytes: Some(entry.size_bytes),
                generated_at,
                category: Some(entry.category.to_string()),
                description: Some(entry.description.to_string()),
                popularity_score: Some(entry.popularity),
                source: Some(BundleSource::Weekly),
            }
        })
        .collect()
}
