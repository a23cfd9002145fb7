use serde::{Deserialize, Serialize};
use std::fmt;

/// Host prefixes stripped from pasted repository URLs.
const KNOWN_HOST_PREFIXES: &[&str] = &[
    "https://www.github.com/",
    "http://www.github.com/",
    "https://github.com/",
    "http://github.com/",
    "www.github.com/",
    "github.com/",
];

/// Normalized repository identifier in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Normalize raw user input into a repository identifier.
    ///
    /// Trims whitespace, strips a known host prefix, a trailing `.git` and
    /// trailing slashes. Returns `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut value = raw.trim();

        for prefix in KNOWN_HOST_PREFIXES {
            let matches = value
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
            if matches {
                value = &value[prefix.len()..];
                break;
            }
        }

        let value = value.trim_end_matches('/');
        let value = value.strip_suffix(".git").unwrap_or(value);
        let value = value.trim_matches('/').trim();

        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Repository name without the owner segment.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RepositoryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
