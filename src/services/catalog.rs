//! Catalog of published bundles
//!
//! The catalog is fetched once and then queried in memory. A failed fetch is
//! never reported to the caller: the browser falls back to a built-in list so
//! there is always something to show.

use garde::Validate;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::bundle::Bundle;
use crate::services::bundle_service::BundleServiceClient;
use crate::services::fallback;

/// Category filter value matching every bundle.
pub const ALL_CATEGORIES: &str = "all";

/// Origin of the currently loaded catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    NotLoaded,
    Service,
    Fallback,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("Bundle catalog is empty")]
    EmptyCatalog,

    #[error("Bundle '{0}' not found in registry")]
    NotFound(String),
}

struct Snapshot {
    bundles: Arc<Vec<Bundle>>,
    source: CatalogSource,
}

/// Loads the bundle catalog once and answers queries against it.
pub struct CatalogBrowser {
    client: Arc<dyn BundleServiceClient>,
    snapshot: RwLock<Snapshot>,
    load_gate: tokio::sync::Mutex<()>,
    loads: AtomicU64,
}

impl CatalogBrowser {
    pub fn new(client: Arc<dyn BundleServiceClient>) -> Self {
        Self {
            client,
            snapshot: RwLock::new(Snapshot {
                bundles: Arc::new(Vec::new()),
                source: CatalogSource::NotLoaded,
            }),
            load_gate: tokio::sync::Mutex::new(()),
            loads: AtomicU64::new(0),
        }
    }

    /// Fetch the catalog, replacing whatever was loaded before.
    ///
    /// The service endpoint already merges on-demand bundles with the latest
    /// weekly release, so the result is taken as-is; [`Bundle::source`] tells
    /// the two apart.
    ///
    /// Concurrent calls are coalesced: a caller that waited for an in-flight
    /// load reuses its result instead of fetching again.
    pub async fn load(&self) {
        let seen = self.loads.load(Ordering::Acquire);
        let _gate = self.load_gate.lock().await;
        if self.loads.load(Ordering::Acquire) != seen {
            return;
        }

        let (bundles, source) = match self.client.catalog().await {
            Ok(response) => {
                let total = response.bundles.len();
                let bundles: Vec<Bundle> = response
                    .bundles
                    .into_iter()
                    .filter(|bundle| match bundle.validate() {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(bundle = %bundle.name, error = %e, "Skipping invalid catalog entry");
                            false
                        }
                    })
                    .collect();
                info!(count = bundles.len(), skipped = total - bundles.len(), "Loaded bundle catalog");
                (bundles, CatalogSource::Service)
            }
            Err(e) => {
                warn!(error = %e, "Could not fetch bundle catalog, using built-in list");
                metrics::counter!("bundle_catalog_fallbacks_total").increment(1);
                (fallback::bundles(), CatalogSource::Fallback)
            }
        };

        *self.snapshot.write() = Snapshot {
            bundles: Arc::new(bundles),
            source,
        };
        self.loads.fetch_add(1, Ordering::Release);
    }

    pub fn source(&self) -> CatalogSource {
        self.snapshot.read().source
    }

    /// Every loaded bundle, in service order.
    pub fn bundles(&self) -> Arc<Vec<Bundle>> {
        Arc::clone(&self.snapshot.read().bundles)
    }

    /// Bundles matching `search_text` and `category`, in catalog order.
    pub fn query(&self, search_text: &str, category: &str) -> Vec<Bundle> {
        filter_bundles(&self.bundles(), search_text, category)
    }

    /// Distinct categories of the loaded bundles, plus [`ALL_CATEGORIES`].
    pub fn categories(&self) -> BTreeSet<String> {
        let bundles = self.bundles();
        let mut categories: BTreeSet<String> = bundles
            .iter()
            .filter_map(|b| b.category.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        categories.insert(ALL_CATEGORIES.to_string());
        categories
    }

    /// Find the bundle to download for `name`.
    ///
    /// An exact full name (`flask-3.1.0-ab8149b`) wins; otherwise the most
    /// recently generated bundle whose base name matches is returned.
    pub fn resolve(&self, name: &str) -> Result<Bundle, LookupError> {
        let bundles = self.bundles();
        if bundles.is_empty() {
            return Err(LookupError::EmptyCatalog);
        }

        let wanted = name.trim().to_lowercase();

        if let Some(bundle) = bundles
            .iter()
            .find(|b| b.full_name().to_lowercase() == wanted)
        {
            return Ok(bundle.clone());
        }

        bundles
            .iter()
            .filter(|b| b.name.to_lowercase() == wanted)
            .max_by_key(|b| b.generated_at)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(name.trim().to_string()))
    }
}

/// Case-insensitive text match on name, repository or description, intersected
/// with an exact category match unless `category` is [`ALL_CATEGORIES`].
///
/// Categories compare after trimming, the same form [`CatalogBrowser::categories`] lists.
pub fn filter_bundles(bundles: &[Bundle], search_text: &str, category: &str) -> Vec<Bundle> {
    let needle = search_text.trim().to_lowercase();
    let category = category.trim();

    bundles
        .iter()
        .filter(|b| {
            category == ALL_CATEGORIES || b.category.as_deref().map(str::trim) == Some(category)
        })
        .filter(|b| b.matches_text(&needle))
        .cloned()
        .collect()
}
