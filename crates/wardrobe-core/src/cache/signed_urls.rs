use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Duration;
use tracing::{debug, warn};

use crate::api::{ApiError, WardrobeApi};
use crate::config::Config;

use super::entry::{seconds, system_clock, CacheEntry, Clock};

/// TTL cache of time-limited image URLs, keyed by item id.
///
/// Entries are refreshed proactively once they are within the refresh
/// window of expiry, and are never handed out after they expire.
pub struct SignedUrlResolver {
    api: Arc<dyn WardrobeApi>,
    entries: RwLock<HashMap<String, CacheEntry<String>>>,
    // One batch request at a time; a waiting caller then sees the new entries.
    batch: tokio::sync::Mutex<()>,
    ttl_secs: u64,
    window: Duration,
    clock: Clock,
}

impl SignedUrlResolver {
    pub fn new(api: Arc<dyn WardrobeApi>, config: &Config) -> Self {
        Self::with_clock(api, config, system_clock())
    }

    pub fn with_clock(api: Arc<dyn WardrobeApi>, config: &Config, clock: Clock) -> Self {
        Self {
            api,
            entries: RwLock::new(HashMap::new()),
            batch: tokio::sync::Mutex::new(()),
            ttl_secs: config.signed_url_ttl_secs,
            window: seconds(config.signed_url_refresh_window_secs).unwrap_or(Duration::MAX),
            clock,
        }
    }

    /// True when the id has no entry or its entry is inside the refresh window.
    pub fn needs_refresh(&self, item_id: &str) -> bool {
        let now = (self.clock)();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(item_id)
            .map_or(true, |entry| entry.needs_refresh(now, self.window))
    }

    /// The cached URL, if one exists and has not expired.
    pub fn cached(&self, item_id: &str) -> Option<String> {
        let now = (self.clock)();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(item_id)
            .and_then(|entry| entry.fresh(now))
            .cloned()
    }

    /// Resolve URLs for `item_ids`, fetching every stale or missing id in a
    /// single batch. Ids the server did not sign are absent from the result.
    pub async fn resolve_many(
        &self,
        item_ids: &[String],
    ) -> Result<HashMap<String, String>, ApiError> {
        let _batch = self.batch.lock().await;

        let mut seen = HashSet::new();
        let stale: Vec<String> = item_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter(|id| self.needs_refresh(id))
            .cloned()
            .collect();

        if !stale.is_empty() {
            self.fetch(&stale).await?;
        }

        Ok(item_ids
            .iter()
            .filter_map(|id| self.cached(id).map(|url| (id.clone(), url)))
            .collect())
    }

    /// Force a fresh URL for one id, ignoring whatever is cached.
    pub async fn refresh_one(&self, item_id: &str) -> Result<Option<String>, ApiError> {
        let _batch = self.batch.lock().await;
        self.invalidate(item_id);
        self.fetch(&[item_id.to_string()]).await?;
        Ok(self.cached(item_id))
    }

    pub fn invalidate(&self, item_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(item_id);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn fetch(&self, item_ids: &[String]) -> Result<(), ApiError> {
        let issued_at = (self.clock)();
        let response = match self.api.signed_urls(item_ids, self.ttl_secs).await {
            Ok(response) => response,
            Err(e) => {
                warn!(count = item_ids.len(), error = %e, "Signed URL batch failed");
                return Err(e);
            }
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for signed in response.urls {
            // Lifetime is capped at the one requested.
            let Some(ttl) = seconds(signed.expires_in.min(self.ttl_secs)) else {
                warn!(
                    item_id = %signed.item_id,
                    expires_in = signed.expires_in,
                    "Signed URL lifetime out of range, not caching"
                );
                continue;
            };
            entries.insert(
                signed.item_id,
                CacheEntry::new(signed.signed_url, issued_at, ttl),
            );
        }
        debug!(requested = item_ids.len(), cached = entries.len(), "Signed URLs refreshed");
        Ok(())
    }
}

// ============================================================================
// Image mounts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountState {
    Pending,
    Ready(String),
    Unavailable,
}

/// Display state for one rendered image.
///
/// A failed load earns exactly one on-demand refresh. A second failure is
/// final for the lifetime of the mount.
#[derive(Debug, Clone)]
pub struct ImageMount {
    item_id: String,
    state: MountState,
    retried: bool,
}

impl ImageMount {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            state: MountState::Pending,
            retried: false,
        }
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn state(&self) -> &MountState {
        &self.state
    }

    /// Use the cached URL while it is outside the refresh window, otherwise
    /// resolve a new one.
    pub async fn resolve(&mut self, resolver: &SignedUrlResolver) -> &MountState {
        if !resolver.needs_refresh(&self.item_id) {
            if let Some(url) = resolver.cached(&self.item_id) {
                self.state = MountState::Ready(url);
                return &self.state;
            }
        }
        let ids = [self.item_id.clone()];
        self.state = match resolver.resolve_many(&ids).await {
            Ok(mut urls) => urls
                .remove(&self.item_id)
                .map_or(MountState::Unavailable, MountState::Ready),
            // An aging URL is still better than none until it expires.
            Err(_) => resolver
                .cached(&self.item_id)
                .map_or(MountState::Unavailable, MountState::Ready),
        };
        &self.state
    }

    /// Called when the image failed to load from the current URL.
    pub async fn on_load_error(&mut self, resolver: &SignedUrlResolver) -> &MountState {
        if self.retried || self.state == MountState::Unavailable {
            self.state = MountState::Unavailable;
            return &self.state;
        }
        self.retried = true;
        self.state = match resolver.refresh_one(&self.item_id).await {
            Ok(Some(url)) => MountState::Ready(url),
            Ok(None) | Err(_) => MountState::Unavailable,
        };
        &self.state
    }
}
