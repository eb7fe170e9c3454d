//! Short-TTL cache of upstream playlist bodies.
//!
//! Keyed by resolved absolute URL and consulted before the origin fetch, so
//! concurrent viewers of the same stream don't hammer the origin. Rewriting
//! happens after the cache — every response still carries fresh tokens.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Playlists go stale fast on live streams; 2s keeps us near the live edge
/// while still collapsing request bursts.
const DEFAULT_TTL: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
struct CachedBody {
    body: String,
    fetched_at: Instant,
}

/// Concurrent TTL cache for fetched playlist text.
#[derive(Clone, Debug)]
pub struct PlaylistCache {
    entries: Arc<DashMap<String, CachedBody>>,
    ttl: Duration,
}

impl PlaylistCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, url: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(url) {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!("Playlist cache HIT for {}", url);
                return Some(entry.body.clone());
            }
            // Stale — drop the read guard before removing
            drop(entry);
            self.entries.remove(url);
        }
        debug!("Playlist cache MISS for {}", url);
        None
    }

    pub fn insert(&self, url: &str, body: String) {
        self.entries.insert(
            url.to_string(),
            CachedBody {
                body,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop stale entries; called by the background janitor.
    pub fn purge_expired(&self) {
        self.entries
            .retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
    }
}

impl Default for PlaylistCache {
    fn default() -> Self {
        Self::new()
    }
}
