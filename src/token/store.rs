//! Ephemeral token store.
//!
//! Maps opaque tokens to upstream URLs so rewritten playlists never expose
//! origin identity. Entries expire after a per-class TTL and are removed
//! lazily on read; a periodic sweep handles tokens that are never read again.

use dashmap::DashMap;
use rand::RngCore;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bytes of entropy per token; hex-encoded to twice this many characters.
const TOKEN_BYTES: usize = 24;

/// Expiry class, fixed at registration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtlClass {
    /// Long-lived — master/variant playlists that players refetch over a session
    Master,
    /// Short-lived — media segments and key files, read once or twice
    Segment,
}

#[derive(Clone, Debug)]
struct TokenEntry {
    target: String,
    expires_at: Instant,
}

/// Concurrent token → URL map with per-entry expiry.
#[derive(Clone, Debug)]
pub struct TokenStore {
    entries: Arc<DashMap<String, TokenEntry>>,
    master_ttl: Duration,
    segment_ttl: Duration,
}

impl TokenStore {
    pub fn new(master_ttl: Duration, segment_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            master_ttl,
            segment_ttl,
        }
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        // ThreadRng is a CSPRNG reseeded from the OS
        rand::rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Register a target URL under a fresh token.
    ///
    /// Every call produces a new token, even for a URL already registered —
    /// token freshness matters more than deduplication.
    pub fn register(&self, target: impl Into<String>, class: TtlClass) -> String {
        let ttl = match class {
            TtlClass::Master => self.master_ttl,
            TtlClass::Segment => self.segment_ttl,
        };
        crate::metrics::record_token_registered(match class {
            TtlClass::Master => "master",
            TtlClass::Segment => "segment",
        });
        let token = Self::generate_token();
        self.entries.insert(
            token.clone(),
            TokenEntry {
                target: target.into(),
                expires_at: Instant::now() + ttl,
            },
        );
        token
    }

    /// Resolve a token to its target URL.
    ///
    /// Unknown and expired tokens are both a plain `None` — callers cannot
    /// tell which case they hit. Expired entries are removed on the way out.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let entry = self.entries.get(token)?;
        if entry.expires_at <= Instant::now() {
            // Stale — drop the read guard before removing
            drop(entry);
            self.entries.remove(token);
            return None;
        }
        Some(entry.target.clone())
    }

    /// Remove all expired entries. Called by the background janitor; lazy
    /// removal in [`resolve`](Self::resolve) stays the fast path.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of live (unswept) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
