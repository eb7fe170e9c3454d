//! Relative-path resolution across candidate origins.
//!
//! Mirrors and CDNs host overlapping but not identical asset sets, so a
//! relative playlist path has to be probed against each configured base URL.
//! Probing is strictly sequential in configured priority order; the first
//! origin answering 200 wins and later candidates are never contacted.

use crate::error::ProxyError;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A successfully resolved target.
///
/// Carries the winning probe's [`Response`] so the caller consumes the body
/// that was already fetched — the resolved origin is billed exactly once.
#[derive(Debug)]
pub struct ResolvedTarget {
    pub url: String,
    pub response: Response,
}

/// Probes an ordered candidate origin list for relative resources.
#[derive(Clone, Debug)]
pub struct OriginResolver {
    client: Client,
    bases: Vec<String>,
    probe_timeout: Duration,
}

impl OriginResolver {
    pub fn new(client: Client, bases: Vec<String>, probe_timeout: Duration) -> Self {
        Self {
            client,
            bases,
            probe_timeout,
        }
    }

    /// Resolve a relative path to the first candidate origin serving it.
    ///
    /// Success is exactly HTTP 200; any other status or network error moves
    /// on to the next candidate. Exhaustion carries the last failure for
    /// logging — callers must not surface it to clients.
    pub async fn resolve(&self, relative_path: &str) -> Result<ResolvedTarget, ProxyError> {
        let path = relative_path.trim_start_matches('/');
        let mut last_status: Option<StatusCode> = None;
        let mut last_detail = String::from("no candidate origins configured");

        for base in &self.bases {
            let candidate = format!("{}/{}", base.trim_end_matches('/'), path);
            debug!("Probing origin candidate: {}", candidate);

            match self
                .client
                .get(&candidate)
                .timeout(self.probe_timeout)
                .send()
                .await
            {
                Ok(response) if response.status() == StatusCode::OK => {
                    info!("Resolved {} via {}", path, base);
                    return Ok(ResolvedTarget {
                        url: candidate,
                        response,
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    debug!("Candidate {} answered {}", candidate, status);
                    last_status = Some(status);
                    last_detail = format!("{} answered {}", candidate, status);
                }
                Err(e) => {
                    warn!("Candidate {} unreachable: {}", candidate, e);
                    last_status = None;
                    last_detail = format!("{} failed: {}", candidate, e);
                }
            }
        }

        Err(ProxyError::OriginExhausted {
            last_status,
            detail: last_detail,
        })
    }
}
