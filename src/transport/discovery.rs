//! HTTP discovery of the debugger endpoint.
//!
//! A browser started with `--remote-debugging-port` serves a small HTTP
//! interface next to the WebSocket endpoint. This module resolves the
//! WebSocket URL from it and wraps the remaining target-management routes:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /json` | List debuggable targets |
//! | `GET /json/new?{url}` | Create a target (tab) and return it |
//! | `GET /json/close/{id}` | Close a target |
//! | `GET /json/version` | Browser metadata |
//! | `GET /shutdown` | Graceful browser shutdown (best-effort) |
//!
//! The debug server opens asynchronously after process launch, so
//! [`Discovery::websocket_url`] polls `/json` under a bounded deadline.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::TargetId;

// ============================================================================
// Constants
// ============================================================================

/// Interval between `/json` polls while the debug server comes up.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default deadline for resolving the WebSocket URL.
pub(crate) const DEFAULT_DISCOVERY_DEADLINE: Duration = Duration::from_secs(30);

// ============================================================================
// TargetInfo
// ============================================================================

/// A debuggable target as reported by `GET /json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target identifier.
    pub id: TargetId,

    /// Target kind (`page`, `background_page`, `service_worker`, ...).
    #[serde(rename = "type", default)]
    pub target_type: String,

    /// Page title.
    #[serde(default)]
    pub title: String,

    /// Current URL.
    #[serde(default)]
    pub url: String,

    /// WebSocket URL for attaching a debugger.
    ///
    /// Absent when another client is already attached.
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

// ============================================================================
// Discovery
// ============================================================================

/// HTTP client for the browser's debugger discovery interface.
#[derive(Debug)]
pub struct Discovery {
    /// HTTP client, reused across requests.
    http: reqwest::Client,
    /// Base URL, e.g. `http://localhost:9222`.
    base_url: Url,
}

impl Discovery {
    /// Creates a discovery client for a base URL.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Debugger HTTP base, e.g. `http://localhost:9222`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL does not parse.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| Error::config(format!("Invalid base URL: {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    /// Returns the base URL.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds a full URL for a discovery route.
    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Lists the debuggable targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the endpoint is unreachable or answers
    /// with an error status.
    pub async fn targets(&self) -> Result<Vec<TargetInfo>> {
        let targets = self
            .http
            .get(self.endpoint("/json"))
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<TargetInfo>>()
            .await?;

        trace!(count = targets.len(), "Listed targets");
        Ok(targets)
    }

    /// Resolves the first target's WebSocket debugger URL.
    ///
    /// Polls `/json` until it answers with an attachable target or the
    /// deadline expires. The browser's debug server opens asynchronously
    /// after launch, so refused connections are expected early on.
    ///
    /// # Arguments
    ///
    /// * `deadline` - Total polling budget
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceUnavailable`] if the endpoint never answered
    /// - [`Error::Discovery`] if it answered but exposed no attachable target
    pub async fn websocket_url(&self, deadline: Duration) -> Result<String> {
        let started = Instant::now();
        let mut answered = false;

        loop {
            match self.targets().await {
                Ok(targets) => {
                    answered = true;
                    if let Some(url) = targets
                        .iter()
                        .find_map(|t| t.web_socket_debugger_url.clone())
                    {
                        debug!(url = %url, "Resolved WebSocket debugger URL");
                        return Ok(url);
                    }
                }
                Err(e) if started.elapsed() >= deadline => {
                    return Err(Error::service_unavailable(format!(
                        "Debugger endpoint at {} did not answer within {}s: {e}",
                        self.base_url,
                        deadline.as_secs()
                    )));
                }
                Err(e) => {
                    trace!(error = %e, "Debugger endpoint not ready yet");
                }
            }

            if started.elapsed() >= deadline {
                return Err(if answered {
                    Error::discovery("No attachable target exposed by the browser")
                } else {
                    Error::service_unavailable(format!(
                        "Debugger endpoint at {} did not answer within {}s",
                        self.base_url,
                        deadline.as_secs()
                    ))
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Creates a new target (tab) and returns it.
    ///
    /// # Arguments
    ///
    /// * `url` - Initial URL for the new target, or `None` for a blank tab
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the request fails.
    pub async fn new_target(&self, url: Option<&str>) -> Result<TargetInfo> {
        let endpoint = match url {
            Some(url) => self.endpoint(&format!("/json/new?{url}")),
            None => self.endpoint("/json/new"),
        };

        let target = self
            .http
            .get(endpoint)
            .send()
            .await?
            .error_for_status()?
            .json::<TargetInfo>()
            .await?;

        debug!(id = %target.id, "Created target");
        Ok(target)
    }

    /// Closes a target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the request fails.
    pub async fn close_target(&self, id: &TargetId) -> Result<()> {
        self.http
            .get(self.endpoint(&format!("/json/close/{id}")))
            .send()
            .await?
            .error_for_status()?;

        debug!(%id, "Closed target");
        Ok(())
    }

    /// Fetches browser metadata from `/json/version`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the request fails.
    pub async fn version(&self) -> Result<Value> {
        let version = self
            .http
            .get(self.endpoint("/json/version"))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        Ok(version)
    }

    /// Requests a graceful browser shutdown.
    ///
    /// Best-effort: failures are logged and swallowed, the supervisor's
    /// forceful cleanup follows regardless.
    pub async fn shutdown_browser(&self) {
        match self.http.get(self.endpoint("/shutdown")).send().await {
            Ok(_) => debug!("Graceful shutdown requested"),
            Err(e) => warn!(error = %e, "Graceful shutdown request failed"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
