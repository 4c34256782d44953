//! Browser process supervision.
//!
//! [`ChromeService`] owns the spawned browser process and its disposable
//! profile directory. Startup spawns the process with a chosen debugging
//! port and polls TCP connectability under a bounded retry budget; shutdown
//! attempts a graceful HTTP request first, then unconditionally terminates
//! the process and releases the profile.
//!
//! # Lifecycle
//!
//! 1. `start()` - free port → temp profile → spawn → poll connectability
//! 2. `stop()` - `GET /shutdown` (best-effort) → kill → release profile
//!
//! Every cleanup step tolerates failure of the previous one; a browser that
//! ignores the graceful request is still killed and its profile removed.

// ============================================================================
// Imports
// ============================================================================

use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::launcher::ChromeOptions;

// ============================================================================
// Constants
// ============================================================================

/// Retry budget for the process to become connectable (attempts).
const CONNECT_ATTEMPTS: u32 = 30;

/// Delay between connectability probes.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Per-probe TCP connect timeout.
const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Budget for the port to close after a graceful shutdown request.
const GRACEFUL_WAIT_ATTEMPTS: u32 = 5;

/// Timeout for the graceful shutdown HTTP request itself.
const SHUTDOWN_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// ChromeService
// ============================================================================

/// Supervises a spawned browser process.
///
/// Created with options, started once, stopped once. The process is spawned
/// with `kill_on_drop`, and the profile is a [`TempDir`], so dropping an
/// unstopped service still reclaims both.
pub struct ChromeService {
    /// Launch configuration.
    options: ChromeOptions,
    /// Spawned process, present while running.
    child: Option<Child>,
    /// Disposable profile directory, present while running.
    profile: Option<TempDir>,
    /// Chosen debugging port.
    port: u16,
}

impl ChromeService {
    /// Creates a service for the given options. Nothing is spawned yet.
    #[must_use]
    pub fn new(options: ChromeOptions) -> Self {
        Self {
            options,
            child: None,
            profile: None,
            port: 0,
        }
    }

    /// Returns the chosen debugging port (0 before `start`).
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the debugger HTTP base URL.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Launches the browser and waits for it to become connectable.
    ///
    /// Picks a free port when none was preferred, creates the disposable
    /// profile, spawns the process with captured stdio, and probes the
    /// debugging port for up to 30 one-second attempts.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the options fail validation
    /// - [`Error::ServiceUnavailable`] if the process cannot be spawned,
    ///   exits before becoming connectable (with captured output), or never
    ///   opens its port within the budget
    pub async fn start(&mut self) -> Result<String> {
        self.options.validate().map_err(Error::config)?;

        let binary = self.options.resolve_binary();
        self.port = match self.options.preferred_port {
            Some(port) => port,
            None => free_port()?,
        };

        let profile = TempDir::with_prefix("chrome-cdp-")?;
        debug!(path = %profile.path().display(), "Created temporary profile");

        let args = self.options.to_args(self.port, profile.path());
        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::service_unavailable(format!(
                    "Failed to launch {}: {e}",
                    binary.display()
                ))
            })?;

        info!(pid = child.id(), port = self.port, "Browser process spawned");

        // Probe until the debugging port answers or the budget runs out.
        for attempt in 0..CONNECT_ATTEMPTS {
            if let Some(status) = child.try_wait()? {
                let output = child.wait_with_output().await?;
                self.port = 0;
                return Err(Error::service_unavailable(format!(
                    "Browser exited with {status} before becoming connectable\n\
                     stdout: {}\nstderr: {}",
                    String::from_utf8_lossy(&output.stdout).trim(),
                    String::from_utf8_lossy(&output.stderr).trim(),
                )));
            }

            if is_connectable(self.port).await {
                debug!(port = self.port, attempt, "Browser is connectable");
                self.child = Some(child);
                self.profile = Some(profile);
                return Ok(self.base_url());
            }

            sleep(CONNECT_RETRY_INTERVAL).await;
        }

        // Never became connectable; reclaim the process before failing.
        let _ = child.start_kill();
        let _ = child.wait().await;
        let port = self.port;
        self.port = 0;

        Err(Error::service_unavailable(format!(
            "Browser did not open port {port} within {CONNECT_ATTEMPTS}s"
        )))
    }

    /// Stops the browser process and releases its profile.
    ///
    /// Best-effort graceful shutdown first, then unconditional kill. No-op
    /// when the service was never started or is already stopped; every step
    /// tolerates failure without preventing the next.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        self.request_graceful_shutdown().await;

        if let Err(e) = child.start_kill() {
            debug!(error = %e, "Kill signal failed (process likely gone)");
        }
        if let Err(e) = child.wait().await {
            warn!(error = %e, "Waiting for browser process failed");
        }

        if let Some(profile) = self.profile.take()
            && let Err(e) = profile.close()
        {
            warn!(error = %e, "Failed to remove temporary profile");
        }

        info!(port = self.port, "Browser service stopped");
    }

    /// Issues the graceful shutdown request and waits briefly for the port
    /// to close.
    async fn request_graceful_shutdown(&self) {
        let Ok(http) = reqwest::Client::builder()
            .timeout(SHUTDOWN_REQUEST_TIMEOUT)
            .build()
        else {
            return;
        };

        let url = format!("{}/shutdown", self.base_url());
        match http.get(&url).send().await {
            Ok(_) => debug!("Graceful shutdown requested"),
            Err(e) => {
                debug!(error = %e, "Graceful shutdown request failed");
                return;
            }
        }

        for _ in 0..GRACEFUL_WAIT_ATTEMPTS {
            if !is_connectable(self.port).await {
                debug!("Browser closed its debugging port");
                return;
            }
            sleep(CONNECT_RETRY_INTERVAL).await;
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Picks a free TCP port by binding to port 0 and reading the assignment.
fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Probes TCP connectability of the debugging port.
async fn is_connectable(port: u16) -> bool {
    matches!(
        timeout(
            CONNECT_PROBE_TIMEOUT,
            TcpStream::connect(("127.0.0.1", port))
        )
        .await,
        Ok(Ok(_))
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_port_is_bindable() {
        let port = free_port().expect("free port");
        assert!(port > 0);

        // The port was released and can be bound again.
        let listener = TcpListener::bind(("127.0.0.1", port)).expect("rebind");
        drop(listener);
    }

    #[tokio::test]
    async fn test_is_connectable_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        assert!(is_connectable(port).await);

        drop(listener);
        assert!(!is_connectable(port).await);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let mut service = ChromeService::new(ChromeOptions::new());
        service.stop().await;
        service.stop().await;
        assert_eq!(service.port(), 0);
    }

    #[tokio::test]
    async fn test_start_with_missing_binary_fails() {
        let options = ChromeOptions::new().with_binary("/nonexistent/chrome-binary");
        let mut service = ChromeService::new(options);

        let err = service.start().await.unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable { .. }));
        assert!(err.to_string().contains("/nonexistent/chrome-binary"));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_options() {
        let options = ChromeOptions::new().with_window_size(0, 600);
        let mut service = ChromeService::new(options);

        let err = service.start().await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_early_exit_captures_output() {
        // A process that prints and exits immediately never opens the port.
        let options = ChromeOptions::new().with_binary("/bin/echo");
        let mut service = ChromeService::new(options);

        let err = service.start().await.unwrap_err();
        match err {
            Error::ServiceUnavailable { message } => {
                assert!(message.contains("before becoming connectable"));
                assert!(message.contains("stdout:"));
            }
            other => panic!("expected ServiceUnavailable, got {other}"),
        }
    }
}
