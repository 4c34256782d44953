//! Browser command-line options and configuration.
//!
//! Provides a type-safe interface for configuring the Chromium process:
//! binary location, headless mode, window size, debugging port, and extra
//! command-line arguments.
//!
//! # Example
//!
//! ```ignore
//! use chrome_cdp::ChromeOptions;
//!
//! let options = ChromeOptions::new()
//!     .with_headless()
//!     .with_window_size(1920, 1080);
//!
//! let args = options.to_args(9222, std::path::Path::new("/tmp/profile"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};

// ============================================================================
// Constants
// ============================================================================

/// Automation flags applied to every launch.
///
/// Quiets first-run UI, background services and crash reporting so the
/// browser comes up fast and stays predictable under automation.
const DEFAULT_ARGS: &[&str] = &[
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-hang-monitor",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--enable-automation",
    "--metrics-recording-only",
    "--no-first-run",
    "--password-store=basic",
    "--use-mock-keychain",
    "--remote-allow-origins=*",
];

/// Default binary candidates per platform, tried in order.
#[cfg(target_os = "linux")]
const BINARY_CANDIDATES: &[&str] = &["google-chrome", "chromium", "chromium-browser"];

#[cfg(target_os = "macos")]
const BINARY_CANDIDATES: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(target_os = "windows")]
const BINARY_CANDIDATES: &[&str] = &[
    "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
    "C:\\Program Files (x86)\\Google\\Chrome\\Application\\chrome.exe",
];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const BINARY_CANDIDATES: &[&str] = &["chromium"];

// ============================================================================
// ChromeOptions
// ============================================================================

/// Chromium process configuration options.
///
/// Controls how the browser is launched: binary path, display mode, window
/// dimensions, debugging port, and additional command-line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChromeOptions {
    /// Explicit browser binary, or `None` for the platform default.
    pub binary: Option<PathBuf>,

    /// Run without a GUI (headless mode).
    pub headless: bool,

    /// Window dimensions in pixels (width, height).
    pub window_size: Option<(u32, u32)>,

    /// Preferred remote-debugging port, or `None` for a free port.
    pub preferred_port: Option<u16>,

    /// Additional custom command-line arguments.
    pub extra_args: Vec<String>,
}

// ============================================================================
// Constructors
// ============================================================================

impl ChromeOptions {
    /// Creates a new options instance with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            binary: None,
            headless: false,
            window_size: None,
            preferred_port: None,
            extra_args: Vec::new(),
        }
    }

    /// Creates options configured for headless mode.
    #[inline]
    #[must_use]
    pub fn headless() -> Self {
        Self {
            headless: true,
            ..Default::default()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ChromeOptions {
    /// Sets the browser binary path.
    #[inline]
    #[must_use]
    pub fn with_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Enables headless mode.
    #[inline]
    #[must_use]
    pub fn with_headless(mut self) -> Self {
        self.headless = true;
        self
    }

    /// Sets window size in pixels.
    #[inline]
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = Some((width, height));
        self
    }

    /// Sets the preferred remote-debugging port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.preferred_port = Some(port);
        self
    }

    /// Adds a custom command-line argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Adds multiple custom command-line arguments.
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl ChromeOptions {
    /// Resolves the browser binary: explicit path or platform default.
    ///
    /// Candidates are tried in order; the first existing absolute path wins.
    /// Bare command names pass through to `PATH` resolution at spawn time.
    #[must_use]
    pub fn resolve_binary(&self) -> PathBuf {
        if let Some(binary) = &self.binary {
            return binary.clone();
        }

        for candidate in BINARY_CANDIDATES {
            let path = Path::new(candidate);
            if !path.is_absolute() || path.exists() {
                return path.to_path_buf();
            }
        }

        PathBuf::from(BINARY_CANDIDATES[0])
    }

    /// Assembles the full command line for a launch.
    ///
    /// # Arguments
    ///
    /// * `port` - Remote-debugging port
    /// * `user_data_dir` - Disposable profile directory
    #[must_use]
    pub fn to_args(&self, port: u16, user_data_dir: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(DEFAULT_ARGS.len() + 8 + self.extra_args.len());

        args.push("about:blank".to_string());
        args.push(format!("--remote-debugging-port={port}"));
        args.push(format!("--user-data-dir={}", user_data_dir.display()));

        if self.headless {
            args.push("--headless".to_string());
        }

        if let Some((width, height)) = self.window_size {
            args.push(format!("--window-size={width},{height}"));
        }

        args.extend(DEFAULT_ARGS.iter().map(ToString::to_string));
        args.extend(self.extra_args.clone());
        args
    }

    /// Validates the options configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if let Some((width, height)) = self.window_size
            && (width == 0 || height == 0)
        {
            return Err("Window dimensions must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Returns `true` if headless mode is enabled.
    #[inline]
    #[must_use]
    pub const fn is_headless(&self) -> bool {
        self.headless
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_default() {
        let options = ChromeOptions::new();
        assert!(options.binary.is_none());
        assert!(!options.headless);
        assert!(options.window_size.is_none());
        assert!(options.preferred_port.is_none());
        assert!(options.extra_args.is_empty());
    }

    #[test]
    fn test_headless_constructor() {
        let options = ChromeOptions::headless();
        assert!(options.is_headless());
    }

    #[test]
    fn test_builder_chain() {
        let options = ChromeOptions::new()
            .with_binary("/usr/bin/chromium")
            .with_headless()
            .with_window_size(1920, 1080)
            .with_port(9222);

        assert_eq!(options.binary, Some(PathBuf::from("/usr/bin/chromium")));
        assert!(options.headless);
        assert_eq!(options.window_size, Some((1920, 1080)));
        assert_eq!(options.preferred_port, Some(9222));
    }

    #[test]
    fn test_to_args_carries_port_and_profile() {
        let options = ChromeOptions::new();
        let args = options.to_args(9222, Path::new("/tmp/profile"));

        assert!(args.contains(&"--remote-debugging-port=9222".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
        assert!(args.contains(&"about:blank".to_string()));
        assert!(args.contains(&"--no-first-run".to_string()));
    }

    #[test]
    fn test_to_args_headless_and_window_size() {
        let options = ChromeOptions::headless().with_window_size(800, 600);
        let args = options.to_args(9222, Path::new("/tmp/profile"));

        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--window-size=800,600".to_string()));
    }

    #[test]
    fn test_to_args_appends_extra_args_last() {
        let options = ChromeOptions::new().with_args(["--custom-a", "--custom-b"]);
        let args = options.to_args(9222, Path::new("/tmp/profile"));

        let len = args.len();
        assert_eq!(args[len - 2], "--custom-a");
        assert_eq!(args[len - 1], "--custom-b");
    }

    #[test]
    fn test_resolve_binary_prefers_explicit_path() {
        let options = ChromeOptions::new().with_binary("/opt/custom/chrome");
        assert_eq!(options.resolve_binary(), PathBuf::from("/opt/custom/chrome"));
    }

    #[test]
    fn test_resolve_binary_default_is_nonempty() {
        let options = ChromeOptions::new();
        assert!(!options.resolve_binary().as_os_str().is_empty());
    }

    #[test]
    fn test_validate_zero_dimension() {
        assert!(ChromeOptions::new().with_window_size(0, 600).validate().is_err());
        assert!(ChromeOptions::new().with_window_size(800, 0).validate().is_err());
        assert!(ChromeOptions::new().with_window_size(800, 600).validate().is_ok());
    }
}
