//! Configuration for browser launch and scenario defaults
//!
//! The launch flags the original helper kept as process-wide globals are an
//! explicit [`BrowserConfig`] passed at session creation. [`HarnessConfig`]
//! carries the server base URL, default test credentials, and the artifact
//! location for diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for launching a browser session
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Path to the browser binary
    pub binary: PathBuf,

    /// Run without a visible window
    pub headless: bool,

    /// Accept self-signed certificates from test servers
    pub ignore_certificate_errors: bool,

    /// Viewport width in CSS pixels
    pub viewport_width: u32,

    /// Viewport height in CSS pixels
    pub viewport_height: u32,

    /// DevTools port (None = find a free port)
    pub devtools_port: Option<u16>,

    /// Timeout for the browser process to come up
    pub launch_timeout: Duration,

    /// Timeout for a single DevTools command round-trip
    pub command_timeout: Duration,

    /// Timeout for a navigation to reach the load event
    pub navigation_timeout: Duration,

    /// Bounded wait for a selector to resolve
    pub element_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            binary: default_browser_binary(),
            headless: true,
            ignore_certificate_errors: true,
            viewport_width: 1280,
            viewport_height: 720,
            devtools_port: None,
            launch_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(30),
            element_timeout: Duration::from_secs(5),
        }
    }
}

impl BrowserConfig {
    /// Command-line flags for the browser process.
    ///
    /// `port` is the resolved DevTools port and `profile_dir` a throwaway
    /// user-data directory owned by the session.
    pub fn launch_args(&self, port: u16, profile_dir: &std::path::Path) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={port}"),
            format!("--user-data-dir={}", profile_dir.display()),
            format!("--window-size={},{}", self.viewport_width, self.viewport_height),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-gpu".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        if self.ignore_certificate_errors {
            args.push("--ignore-certificate-errors".to_string());
        }
        args.push("about:blank".to_string());
        args
    }
}

/// Browser binary, overridable through the environment
fn default_browser_binary() -> PathBuf {
    std::env::var_os("SSOPROBE_BROWSER")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("chromium"))
}

/// Scenario-level defaults: server location, credentials, artifacts
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Base URL of the server under test, e.g. `https://localhost:8443/cas`
    pub server_base: String,

    /// Default test username
    pub default_username: String,

    /// Default test password
    pub default_password: String,

    /// Name of the session cookie issued on successful login
    pub session_cookie: String,

    /// Directory for screenshots and other run artifacts
    pub artifact_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            server_base: "https://localhost:8443/cas".to_string(),
            default_username: "casuser".to_string(),
            default_password: "Mellon".to_string(),
            session_cookie: "TGC".to_string(),
            artifact_dir: PathBuf::from("test-results/screenshots"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_headless() {
        let config = BrowserConfig::default();
        let args = config.launch_args(9222, std::path::Path::new("/tmp/profile"));

        assert!(args.contains(&"--remote-debugging-port=9222".to_string()));
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--ignore-certificate-errors".to_string()));
        assert!(args.contains(&"--window-size=1280,720".to_string()));
    }

    #[test]
    fn test_launch_args_headed_strict_tls() {
        let config = BrowserConfig {
            headless: false,
            ignore_certificate_errors: false,
            ..Default::default()
        };
        let args = config.launch_args(9222, std::path::Path::new("/tmp/profile"));

        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(!args.contains(&"--ignore-certificate-errors".to_string()));
    }

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.default_username, "casuser");
        assert_eq!(config.session_cookie, "TGC");
        assert!(config.server_base.ends_with("/cas"));
    }
}
