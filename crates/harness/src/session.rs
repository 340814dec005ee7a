//! Browser session management - launching, page creation, scoped teardown
//!
//! A [`Session`] owns one browser process and every page opened under it.
//! Teardown is guaranteed on all exit paths: `shutdown` runs from `Drop`,
//! so a scenario that bails out mid-flow with an assertion failure still
//! releases its tabs and the underlying process.

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cdp::CdpClient;
use crate::config::BrowserConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::page::Page;

/// Target descriptor returned by the DevTools discovery endpoint
#[derive(Debug, Deserialize)]
struct TargetStub {
    id: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Handle to a running browser process
pub struct Session {
    child: Child,
    port: u16,
    http: reqwest::Client,
    config: BrowserConfig,
    // Held for the session's lifetime; the directory is removed on drop.
    _profile_dir: tempfile::TempDir,
    closed: bool,
}

impl Session {
    /// Launch one browser process with the configured flag set and wait for
    /// its DevTools endpoint to answer. Launch failure is fatal; there is no
    /// retry.
    pub async fn launch(config: BrowserConfig) -> HarnessResult<Self> {
        let port = match config.devtools_port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let profile_dir = tempfile::tempdir()?;

        info!(binary = %config.binary.display(), port, "launching browser");

        let child = Command::new(&config.binary)
            .args(config.launch_args(port, profile_dir.path()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                HarnessError::Launch(format!("failed to spawn {}: {e}", config.binary.display()))
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let mut session = Session {
            child,
            port,
            http,
            config,
            _profile_dir: profile_dir,
            closed: false,
        };

        if let Err(e) = session.wait_for_devtools().await {
            session.shutdown();
            return Err(e);
        }

        info!(port, "browser devtools endpoint is up");
        Ok(session)
    }

    /// Poll the DevTools version endpoint until the browser answers.
    async fn wait_for_devtools(&self) -> HarnessResult<()> {
        let url = format!("http://127.0.0.1:{}/json/version", self.port);
        let start = std::time::Instant::now();
        let mut attempts = 0u32;

        while start.elapsed() < self.config.launch_timeout {
            attempts += 1;
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => warn!(status = %resp.status(), "devtools endpoint not ready"),
                Err(e) => {
                    if attempts == 1 {
                        debug!("waiting for browser to start...");
                    }
                    // Connection refused is expected while the process boots.
                    if !e.is_connect() {
                        warn!(error = %e, "devtools probe error");
                    }
                }
            }
            sleep(Duration::from_millis(100)).await;
        }

        Err(HarnessError::Launch(format!(
            "devtools endpoint did not answer after {attempts} attempts"
        )))
    }

    /// Open a fresh tab and return a page handle with default timeouts
    /// applied.
    pub async fn new_page(&mut self) -> HarnessResult<Page> {
        let url = format!("http://127.0.0.1:{}/json/new?about:blank", self.port);
        let resp = self.http.put(&url).send().await?;
        if !resp.status().is_success() {
            return Err(HarnessError::Protocol(format!(
                "tab creation returned HTTP {}",
                resp.status()
            )));
        }
        let target: TargetStub = resp.json().await?;

        debug!(target = %target.id, "attaching to new tab");

        let cdp = CdpClient::connect(
            &target.web_socket_debugger_url,
            self.config.command_timeout,
        )
        .await?;
        cdp.enable("Page").await?;
        cdp.enable("Runtime").await?;
        cdp.enable("Network").await?;

        Ok(Page::new(
            cdp,
            target.id,
            self.config.navigation_timeout,
            self.config.element_timeout,
        ))
    }

    /// Bring a tab to the foreground.
    ///
    /// Multi-page scenarios (e.g. scraping a one-time code from a mail
    /// viewer on a second tab) activate the page they are about to act on;
    /// there is no implicit "current page".
    pub async fn bring_to_front(&self, page: &Page) -> HarnessResult<()> {
        let url = format!(
            "http://127.0.0.1:{}/json/activate/{}",
            self.port,
            page.target_id()
        );
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(HarnessError::Protocol(format!(
                "tab activation returned HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Close a single tab explicitly. Pages not closed here go down with the
    /// session.
    pub async fn close_page(&self, page: Page) -> HarnessResult<()> {
        let url = format!(
            "http://127.0.0.1:{}/json/close/{}",
            self.port,
            page.target_id()
        );
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(HarnessError::Protocol(format!(
                "tab close returned HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Terminate the browser process. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        info!(pid = self.child.id(), "stopping browser");

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Find a free port for the DevTools endpoint
fn find_free_port() -> HarnessResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_free_port() {
        let port1 = find_free_port().unwrap();
        let port2 = find_free_port().unwrap();

        assert!(port1 > 1024);
        assert!(port2 > 1024);
    }

    #[test]
    fn test_target_stub_parses_discovery_response() {
        let raw = r#"{
            "description": "",
            "id": "8A4E6E",
            "title": "about:blank",
            "type": "page",
            "url": "about:blank",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/8A4E6E"
        }"#;
        let stub: TargetStub = serde_json::from_str(raw).unwrap();
        assert_eq!(stub.id, "8A4E6E");
        assert!(stub.web_socket_debugger_url.starts_with("ws://"));
    }
}
