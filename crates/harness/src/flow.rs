//! Login-flow vocabulary
//!
//! The helper surface scenarios compose: navigation to the login form,
//! credential submission, visibility/text/cookie assertions, and the ticket
//! extraction that joins the UI flow to protocol validation. Assertions poll
//! through the page's bounded wait and fail with expected-vs-actual context;
//! none of them depend on fixed delays.

use tracing::debug;
use url::Url;

use crate::config::HarnessConfig;
use crate::diag::Diagnostics;
use crate::error::{HarnessError, HarnessResult};
use crate::page::Page;
use crate::ticket::extract_ticket;
use crate::validate::ValidationClient;
use crate::wait::poll_until;

/// Scenario-facing harness: server location, default credentials,
/// validation client, and diagnostic sink in one place
pub struct Harness {
    config: HarnessConfig,
    validator: ValidationClient,
    diag: Diagnostics,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        let validator = ValidationClient::new()?;
        let diag = Diagnostics::new(config.artifact_dir.clone());
        Ok(Self {
            config,
            validator,
            diag,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn validator(&self) -> &ValidationClient {
        &self.validator
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    // -- navigation ---------------------------------------------------------

    /// The server's login URL, optionally on behalf of a target service.
    pub fn login_url(&self, service: Option<&str>) -> HarnessResult<String> {
        let mut url = Url::parse(&self.config.server_base).map_err(|e| {
            HarnessError::Protocol(format!(
                "bad server base '{}': {e}",
                self.config.server_base
            ))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                HarnessError::Protocol(format!(
                    "server base '{}' cannot take a path",
                    self.config.server_base
                ))
            })?;
            segments.pop_if_empty();
            segments.push("login");
        }
        if let Some(service) = service {
            url.query_pairs_mut().append_pair("service", service);
        }
        Ok(url.into())
    }

    /// Navigate to the login form.
    pub async fn goto_login(&self, page: &mut Page) -> HarnessResult<()> {
        let url = self.login_url(None)?;
        page.goto(&url).await
    }

    /// Navigate to the login form on behalf of `service`. With a live single
    /// sign-on cookie the server skips the form and redirects straight back
    /// to the service with a fresh ticket.
    pub async fn goto_login_for(&self, page: &mut Page, service: &str) -> HarnessResult<()> {
        let url = self.login_url(Some(service))?;
        page.goto(&url).await
    }

    // -- credential submission ----------------------------------------------

    /// Fill and submit the standard login form with the default test
    /// credentials.
    pub async fn login_with(&self, page: &mut Page) -> HarnessResult<()> {
        let username = self.config.default_username.clone();
        let password = self.config.default_password.clone();
        self.login_with_credentials(page, &username, &password).await
    }

    /// Fill and submit the standard login form with explicit credentials.
    pub async fn login_with_credentials(
        &self,
        page: &mut Page,
        username: &str,
        password: &str,
    ) -> HarnessResult<()> {
        debug!(username, "submitting login form");
        page.type_text("#username", username, true).await?;
        page.type_text("#password", password, true).await?;
        page.press_enter().await?;
        page.wait_for_navigation().await
    }

    // -- state assertions ----------------------------------------------------

    /// Poll until the element is present and visible.
    pub async fn assert_visibility(&self, page: &mut Page, selector: &str) -> HarnessResult<()> {
        self.poll_visibility(page, selector, true).await
    }

    /// Poll until the element is absent or hidden.
    pub async fn assert_invisibility(&self, page: &mut Page, selector: &str) -> HarnessResult<()> {
        self.poll_visibility(page, selector, false).await
    }

    async fn poll_visibility(
        &self,
        page: &mut Page,
        selector: &str,
        expect_visible: bool,
    ) -> HarnessResult<()> {
        let timeout = page.element_timeout();
        let sel = selector.to_string();
        let what = if expect_visible { "visible" } else { "hidden" };

        poll_until(page, &format!("'{selector}' to be {what}"), timeout, move |page| {
            let sel = sel.clone();
            Box::pin(async move {
                let probe = page.probe(&sel).await?;
                Ok(visibility_matches(&probe, expect_visible).then_some(()))
            })
        })
        .await
        .map_err(|e| match e {
            HarnessError::Timeout { .. } => HarnessError::Assertion(format!(
                "element '{selector}' did not become {what} within {timeout:?}"
            )),
            other => other,
        })
    }

    /// The resolved element's text must start with `prefix`.
    pub async fn assert_inner_text_starts_with(
        &self,
        page: &mut Page,
        selector: &str,
        prefix: &str,
    ) -> HarnessResult<()> {
        let text = page.inner_text(selector).await?;
        if text.starts_with(prefix) {
            Ok(())
        } else {
            Err(HarnessError::assertion(
                &format!("text of '{selector}'"),
                format!("prefix '{prefix}'"),
                format!("'{}'", truncate(&text, 120)),
            ))
        }
    }

    /// The session cookie must be present in the page's cookie jar.
    pub async fn assert_cookie(&self, page: &mut Page) -> HarnessResult<()> {
        let name = &self.config.session_cookie;
        let cookies = page.cookies().await?;
        if cookies.iter().any(|c| c.name == *name && !c.value.is_empty()) {
            return Ok(());
        }
        let present: Vec<&str> = cookies.iter().map(|c| c.name.as_str()).collect();
        Err(HarnessError::assertion(
            "session cookie",
            format!("'{name}' set"),
            format!("cookies {present:?}"),
        ))
    }

    /// The session cookie must be gone, e.g. after logout.
    pub async fn assert_cookie_absent(&self, page: &mut Page) -> HarnessResult<()> {
        let name = &self.config.session_cookie;
        let cookies = page.cookies().await?;
        if cookies.iter().any(|c| c.name == *name) {
            return Err(HarnessError::assertion(
                "session cookie",
                format!("'{name}' absent"),
                "still set",
            ));
        }
        Ok(())
    }

    // -- ticket extraction ---------------------------------------------------

    /// Recover the service ticket from the post-login URL.
    ///
    /// Polls briefly because the final redirect to the service may still be
    /// settling; a URL that never grows a ticket fails the scenario with
    /// [`HarnessError::MissingTicket`].
    pub async fn assert_ticket_parameter(&self, page: &mut Page) -> HarnessResult<String> {
        let timeout = page.element_timeout();

        let polled = poll_until(page, "ticket parameter", timeout, |page| {
            Box::pin(async move {
                let url = page.current_url().await?;
                match extract_ticket(&url) {
                    Ok(ticket) => Ok(Some(ticket)),
                    Err(HarnessError::MissingTicket { .. }) => Ok(None),
                    Err(other) => Err(other),
                }
            })
        })
        .await;

        match polled {
            Ok(ticket) => {
                debug!(ticket = %ticket, "extracted service ticket");
                Ok(ticket)
            }
            Err(HarnessError::Timeout { .. }) => Err(HarnessError::MissingTicket {
                url: page.current_url().await?,
            }),
            Err(other) => Err(other),
        }
    }

    // -- diagnostics passthrough ---------------------------------------------

    /// Capture a labelled screenshot; failures are logged and swallowed.
    pub async fn screenshot(&self, page: &mut Page, label: &str) {
        self.diag.screenshot(page, label).await;
    }

    /// Log the page's current URL.
    pub async fn log_page(&self, page: &mut Page) {
        self.diag.log_page(page).await;
    }

    /// Log a scenario message.
    pub fn log(&self, message: &str) {
        self.diag.log(message);
    }
}

/// An element is visible when it exists and is rendered; anything else
/// (absent, display:none, hidden) counts as invisible. The two expectations
/// are complements of the same predicate, so they can never both hold on
/// one page state.
fn visibility_matches(probe: &crate::page::ElementProbe, expect_visible: bool) -> bool {
    (probe.found && probe.visible) == expect_visible
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;

    fn harness() -> Harness {
        Harness::new(HarnessConfig::default()).unwrap()
    }

    #[test]
    fn test_login_url_without_service() {
        let url = harness().login_url(None).unwrap();
        assert_eq!(url, "https://localhost:8443/cas/login");
    }

    #[test]
    fn test_login_url_with_service_is_encoded() {
        let url = harness()
            .login_url(Some("https://localhost:9859/anything/cas"))
            .unwrap();
        assert_eq!(
            url,
            "https://localhost:8443/cas/login?service=https%3A%2F%2Flocalhost%3A9859%2Fanything%2Fcas"
        );
    }

    #[test]
    fn test_login_url_tolerates_trailing_slash_base() {
        let mut config = HarnessConfig::default();
        config.server_base = "https://localhost:8443/cas/".to_string();
        let url = Harness::new(config).unwrap().login_url(None).unwrap();
        assert_eq!(url, "https://localhost:8443/cas/login");
    }

    #[test]
    fn test_visibility_expectations_are_mutually_exclusive() {
        use crate::page::ElementProbe;

        let states = [
            ElementProbe { found: false, visible: false, text: String::new() },
            ElementProbe { found: true, visible: false, text: String::new() },
            ElementProbe { found: true, visible: true, text: String::new() },
        ];
        for probe in &states {
            assert_ne!(
                visibility_matches(probe, true),
                visibility_matches(probe, false),
                "both expectations held for {probe:?}"
            );
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdef", 4), "abcd");
        assert_eq!(truncate("ab", 4), "ab");
        assert_eq!(truncate("äöüß", 2), "äö");
    }
}
