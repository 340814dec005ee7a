//! Page handle and interaction primitives
//!
//! A [`Page`] is one browsing context with its own navigation history, DOM
//! and cookie view, bound to a dedicated DevTools socket. All interaction
//! goes through `&mut self`: a page is driven by exactly one caller at a
//! time, and multi-page scenarios switch targets explicitly through the
//! session's bring-to-front operation.
//!
//! Element resolution is a bounded poll, never a fixed sleep. A selector
//! that stays unresolved for the element timeout is an
//! [`HarnessError::ElementNotFound`], carrying the selector and the bound.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::cdp::CdpClient;
use crate::error::{HarnessError, HarnessResult};
use crate::wait::poll_until;

/// Observed state of the first element matching a selector
#[derive(Debug, Clone, Deserialize)]
pub struct ElementProbe {
    pub found: bool,
    pub visible: bool,
    #[serde(default)]
    pub text: String,
}

/// A cookie as reported by the browser's network stack
#[derive(Debug, Clone, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, rename = "httpOnly")]
    pub http_only: bool,
}

/// One browsing context under a session
pub struct Page {
    cdp: CdpClient,
    target_id: String,
    navigation_timeout: Duration,
    element_timeout: Duration,
}

impl Page {
    pub(crate) fn new(
        cdp: CdpClient,
        target_id: String,
        navigation_timeout: Duration,
        element_timeout: Duration,
    ) -> Self {
        Self {
            cdp,
            target_id,
            navigation_timeout,
            element_timeout,
        }
    }

    /// DevTools target id, used by the session to activate or close the tab.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Bounded wait applied when resolving selectors on this page.
    pub fn element_timeout(&self) -> Duration {
        self.element_timeout
    }

    // -- navigation ---------------------------------------------------------

    /// Navigate and wait for the load event.
    pub async fn goto(&mut self, url: &str) -> HarnessResult<()> {
        debug!(url, "navigating");

        let reply = self.cdp.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(reason) = reply
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            return Err(HarnessError::Navigation {
                url: url.to_string(),
                reason: reason.to_string(),
            });
        }

        self.wait_for_navigation().await.map_err(|e| match e {
            HarnessError::Timeout { timeout, .. } => HarnessError::Navigation {
                url: url.to_string(),
                reason: format!("load event did not fire within {timeout:?}"),
            },
            other => other,
        })
    }

    /// Wait for the next load event, e.g. after a form submission that
    /// triggers a redirect chain.
    pub async fn wait_for_navigation(&mut self) -> HarnessResult<()> {
        self.cdp
            .wait_for_event("Page.loadEventFired", self.navigation_timeout)
            .await?;
        Ok(())
    }

    // -- script evaluation --------------------------------------------------

    /// Evaluate a JavaScript expression in the page, returning its value.
    pub async fn evaluate(&self, expression: &str) -> HarnessResult<Value> {
        let reply = self
            .cdp
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = reply.get("exceptionDetails") {
            let message = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("unknown exception");
            return Err(HarnessError::Protocol(format!("script exception: {message}")));
        }

        Ok(reply
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Current page URL.
    pub async fn current_url(&self) -> HarnessResult<String> {
        let value = self.evaluate("window.location.href").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| HarnessError::Protocol("location.href was not a string".to_string()))
    }

    // -- element state ------------------------------------------------------

    /// Observe the first element matching `selector` right now, without
    /// waiting.
    pub async fn probe(&self, selector: &str) -> HarnessResult<ElementProbe> {
        let value = self.evaluate(&probe_expr(selector)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Resolve `selector` to an element within the element timeout.
    pub async fn wait_for_element(&mut self, selector: &str) -> HarnessResult<ElementProbe> {
        let timeout = self.element_timeout;
        let sel = selector.to_string();

        poll_until(self, &format!("element '{selector}'"), timeout, move |page| {
            let sel = sel.clone();
            Box::pin(async move {
                let probe = page.probe(&sel).await?;
                Ok(probe.found.then_some(probe))
            })
        })
        .await
        .map_err(|e| match e {
            HarnessError::Timeout { .. } => HarnessError::ElementNotFound {
                selector: selector.to_string(),
                timeout,
            },
            other => other,
        })
    }

    /// Text content of the resolved element.
    pub async fn inner_text(&mut self, selector: &str) -> HarnessResult<String> {
        Ok(self.wait_for_element(selector).await?.text)
    }

    // -- element interaction ------------------------------------------------

    /// Click the element matching `selector`.
    pub async fn click(&mut self, selector: &str) -> HarnessResult<()> {
        self.wait_for_element(selector).await?;
        self.evaluate(&format!(
            "document.querySelector({}).click()",
            js_string(selector)
        ))
        .await?;
        Ok(())
    }

    /// Type into the element matching `selector` with real key events.
    ///
    /// `clear_first` empties the field before typing, for forms that arrive
    /// pre-filled.
    pub async fn type_text(
        &mut self,
        selector: &str,
        text: &str,
        clear_first: bool,
    ) -> HarnessResult<()> {
        self.wait_for_element(selector).await?;

        let sel = js_string(selector);
        self.evaluate(&format!("document.querySelector({sel}).focus()")).await?;
        if clear_first {
            self.evaluate(&format!("document.querySelector({sel}).value = \"\"")).await?;
        }

        for ch in text.chars() {
            let ch = ch.to_string();
            self.cdp
                .call("Input.dispatchKeyEvent", char_key_event("keyDown", &ch))
                .await?;
            self.cdp
                .call("Input.dispatchKeyEvent", char_key_event("keyUp", &ch))
                .await?;
        }
        Ok(())
    }

    /// Press Enter in the focused element.
    pub async fn press_enter(&mut self) -> HarnessResult<()> {
        for params in enter_key_events() {
            self.cdp.call("Input.dispatchKeyEvent", params).await?;
        }
        Ok(())
    }

    /// Submit the form matching `selector`.
    pub async fn submit_form(&mut self, selector: &str) -> HarnessResult<()> {
        self.wait_for_element(selector).await?;
        let sel = js_string(selector);
        self.evaluate(&format!(
            "(() => {{ const f = document.querySelector({sel}); \
             if (f.requestSubmit) f.requestSubmit(); else f.submit(); }})()"
        ))
        .await?;
        Ok(())
    }

    // -- cookies and capture ------------------------------------------------

    /// Cookies visible to this page.
    pub async fn cookies(&self) -> HarnessResult<Vec<Cookie>> {
        let reply = self.cdp.call("Network.getCookies", json!({})).await?;
        let cookies = reply
            .get("cookies")
            .cloned()
            .ok_or_else(|| HarnessError::Protocol("getCookies returned no cookie list".to_string()))?;
        Ok(serde_json::from_value(cookies)?)
    }

    /// Capture the rendered page as PNG bytes.
    pub async fn screenshot_png(&self) -> HarnessResult<Vec<u8>> {
        let reply = self
            .cdp
            .call("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = reply
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| HarnessError::Protocol("captureScreenshot returned no data".to_string()))?;
        B64.decode(data)
            .map_err(|e| HarnessError::Protocol(format!("screenshot payload not base64: {e}")))
    }
}

// -- script and event builders ----------------------------------------------

/// Quote a string as a JavaScript literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Expression observing the first match of `selector`: presence, computed
/// visibility, and text content.
fn probe_expr(selector: &str) -> String {
    let sel = js_string(selector);
    format!(
        "(() => {{ \
           const el = document.querySelector({sel}); \
           if (!el) return {{ found: false, visible: false, text: \"\" }}; \
           const style = window.getComputedStyle(el); \
           const visible = style.display !== \"none\" && style.visibility !== \"hidden\" \
             && el.getClientRects().length > 0; \
           return {{ found: true, visible: visible, text: el.innerText || \"\" }}; \
         }})()"
    )
}

fn char_key_event(kind: &str, ch: &str) -> Value {
    json!({
        "type": kind,
        "text": ch,
        "unmodifiedText": ch,
        "key": ch,
    })
}

fn enter_key_events() -> Vec<Value> {
    vec![
        json!({
            "type": "rawKeyDown",
            "key": "Enter",
            "code": "Enter",
            "windowsVirtualKeyCode": 13,
            "nativeVirtualKeyCode": 13,
        }),
        json!({ "type": "char", "text": "\r", "unmodifiedText": "\r" }),
        json!({
            "type": "keyUp",
            "key": "Enter",
            "code": "Enter",
            "windowsVirtualKeyCode": 13,
            "nativeVirtualKeyCode": 13,
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("#fm1"), r##""#fm1""##);
        assert_eq!(
            js_string(r#"div[name="bodyPlainText"] .well"#),
            r#""div[name=\"bodyPlainText\"] .well""#
        );
    }

    #[test]
    fn test_probe_expr_embeds_selector_safely() {
        let expr = probe_expr("input[type=\"search\"]");
        assert!(expr.contains(r#"document.querySelector("input[type=\"search\"]")"#));
        assert!(expr.contains("getComputedStyle"));
    }

    #[test]
    fn test_element_probe_parses_from_evaluate_value() {
        let value = json!({ "found": true, "visible": false, "text": "Log In" });
        let probe: ElementProbe = serde_json::from_value(value).unwrap();
        assert!(probe.found);
        assert!(!probe.visible);
        assert_eq!(probe.text, "Log In");
    }

    #[test]
    fn test_cookie_parses_from_devtools_shape() {
        let value = json!([{
            "name": "TGC",
            "value": "eyJhbGciOi",
            "domain": "localhost",
            "path": "/cas",
            "size": 10,
            "httpOnly": true,
            "secure": true,
            "session": true,
            "priority": "Medium"
        }]);
        let cookies: Vec<Cookie> = serde_json::from_value(value).unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "TGC");
        assert!(cookies[0].http_only);
        assert_eq!(cookies[0].path, "/cas");
    }

    #[test]
    fn test_enter_key_event_sequence() {
        let events = enter_key_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["type"], "rawKeyDown");
        assert_eq!(events[0]["windowsVirtualKeyCode"], 13);
        assert_eq!(events[1]["type"], "char");
        assert_eq!(events[2]["type"], "keyUp");
    }

    #[test]
    fn test_char_key_event_shape() {
        let event = char_key_event("keyDown", "M");
        assert_eq!(event["type"], "keyDown");
        assert_eq!(event["text"], "M");
        assert_eq!(event["unmodifiedText"], "M");
    }
}
