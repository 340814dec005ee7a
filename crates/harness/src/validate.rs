//! Out-of-band ticket validation client
//!
//! Issues plain HTTP requests against the server's validation endpoints,
//! independent of the browser, and hands back raw response bodies. Typed
//! JSON parsing and XML substring helpers are provided for structural
//! assertions, but which serialization to check is the scenario's call -
//! the client itself is agnostic.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{HarnessError, HarnessResult};

/// Validation endpoint flavors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateEndpoint {
    /// `p3/serviceValidate`
    ServiceValidate,
    /// `p3/proxyValidate`
    ProxyValidate,
}

impl ValidateEndpoint {
    fn path(self) -> &'static str {
        match self {
            ValidateEndpoint::ServiceValidate => "p3/serviceValidate",
            ValidateEndpoint::ProxyValidate => "p3/proxyValidate",
        }
    }
}

/// Response serialization requested from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Xml,
}

impl ResponseFormat {
    fn as_str(self) -> &'static str {
        match self {
            ResponseFormat::Json => "JSON",
            ResponseFormat::Xml => "XML",
        }
    }
}

/// Status and body of a completed request, for callers that branch on the
/// status themselves
#[derive(Debug, Clone)]
pub struct HttpOutcome {
    pub status: u16,
    pub body: String,
}

/// HTTP client for validation endpoints, TLS relaxed for self-signed test
/// servers
pub struct ValidationClient {
    http: reqwest::Client,
}

impl ValidationClient {
    pub fn new() -> HarnessResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }

    /// GET `url` and return the raw body. Connection failures and
    /// non-success statuses both fail the scenario, carrying the status for
    /// diagnostics.
    pub async fn do_request(&self, url: &str) -> HarnessResult<String> {
        self.do_request_with_headers(url, &[]).await
    }

    /// [`do_request`](Self::do_request) with extra request headers.
    pub async fn do_request_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> HarnessResult<String> {
        let outcome = self.try_get(url, headers).await?;
        if !(200..300).contains(&outcome.status) {
            return Err(HarnessError::Request {
                url: url.to_string(),
                reason: format!("HTTP {}", outcome.status),
                status: Some(outcome.status),
            });
        }
        Ok(outcome.body)
    }

    /// GET `url` and return status plus body without judging the status.
    ///
    /// The result-value counterpart of callback-style branching: the caller
    /// observes success or error explicitly and decides whether the scenario
    /// continues. Only transport failure is an error here.
    pub async fn try_get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> HarnessResult<HttpOutcome> {
        debug!(url, "validation request");

        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| HarnessError::Request {
            url: url.to_string(),
            reason: e.to_string(),
            status: None,
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| HarnessError::Request {
            url: url.to_string(),
            reason: format!("body read failed: {e}"),
            status: Some(status),
        })?;

        Ok(HttpOutcome { status, body })
    }
}

/// Build a validation request URL.
///
/// `base` is the server base (e.g. `https://localhost:8443/cas`); `service`
/// and `ticket` are percent-encoded into the query, along with the requested
/// format and, when proxying is exercised, the `pgtUrl` callback.
pub fn validate_url(
    base: &str,
    endpoint: ValidateEndpoint,
    service: &str,
    ticket: &str,
    format: ResponseFormat,
    pgt_url: Option<&str>,
) -> HarnessResult<String> {
    let mut url = Url::parse(base)
        .map_err(|e| HarnessError::Protocol(format!("bad server base '{base}': {e}")))?;

    {
        // Url::join would eat the base path on absolute segments; extend
        // instead.
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| HarnessError::Protocol(format!("server base '{base}' cannot take a path")))?;
        segments.pop_if_empty();
        segments.extend(endpoint.path().split('/'));
    }

    url.query_pairs_mut()
        .append_pair("service", service)
        .append_pair("ticket", ticket)
        .append_pair("format", format.as_str());
    if let Some(pgt) = pgt_url {
        url.query_pairs_mut().append_pair("pgtUrl", pgt);
    }

    Ok(url.into())
}

// -- response documents ------------------------------------------------------

/// Top-level validation document, `format=JSON`
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationDocument {
    #[serde(rename = "serviceResponse")]
    pub service_response: ServiceResponse,
}

/// Either an authentication success or a failure record, never both
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceResponse {
    #[serde(rename = "authenticationSuccess")]
    pub authentication_success: Option<AuthenticationSuccess>,
    #[serde(rename = "authenticationFailure")]
    pub authentication_failure: Option<AuthenticationFailure>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticationSuccess {
    pub user: String,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    #[serde(rename = "proxyGrantingTicket")]
    pub proxy_granting_ticket: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticationFailure {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

impl ServiceResponse {
    /// The success record, or an assertion failure naming the server's
    /// failure code. Success and failure are checked for mutual exclusion
    /// before any nested field is read.
    pub fn success(&self) -> HarnessResult<&AuthenticationSuccess> {
        match (&self.authentication_success, &self.authentication_failure) {
            (Some(success), None) => Ok(success),
            (None, Some(failure)) => Err(HarnessError::Assertion(format!(
                "validation failed: {} ({})",
                failure.code, failure.description
            ))),
            (Some(_), Some(_)) => Err(HarnessError::Protocol(
                "validation response carries both success and failure".to_string(),
            )),
            (None, None) => Err(HarnessError::Protocol(
                "validation response carries neither success nor failure".to_string(),
            )),
        }
    }
}

/// Parse a `format=JSON` validation body.
pub fn parse_validation_json(body: &str) -> HarnessResult<ValidationDocument> {
    serde_json::from_str(body).map_err(|e| {
        HarnessError::Protocol(format!("validation body is not the expected JSON: {e}"))
    })
}

// -- XML helpers -------------------------------------------------------------

/// Whether an XML validation body names `user` as the authenticated
/// principal.
pub fn xml_has_user(body: &str, user: &str) -> bool {
    body.contains(&format!("<cas:user>{user}</cas:user>"))
}

/// The `<cas:proxyGrantingTicket>` value from an XML validation body, if
/// present.
pub fn xml_proxy_granting_ticket(body: &str) -> Option<&str> {
    let open = "<cas:proxyGrantingTicket>";
    let close = "</cas:proxyGrantingTicket>";
    let start = body.find(open)? + open.len();
    let end = body[start..].find(close)? + start;
    Some(body[start..end].trim())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::ticket::PGT_IOU_PREFIX;

    const SUCCESS_BODY: &str = r#"{
        "serviceResponse": {
            "authenticationSuccess": {
                "user": "casuser",
                "attributes": {
                    "firstname": ["Bob"],
                    "lastname": ["Johnson"],
                    "uid": ["casuser"],
                    "credentialType": ["UsernamePasswordCredential"]
                },
                "proxyGrantingTicket": "PGTIOU-84678-8a9d2sda"
            }
        }
    }"#;

    const FAILURE_BODY: &str = r#"{
        "serviceResponse": {
            "authenticationFailure": {
                "code": "INVALID_TICKET",
                "description": "Ticket 'ST-1' not recognized"
            }
        }
    }"#;

    #[test]
    fn test_parse_success_document() {
        let doc = parse_validation_json(SUCCESS_BODY).unwrap();
        let success = doc.service_response.success().unwrap();
        assert_eq!(success.user, "casuser");
        assert!(success.attributes.contains_key("credentialType"));
        assert!(success
            .proxy_granting_ticket
            .as_deref()
            .unwrap()
            .starts_with(PGT_IOU_PREFIX));
    }

    #[test]
    fn test_failure_document_surfaces_code_and_description() {
        let doc = parse_validation_json(FAILURE_BODY).unwrap();
        match doc.service_response.success() {
            Err(HarnessError::Assertion(detail)) => {
                assert!(detail.contains("INVALID_TICKET"));
                assert!(detail.contains("not recognized"));
            }
            other => panic!("expected assertion failure, got {other:?}"),
        }
    }

    #[test]
    fn test_success_and_failure_are_mutually_exclusive() {
        let body = r#"{
            "serviceResponse": {
                "authenticationSuccess": { "user": "casuser" },
                "authenticationFailure": { "code": "X", "description": "" }
            }
        }"#;
        let doc = parse_validation_json(body).unwrap();
        assert!(matches!(
            doc.service_response.success(),
            Err(HarnessError::Protocol(_))
        ));
    }

    #[test]
    fn test_empty_service_response_is_rejected() {
        let doc = parse_validation_json(r#"{ "serviceResponse": {} }"#).unwrap();
        assert!(matches!(
            doc.service_response.success(),
            Err(HarnessError::Protocol(_))
        ));
    }

    #[test]
    fn test_garbage_body_is_a_protocol_error() {
        assert!(matches!(
            parse_validation_json("<html>502 Bad Gateway</html>"),
            Err(HarnessError::Protocol(_))
        ));
    }

    #[test]
    fn test_validate_url_encodes_query() {
        let url = validate_url(
            "https://localhost:8443/cas",
            ValidateEndpoint::ServiceValidate,
            "https://localhost:9859/anything/cas",
            "ST-1-abc",
            ResponseFormat::Json,
            None,
        )
        .unwrap();

        assert!(url.starts_with("https://localhost:8443/cas/p3/serviceValidate?"));
        assert!(url.contains("service=https%3A%2F%2Flocalhost%3A9859%2Fanything%2Fcas"));
        assert!(url.contains("ticket=ST-1-abc"));
        assert!(url.contains("format=JSON"));
        assert!(!url.contains("pgtUrl"));
    }

    #[test]
    fn test_validate_url_with_pgt_callback() {
        let url = validate_url(
            "https://localhost:8443/cas",
            ValidateEndpoint::ProxyValidate,
            "https://apereo.github.io",
            "ST-2-def",
            ResponseFormat::Xml,
            Some("https://github.com/apereo/cas"),
        )
        .unwrap();

        assert!(url.contains("/cas/p3/proxyValidate?"));
        assert!(url.contains("format=XML"));
        assert!(url.contains("pgtUrl=https%3A%2F%2Fgithub.com%2Fapereo%2Fcas"));
    }

    #[test_case("https://localhost:8443/cas" ; "no trailing slash")]
    #[test_case("https://localhost:8443/cas/" ; "trailing slash")]
    fn test_validate_url_keeps_base_path(base: &str) {
        let url = validate_url(
            base,
            ValidateEndpoint::ServiceValidate,
            "https://s.example",
            "ST-3",
            ResponseFormat::Json,
            None,
        )
        .unwrap();
        assert!(url.contains("/cas/p3/serviceValidate?"));
        assert!(!url.contains("//p3"));
    }

    #[test]
    fn test_xml_helpers() {
        let body = r#"<cas:serviceResponse xmlns:cas='http://www.yale.edu/tp/cas'>
            <cas:authenticationSuccess>
                <cas:user>casuser</cas:user>
                <cas:proxyGrantingTicket>PGTIOU-84678-8a9d2</cas:proxyGrantingTicket>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;

        assert!(xml_has_user(body, "casuser"));
        assert!(!xml_has_user(body, "someoneelse"));
        let pgt = xml_proxy_granting_ticket(body).unwrap();
        assert!(pgt.starts_with(PGT_IOU_PREFIX));
    }

    #[test]
    fn test_xml_pgt_absent() {
        let body = "<cas:serviceResponse><cas:authenticationSuccess>\
                    <cas:user>casuser</cas:user>\
                    </cas:authenticationSuccess></cas:serviceResponse>";
        assert!(xml_proxy_granting_ticket(body).is_none());
    }
}
