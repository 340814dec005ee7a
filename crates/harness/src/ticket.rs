//! Service ticket extraction
//!
//! The join point between UI-level login and protocol-level validation: a
//! successful login redirects to the service URL with a single-use `ticket`
//! query parameter, and everything downstream depends on recovering it here.

use url::Url;

use crate::error::{HarnessError, HarnessResult};

/// Prefix of service tickets issued to plain services
pub const SERVICE_TICKET_PREFIX: &str = "ST-";

/// Prefix of proxy-granting ticket IOUs in validation responses
pub const PGT_IOU_PREFIX: &str = "PGTIOU-";

/// Extract the non-empty `ticket` query parameter from a post-login URL.
///
/// A missing or empty ticket signals an authentication failure and must fail
/// the scenario fast, so the error carries the URL that lacked it.
pub fn extract_ticket(page_url: &str) -> HarnessResult<String> {
    let parsed = Url::parse(page_url)
        .map_err(|e| HarnessError::Protocol(format!("unparseable page URL '{page_url}': {e}")))?;

    parsed
        .query_pairs()
        .find(|(key, _)| key == "ticket")
        .map(|(_, value)| value.into_owned())
        .filter(|ticket| !ticket.is_empty())
        .ok_or_else(|| HarnessError::MissingTicket {
            url: page_url.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_extracts_service_ticket() {
        let ticket = extract_ticket(
            "https://localhost:9859/anything/cas?ticket=ST-1-abcDEF-localhost",
        )
        .unwrap();
        assert_eq!(ticket, "ST-1-abcDEF-localhost");
        assert!(ticket.starts_with(SERVICE_TICKET_PREFIX));
    }

    #[test]
    fn test_extracts_ticket_among_other_parameters() {
        let ticket =
            extract_ticket("https://service.example/cb?state=xyz&ticket=ST-42-q&lang=en").unwrap();
        assert_eq!(ticket, "ST-42-q");
    }

    #[test_case("https://service.example/cb" ; "no query at all")]
    #[test_case("https://service.example/cb?state=xyz" ; "query without ticket")]
    #[test_case("https://service.example/cb?ticket=" ; "empty ticket value")]
    fn test_missing_ticket_fails_fast(page_url: &str) {
        match extract_ticket(page_url) {
            Err(HarnessError::MissingTicket { url }) => assert_eq!(url, page_url),
            other => panic!("expected MissingTicket, got {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_url_is_a_protocol_error() {
        assert!(matches!(
            extract_ticket("not a url"),
            Err(HarnessError::Protocol(_))
        ));
    }

    #[test]
    fn test_ticket_value_is_percent_decoded() {
        let ticket = extract_ticket("https://s.example/cb?ticket=ST%2D9%2Dzz").unwrap();
        assert_eq!(ticket, "ST-9-zz");
    }
}
