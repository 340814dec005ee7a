//! Scenario fixtures
//!
//! Each scenario is a thin sequence of harness calls: obtain a page, drive
//! it to an authenticated state, recover the issued ticket, and confirm the
//! server's protocol response out of band. All the real machinery lives in
//! `ssoprobe-harness`; a scenario only composes it.
//!
//! One scenario runs over one exclusive [`Session`]; the runner launches and
//! tears the session down around each entry in the catalog.

use futures_util::future::BoxFuture;
use ssoprobe_harness::{Harness, HarnessError, HarnessResult, Session};

pub mod login;
pub mod mfa;
pub mod validation;

/// Service registered with the test server that echoes its request
pub const DEFAULT_SERVICE: &str = "https://localhost:9859/anything/cas";

/// Static service used by the validation scenarios
pub const VALIDATION_SERVICE: &str = "https://apereo.github.io";

/// Entry point signature every scenario satisfies
pub type ScenarioFn = for<'a> fn(&'a Harness, &'a mut Session) -> BoxFuture<'a, HarnessResult<()>>;

/// A named scenario
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub run: ScenarioFn,
}

/// Every scenario, in the order the runner executes them.
pub fn catalog() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "password-login",
            description: "Plain username/password login issues a service ticket and a session cookie",
            run: |h, s| Box::pin(login::password_login(h, s)),
        },
        Scenario {
            name: "sso-relogin",
            description: "A live session cookie skips the form and redirects with a fresh ticket",
            run: |h, s| Box::pin(login::sso_relogin(h, s)),
        },
        Scenario {
            name: "passwordless-surrogate",
            description: "Identifier-first login with a password challenge, as a surrogate principal",
            run: |h, s| Box::pin(login::passwordless_surrogate(h, s)),
        },
        Scenario {
            name: "ticket-validation-json",
            description: "p3/serviceValidate with format=JSON returns the authenticated principal",
            run: |h, s| Box::pin(validation::ticket_validation_json(h, s)),
        },
        Scenario {
            name: "ticket-validation-pgt",
            description: "p3/proxyValidate with pgtUrl yields a PGTIOU in both JSON and XML",
            run: |h, s| Box::pin(validation::ticket_validation_pgt(h, s)),
        },
        Scenario {
            name: "mfa-one-time-code",
            description: "Delegated login plus one-time code scraped from the mail viewer on a second tab",
            run: |h, s| Box::pin(mfa::mfa_one_time_code(h, s)),
        },
        Scenario {
            name: "mfa-provider-selection",
            description: "Primary login surfaces the configured multifactor provider choices",
            run: |h, s| Box::pin(mfa::mfa_provider_selection(h, s)),
        },
    ]
}

/// Scenario-specific secret from the process environment.
///
/// Credentials for external identity providers are never hard-coded; a
/// missing variable fails the scenario with a message naming it.
pub fn require_env(name: &str) -> HarnessResult<String> {
    std::env::var(name)
        .map_err(|_| HarnessError::Assertion(format!("environment variable {name} is not set")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_catalog_names_are_unique() {
        let scenarios = catalog();
        let names: HashSet<&str> = scenarios.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), scenarios.len());
    }

    #[test]
    fn test_catalog_entries_are_described() {
        for scenario in catalog() {
            assert!(!scenario.description.is_empty(), "{} lacks a description", scenario.name);
        }
    }

    #[test]
    fn test_require_env_names_the_variable() {
        match require_env("SSOPROBE_DOES_NOT_EXIST") {
            Err(HarnessError::Assertion(detail)) => {
                assert!(detail.contains("SSOPROBE_DOES_NOT_EXIST"));
            }
            other => panic!("expected assertion failure, got {other:?}"),
        }
    }
}
