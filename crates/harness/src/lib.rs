//! SsoProbe Scenario Harness
//!
//! Browser-automation and protocol-assertion harness for end-to-end
//! scenarios against a running single-sign-on server. Scenarios drive a
//! headless browser through login flows (password, multi-factor,
//! passwordless, surrogate), then independently verify the server's
//! ticket-based validation protocol over plain HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Scenario (thin fixture)                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Session ── launch / new_page / bring_to_front / shutdown    │
//! │    └── Page ── goto, click, type, submit, probe, cookies     │
//! │          └── CdpClient ── DevTools WebSocket per tab         │
//! │  Harness ── goto_login, login_with, assert_* vocabulary      │
//! │    ├── ticket ── extract `ticket=` from post-login URL       │
//! │    ├── ValidationClient ── out-of-band GET, JSON/XML bodies  │
//! │    └── Diagnostics ── screenshots + page logging, non-fatal  │
//! │  wait::poll_until ── bounded backoff under every assertion   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! One scenario owns one [`Session`]; teardown is scoped and runs on every
//! exit path. Every error is fatal to its scenario - the harness fails fast
//! and loud with the URL, selector, or expected-vs-actual detail needed to
//! diagnose without a re-run.

pub mod cdp;
pub mod config;
pub mod diag;
pub mod error;
pub mod flow;
pub mod page;
pub mod session;
pub mod ticket;
pub mod validate;
pub mod wait;

pub use config::{BrowserConfig, HarnessConfig};
pub use diag::Diagnostics;
pub use error::{HarnessError, HarnessResult};
pub use flow::Harness;
pub use page::{Cookie, ElementProbe, Page};
pub use session::Session;
pub use ticket::{extract_ticket, PGT_IOU_PREFIX, SERVICE_TICKET_PREFIX};
pub use validate::{
    parse_validation_json, validate_url, ResponseFormat, ValidateEndpoint, ValidationClient,
};
pub use wait::{poll_until, settle};
