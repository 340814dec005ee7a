//! Multifactor scenarios
//!
//! The one-time-code flow is the only multi-page scenario: the primary tab
//! sits mid-flow on the code prompt while a second tab scrapes the code from
//! the mail viewer, then the primary tab is explicitly brought back to the
//! front before the code is typed.

use std::time::Duration;

use ssoprobe_harness::{
    parse_validation_json, settle, validate_url, Harness, HarnessError, HarnessResult,
    ResponseFormat, Session, ValidateEndpoint,
};

use crate::{require_env, DEFAULT_SERVICE};

/// Attribute keys the delegated provider is expected to release
const DECLARED_ATTRIBUTES: [&str; 7] = [
    "firstname", "lastname", "uid", "upn", "username", "surname", "email",
];

/// Mail viewer that receives the one-time code, overridable per environment
fn mail_viewer_url() -> String {
    std::env::var("SSOPROBE_MAIL_URL").unwrap_or_else(|_| "http://localhost:8282".to_string())
}

/// Delegated login, then a one-time code scraped out of band.
pub async fn mfa_one_time_code(h: &Harness, session: &mut Session) -> HarnessResult<()> {
    let idp_username = require_env("IDP_USERNAME")?;
    let idp_password = require_env("IDP_PASSWORD")?;

    let mut page = session.new_page().await?;

    h.log(&format!("navigating to login for {DEFAULT_SERVICE}"));
    h.goto_login_for(&mut page, DEFAULT_SERVICE).await?;

    // Hand off to the external identity provider.
    page.click("div .idp span").await?;
    page.wait_for_navigation().await?;
    h.screenshot(&mut page, "idp-login-form").await;

    page.type_text("#userNameInput", &idp_username, true).await?;
    page.type_text("#passwordInput", &idp_password, true).await?;
    page.submit_form("#loginForm").await?;
    page.wait_for_navigation().await?;
    h.screenshot(&mut page, "idp-submitted").await;

    // The code lands in the mail viewer; read it from a second tab.
    let mut mail_page = session.new_page().await?;
    mail_page.goto(&mail_viewer_url()).await?;
    mail_page.click("table tbody td a").await?;
    let code = mail_page
        .inner_text("div[name=bodyPlainText] .well")
        .await?;
    let code = code.trim().to_string();
    if code.is_empty() {
        return Err(HarnessError::assertion(
            "one-time code",
            "a non-empty code in the mail viewer",
            "empty text",
        ));
    }

    // Back to the primary tab for the challenge.
    session.bring_to_front(&page).await?;
    h.assert_visibility(&mut page, "#token").await?;
    page.type_text("#token", &code, true).await?;
    page.submit_form("#fm1").await?;
    page.wait_for_navigation().await?;
    h.log_page(&mut page).await;

    let ticket = h.assert_ticket_parameter(&mut page).await?;
    h.goto_login(&mut page).await?;
    h.assert_cookie(&mut page).await?;

    let url = validate_url(
        &h.config().server_base,
        ValidateEndpoint::ServiceValidate,
        DEFAULT_SERVICE,
        &ticket,
        ResponseFormat::Json,
        None,
    )?;
    let body = h.validator().do_request(&url).await?;
    h.log(&body);

    let doc = parse_validation_json(&body)?;
    let success = doc.service_response.success()?;
    if success.user.is_empty() {
        return Err(HarnessError::assertion(
            "validated principal",
            "a non-empty user",
            "empty",
        ));
    }
    for key in DECLARED_ATTRIBUTES {
        if !success.attributes.contains_key(key) {
            return Err(HarnessError::assertion(
                "released attributes",
                format!("'{key}' present"),
                format!("{:?}", success.attributes.keys().collect::<Vec<_>>()),
            ));
        }
    }

    session.close_page(mail_page).await?;
    Ok(())
}

/// After primary credentials, the provider selection screen offers the
/// configured multifactor choices.
pub async fn mfa_provider_selection(h: &Harness, session: &mut Session) -> HarnessResult<()> {
    let mut page = session.new_page().await?;

    h.goto_login_for(&mut page, crate::VALIDATION_SERVICE).await?;
    h.login_with(&mut page).await?;

    h.assert_visibility(&mut page, "#mfa-gauth").await?;
    h.assert_visibility(&mut page, "#mfa-webauthn").await?;

    settle(Duration::from_millis(500)).await;
    h.screenshot(&mut page, "mfa-provider-selection").await;
    Ok(())
}
