//! Password, single sign-on, and passwordless login scenarios

use std::time::Duration;

use ssoprobe_harness::{settle, Harness, HarnessError, HarnessResult, Session, SERVICE_TICKET_PREFIX};

use crate::DEFAULT_SERVICE;

/// Plain login: the post-login URL points back at the service with a
/// `ticket=ST-` parameter, and the session cookie is set.
pub async fn password_login(h: &Harness, session: &mut Session) -> HarnessResult<()> {
    let mut page = session.new_page().await?;

    h.goto_login_for(&mut page, DEFAULT_SERVICE).await?;
    h.log_page(&mut page).await;
    h.login_with(&mut page).await?;

    let url = page.current_url().await?;
    if !url.starts_with(DEFAULT_SERVICE) {
        return Err(HarnessError::assertion(
            "post-login URL",
            format!("prefix {DEFAULT_SERVICE}"),
            url,
        ));
    }

    let ticket = h.assert_ticket_parameter(&mut page).await?;
    if !ticket.starts_with(SERVICE_TICKET_PREFIX) {
        return Err(HarnessError::assertion(
            "ticket shape",
            format!("prefix {SERVICE_TICKET_PREFIX}"),
            ticket,
        ));
    }

    h.goto_login(&mut page).await?;
    h.assert_cookie(&mut page).await?;
    Ok(())
}

/// Idempotence of the login entry point: with a live session cookie a second
/// visit never re-presents the form, it redirects straight back to the
/// service with a freshly issued ticket.
pub async fn sso_relogin(h: &Harness, session: &mut Session) -> HarnessResult<()> {
    let mut page = session.new_page().await?;

    h.goto_login_for(&mut page, DEFAULT_SERVICE).await?;
    h.login_with(&mut page).await?;
    let first = h.assert_ticket_parameter(&mut page).await?;

    h.log("re-entering login with an established session");
    h.goto_login_for(&mut page, DEFAULT_SERVICE).await?;
    h.log_page(&mut page).await;

    let url = page.current_url().await?;
    if !url.starts_with(DEFAULT_SERVICE) {
        return Err(HarnessError::assertion(
            "re-login URL",
            format!("prefix {DEFAULT_SERVICE}"),
            url,
        ));
    }
    let second = h.assert_ticket_parameter(&mut page).await?;
    if first == second {
        return Err(HarnessError::assertion(
            "re-issued ticket",
            "a fresh single-use ticket",
            format!("the original '{first}' again"),
        ));
    }
    Ok(())
}

/// Identifier-first login: no password field on the first screen, then a
/// password challenge replaces the identifier input. The `user3+casuser`
/// identifier authenticates `casuser` acting as surrogate for `user3`.
pub async fn passwordless_surrogate(h: &Harness, session: &mut Session) -> HarnessResult<()> {
    let mut page = session.new_page().await?;

    h.goto_login(&mut page).await?;

    let password_field = page.probe("#password").await?;
    if password_field.found {
        return Err(HarnessError::assertion(
            "passwordless first screen",
            "no #password field",
            "one rendered",
        ));
    }

    page.type_text("#username", "user3+casuser", false).await?;
    page.press_enter().await?;
    page.wait_for_navigation().await?;

    h.assert_invisibility(&mut page, "#username").await?;
    h.assert_visibility(&mut page, "#password").await?;

    page.type_text("#password", "Mellon", false).await?;
    page.press_enter().await?;
    page.wait_for_navigation().await?;

    h.assert_cookie(&mut page).await?;
    h.assert_inner_text_starts_with(
        &mut page,
        "#content div p",
        "You, user3, have successfully logged in",
    )
    .await?;

    // Surrogate identities land in the released attributes table.
    page.click("#auth-tab").await?;
    page.type_text("#attribute-tab-1 input[type=search]", "surrogate", false)
        .await?;
    settle(Duration::from_millis(500)).await;
    h.screenshot(&mut page, "surrogate-attributes").await;

    h.assert_inner_text_starts_with(&mut page, "#surrogateEnabled td code kbd", "[true]")
        .await?;
    h.assert_inner_text_starts_with(&mut page, "#surrogatePrincipal td code kbd", "[casuser]")
        .await?;
    h.assert_inner_text_starts_with(&mut page, "#surrogateUser td code kbd", "[user3]")
        .await?;
    Ok(())
}
