//! Out-of-band ticket validation scenarios
//!
//! These log in through the browser, then confirm the server's protocol
//! responses over plain HTTP - structurally, in both serializations the
//! server offers.

use ssoprobe_harness::{
    parse_validation_json, validate_url, Harness, HarnessError, HarnessResult, ResponseFormat,
    Session, ValidateEndpoint, PGT_IOU_PREFIX,
};

use crate::VALIDATION_SERVICE;

/// `p3/serviceValidate` with `format=JSON`: the success record names the
/// authenticated principal and carries the attribute mapping.
pub async fn ticket_validation_json(h: &Harness, session: &mut Session) -> HarnessResult<()> {
    let mut page = session.new_page().await?;

    h.goto_login_for(&mut page, VALIDATION_SERVICE).await?;
    h.login_with(&mut page).await?;
    let ticket = h.assert_ticket_parameter(&mut page).await?;

    let url = validate_url(
        &h.config().server_base,
        ValidateEndpoint::ServiceValidate,
        VALIDATION_SERVICE,
        &ticket,
        ResponseFormat::Json,
        None,
    )?;
    let body = h.validator().do_request(&url).await?;
    h.log(&body);

    let doc = parse_validation_json(&body)?;
    let success = doc.service_response.success()?;
    if success.user != h.config().default_username {
        return Err(HarnessError::assertion(
            "validated principal",
            &h.config().default_username,
            &success.user,
        ));
    }
    if !success.attributes.contains_key("credentialType") {
        return Err(HarnessError::assertion(
            "released attributes",
            "credentialType present",
            format!("{:?}", success.attributes.keys().collect::<Vec<_>>()),
        ));
    }
    Ok(())
}

/// `p3/proxyValidate` with a `pgtUrl` callback: a proxy-granting ticket IOU
/// comes back in the JSON pass, and a second single sign-on login validates
/// the same way in XML.
pub async fn ticket_validation_pgt(h: &Harness, session: &mut Session) -> HarnessResult<()> {
    let mut page = session.new_page().await?;
    let pgt_callback = "https://github.com/apereo/cas";

    h.goto_login_for(&mut page, VALIDATION_SERVICE).await?;
    h.login_with(&mut page).await?;
    let ticket = h.assert_ticket_parameter(&mut page).await?;

    let url = validate_url(
        &h.config().server_base,
        ValidateEndpoint::ProxyValidate,
        VALIDATION_SERVICE,
        &ticket,
        ResponseFormat::Json,
        Some(pgt_callback),
    )?;
    let body = h.validator().do_request(&url).await?;
    h.log(&body);

    let doc = parse_validation_json(&body)?;
    let success = doc.service_response.success()?;
    if success.user != h.config().default_username {
        return Err(HarnessError::assertion(
            "validated principal",
            &h.config().default_username,
            &success.user,
        ));
    }
    match &success.proxy_granting_ticket {
        Some(pgt) if pgt.starts_with(PGT_IOU_PREFIX) => {}
        other => {
            return Err(HarnessError::assertion(
                "proxy-granting ticket",
                format!("prefix {PGT_IOU_PREFIX}"),
                format!("{other:?}"),
            ))
        }
    }

    // Second pass rides the established session and checks the XML shape.
    h.goto_login_for(&mut page, VALIDATION_SERVICE).await?;
    let ticket = h.assert_ticket_parameter(&mut page).await?;

    let url = validate_url(
        &h.config().server_base,
        ValidateEndpoint::ProxyValidate,
        VALIDATION_SERVICE,
        &ticket,
        ResponseFormat::Xml,
        Some(pgt_callback),
    )?;
    let body = h.validator().do_request(&url).await?;
    h.log(&body);

    if !ssoprobe_harness::validate::xml_has_user(&body, &h.config().default_username) {
        return Err(HarnessError::assertion(
            "XML validation body",
            format!("<cas:user>{}</cas:user>", h.config().default_username),
            "no such element",
        ));
    }
    match ssoprobe_harness::validate::xml_proxy_granting_ticket(&body) {
        Some(pgt) if pgt.starts_with(PGT_IOU_PREFIX) => Ok(()),
        other => Err(HarnessError::assertion(
            "XML proxy-granting ticket",
            format!("prefix {PGT_IOU_PREFIX}"),
            format!("{other:?}"),
        )),
    }
}
