//! Session auth contract: token issuance and rejection of unauthenticated calls.
//!
//! Only meaningful where the starter runs with session auth, so every scenario here
//! is skipped unless `SESSION_AUTH=true`.

use futures::future::FutureExt;
use serde_json::{json, Value};
use wirecheck::auth::decode_jwt_header;
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{
    expect, Harness, HarnessError, RequestSpec, ResponseRecord, Scenario, ScenarioFuture,
};

pub const INTERFACE: &str = "session-auth";

const AUTH_ERROR_TYPE: &str = "AuthenticationError";

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(
            INTERFACE,
            "issues a session token",
            issues_token::<S>,
        )
        .requires_session_auth(),
        Scenario::new(
            INTERFACE,
            "rejects a missing token",
            rejects_missing_token::<S>,
        )
        .requires_session_auth(),
        Scenario::new(
            INTERFACE,
            "rejects an invalid token",
            rejects_invalid_token::<S>,
        )
        .requires_session_auth(),
    ]
}

/// Any protected REST call works; text-to-speech takes the smallest body.
fn protected_call<S>(h: &Harness<S>) -> RequestSpec {
    RequestSpec::post(h.config().endpoints().text_to_speech.clone()).json(json!({"text": "test"}))
}

async fn expect_auth_failure<S: TelemetrySink>(
    h: &Harness<S>,
    response: &ResponseRecord,
    code: &str,
) -> Result<(), HarnessError> {
    expect::status(response, 401)?;
    let body = expect::json_body(response)?;
    h.validate("error", body).await?;
    match body.pointer("/error/type").and_then(Value::as_str) {
        Some(AUTH_ERROR_TYPE) => {}
        other => {
            let actual = other.unwrap_or("absent");
            return Err(HarnessError::assertion("error.type", AUTH_ERROR_TYPE, actual));
        }
    }
    expect::error_code(response, code)
}

pub fn issues_token<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let response = h.send(&RequestSpec::get(h.config().endpoints().session.clone())).await?;
        expect::status(&response, 200)?;
        expect::header_matches(&response, "content-type", "application/json")?;
        let body = expect::json_body(&response)?;
        h.validate("session-token", body).await?;
        decode_jwt_header(expect::non_empty_str(body, "/token")?)?;
        Ok(())
    }
    .boxed_local()
}

pub fn rejects_missing_token<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let response = h.send(&protected_call(h)).await?;
        expect_auth_failure(h, &response, "MISSING_TOKEN").await
    }
    .boxed_local()
}

pub fn rejects_invalid_token<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let spec = protected_call(h).header("Authorization", "Bearer invalid.token.here");
        let response = h.send(&spec).await?;
        expect_auth_failure(h, &response, "INVALID_TOKEN").await
    }
    .boxed_local()
}
