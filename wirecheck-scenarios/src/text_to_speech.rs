//! Batch text-to-speech: JSON text in, audio bytes out.

use futures::future::FutureExt;
use serde_json::{json, Value};
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{expect, Harness, RequestSpec, Scenario, ScenarioFuture};

pub const INTERFACE: &str = "text-to-speech";

const AUDIO_CONTENT_TYPE: &str = "^(audio/|application/octet-stream)";

/// Comfortably past what any starter accepts in one request.
const TOO_LONG: usize = 6000;

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(INTERFACE, "synthesizes audio", synthesizes::<S>),
        Scenario::new(INTERFACE, "accepts a model parameter", accepts_model::<S>),
        Scenario::new(INTERFACE, "rejects empty text", rejects_empty_text::<S>),
        Scenario::new(INTERFACE, "rejects text/plain with 415", rejects_plain_text::<S>),
        Scenario::new(INTERFACE, "rejects overlong text", rejects_long_text::<S>),
        Scenario::new(INTERFACE, "echoes X-Request-Id", echoes_request_id::<S>),
    ]
}

fn synthesize<S>(h: &Harness<S>, body: Value) -> RequestSpec {
    RequestSpec::post(h.config().endpoints().text_to_speech.clone()).json(body)
}

pub fn synthesizes<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let body = json!({"text": "Hello, world! This is a conformance check."});
        // the request itself must satisfy the contract
        h.validate("tts-request", &body).await?;
        let response = h.send_authenticated(synthesize(h, body)).await?;
        expect::status(&response, 200)?;
        expect::header_matches(&response, "content-type", AUDIO_CONTENT_TYPE)?;
        expect::non_empty_body(&response)?;
        Ok(())
    }
    .boxed_local()
}

pub fn accepts_model<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let spec = synthesize(h, json!({"text": "Testing a different voice."}))
            .query("model", "aura-2-apollo-en");
        let response = h.send_authenticated(spec).await?;
        expect::status(&response, 200)?;
        expect::non_empty_body(&response)?;
        Ok(())
    }
    .boxed_local()
}

pub fn rejects_empty_text<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let response = h.send_authenticated(synthesize(h, json!({"text": ""}))).await?;
        expect::status_at_least(&response, 400)?;
        h.validate("error", expect::json_body(&response)?).await
    }
    .boxed_local()
}

pub fn rejects_plain_text<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let spec = RequestSpec::post(h.config().endpoints().text_to_speech.clone())
            .bytes("Hello world", "text/plain");
        let response = h.send_authenticated(spec).await?;
        expect::status(&response, 415)?;
        h.validate("error", expect::json_body(&response)?).await?;
        expect::error_code_in(&response, &["INVALID_REQUEST_BODY", "UNSUPPORTED_MEDIA_TYPE"])?;
        Ok(())
    }
    .boxed_local()
}

pub fn rejects_long_text<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let body = json!({"text": "A".repeat(TOO_LONG)});
        let response = h.send_authenticated(synthesize(h, body)).await?;
        expect::status_at_least(&response, 400)?;
        h.validate("error", expect::json_body(&response)?).await?;
        expect::error_code(&response, "TEXT_TOO_LONG")
    }
    .boxed_local()
}

pub fn echoes_request_id<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let id = uuid::Uuid::new_v4().to_string();
        let spec = synthesize(h, json!({"text": "Hello world"})).header("X-Request-Id", id.clone());
        let response = h.send_authenticated(spec).await?;
        expect::status(&response, 200)?;
        expect::header_eq(&response, "x-request-id", &id)
    }
    .boxed_local()
}
