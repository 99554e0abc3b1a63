//! Batch speech-to-text: raw `audio/wav` bodies posted to the transcribe endpoint.

use futures::future::FutureExt;
use wirecheck::fixtures::{AUDIO_WAV, BAD_AUDIO};
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{
    expect, Harness, HarnessError, RequestSpec, ResponseRecord, Scenario, ScenarioFuture,
};

pub const INTERFACE: &str = "stt";

/// Codes a starter may answer undecodable audio with.
const BAD_AUDIO_CODES: &[&str] =
    &["BAD_AUDIO", "UNSUPPORTED_MEDIA_TYPE", "AUDIO_TOO_LONG", "MODEL_NOT_FOUND"];

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(INTERFACE, "transcribes audio/wav", transcribes_wav::<S>),
        Scenario::new(INTERFACE, "accepts audio/mpeg", accepts_mpeg::<S>),
        Scenario::new(INTERFACE, "accepts audio/webm", accepts_webm::<S>),
        Scenario::new(INTERFACE, "rejects application/json with 415", rejects_json::<S>),
        Scenario::new(INTERFACE, "echoes X-Request-Id", echoes_request_id::<S>),
        Scenario::new(INTERFACE, "accepts transcription options", accepts_options::<S>),
        Scenario::new(INTERFACE, "ignores unknown parameters", ignores_unknown_params::<S>),
        Scenario::new(INTERFACE, "reports undecodable audio", reports_bad_audio::<S>),
        Scenario::new(INTERFACE, "rejects an empty body", rejects_empty_body::<S>),
    ]
}

async fn post_wav<S: TelemetrySink>(
    h: &Harness<S>,
    spec: RequestSpec,
) -> Result<ResponseRecord, HarnessError> {
    let audio = h.fixtures().load_binary(AUDIO_WAV).await?;
    h.send_authenticated(spec.bytes(audio, "audio/wav")).await
}

fn endpoint<S>(h: &Harness<S>) -> RequestSpec {
    RequestSpec::post(h.config().endpoints().stt.clone())
}

pub fn transcribes_wav<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let response = post_wav(h, endpoint(h)).await?;
        expect::status(&response, 200)?;
        expect::header_matches(&response, "content-type", "application/json")?;
        let body = expect::json_body(&response)?;
        h.validate("transcript", body).await?;
        expect::non_empty_str(body, "/transcript")?;
        Ok(())
    }
    .boxed_local()
}

/// The body is WAV whatever the label, so a decode failure (400) still counts as accepted.
async fn accepts_audio_type<S: TelemetrySink>(
    h: &Harness<S>,
    content_type: &str,
) -> Result<(), HarnessError> {
    let audio = h.fixtures().load_binary(AUDIO_WAV).await?;
    let response = h.send_authenticated(endpoint(h).bytes(audio, content_type)).await?;
    expect::status_in(&response, &[200, 400])?;
    let body = expect::json_body(&response)?;
    if response.is_success() {
        h.validate("transcript", body).await
    } else {
        h.validate("error", body).await
    }
}

pub fn accepts_mpeg<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    accepts_audio_type(h, "audio/mpeg").boxed_local()
}

pub fn accepts_webm<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    accepts_audio_type(h, "audio/webm").boxed_local()
}

pub fn rejects_json<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let spec = endpoint(h).json(serde_json::json!({"url": "https://example.com/audio.wav"}));
        let response = h.send_authenticated(spec).await?;
        expect::status(&response, 415)?;
        h.validate("error", expect::json_body(&response)?).await?;
        expect::error_code(&response, "UNSUPPORTED_MEDIA_TYPE")
    }
    .boxed_local()
}

pub fn echoes_request_id<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let id = uuid::Uuid::new_v4().to_string();
        let response = post_wav(h, endpoint(h).header("X-Request-Id", id.clone())).await?;
        expect::status(&response, 200)?;
        expect::header_eq(&response, "x-request-id", &id)
    }
    .boxed_local()
}

pub fn accepts_options<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let spec = endpoint(h)
            .query("model", "nova-3")
            .query("language", "en")
            .query("smart_format", "true")
            .query("paragraphs", "true")
            .query("tag", "wirecheck");
        let response = post_wav(h, spec).await?;
        expect::status(&response, 200)?;
        h.validate("transcript", expect::json_body(&response)?).await
    }
    .boxed_local()
}

pub fn ignores_unknown_params<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let response = post_wav(h, endpoint(h).query("wirecheck_unknown", "1")).await?;
        expect::status(&response, 200)
    }
    .boxed_local()
}

/// Noise may still transcribe (to nothing); an error must use a known code.
pub fn reports_bad_audio<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let noise = h.fixtures().load_binary(BAD_AUDIO).await?;
        let response = h.send_authenticated(endpoint(h).bytes(noise, "audio/wav")).await?;
        if response.is_success() {
            return h.validate("transcript", expect::json_body(&response)?).await;
        }
        expect::status_at_least(&response, 400)?;
        h.validate("error", expect::json_body(&response)?).await?;
        expect::error_code_in(&response, BAD_AUDIO_CODES)?;
        Ok(())
    }
    .boxed_local()
}

pub fn rejects_empty_body<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let response = h.send_authenticated(endpoint(h).bytes(Vec::new(), "audio/wav")).await?;
        expect::status_at_least(&response, 400)?;
        h.validate("error", expect::json_body(&response)?).await?;
        expect::error_code_in(&response, &["BAD_AUDIO", "UNSUPPORTED_MEDIA_TYPE"])?;
        Ok(())
    }
    .boxed_local()
}
