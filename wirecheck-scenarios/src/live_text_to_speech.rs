//! Streaming text-to-speech: `Speak` text in, binary audio chunks out.

use futures::future::FutureExt;
use serde_json::json;
use wirecheck::stream::{self, ClientMessage, Frame};
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{
    expect, Harness, HarnessError, Predicate, Scenario, ScenarioFuture, Session, SessionOptions,
};

pub const INTERFACE: &str = "live-text-to-speech";

/// Enough chunks to show audio is actually streaming.
pub const MIN_AUDIO_CHUNKS: usize = 5;

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(INTERFACE, "streams audio for spoken text", streams_audio::<S>),
        Scenario::new(INTERFACE, "reports synthesis metadata", reports_metadata::<S>),
        Scenario::new(INTERFACE, "rejects Speak without text", rejects_missing_text::<S>),
        Scenario::new(INTERFACE, "rejects an unknown model", rejects_unknown_model::<S>),
    ]
}

async fn open<S: TelemetrySink>(
    h: &Harness<S>,
    options: SessionOptions,
) -> Result<Session, HarnessError> {
    h.open_session(&h.config().endpoints().live_text_to_speech, options).await
}

async fn speak(session: &Session, text: &str) -> Result<(), HarnessError> {
    session.send_text(&ClientMessage::speak(text)).await?;
    session.send_text(&ClientMessage::Flush).await?;
    Ok(())
}

async fn audio_chunks<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    speak(session, "Hello, world!").await?;
    let opts = h.wait_options();
    h.wait_for_count(session.log(), &Predicate::binary(), MIN_AUDIO_CHUNKS, opts).await?;
    Ok(())
}

pub fn streams_audio<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h, h.session_options().query("model", "aura-2-thalia-en")).await?;
        stream::closing(&session, audio_chunks(h, &session)).await
    }
    .boxed_local()
}

async fn metadata<S: TelemetrySink>(h: &Harness<S>, session: &Session) -> Result<(), HarnessError> {
    speak(session, "Test metadata").await?;
    let metadata = Predicate::message_type("Metadata");
    let frame = h.wait_for_one(session.log(), &metadata, h.wait_options()).await?;
    let body = json_frame(&frame, "Metadata")?;
    for field in ["/request_id", "/model_name", "/model_version", "/model_uuid"] {
        expect::non_empty_str(body, field)?;
    }
    Ok(())
}

pub fn reports_metadata<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h, h.session_options()).await?;
        stream::closing(&session, metadata(h, &session)).await
    }
    .boxed_local()
}

/// `Error` frame with a populated `error.code`; returns the frame body.
async fn expect_error<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<serde_json::Value, HarnessError> {
    let error = Predicate::message_type("Error");
    let frame = h.wait_for_one(session.log(), &error, h.wait_options()).await?;
    let body = json_frame(&frame, "Error")?;
    expect::non_empty_str(body, "/error/code")?;
    Ok(body.clone())
}

fn json_frame<'a>(frame: &'a Frame, context: &str) -> Result<&'a serde_json::Value, HarnessError> {
    frame.json().ok_or_else(|| HarnessError::assertion(context, "JSON frame", frame.kind()))
}

async fn missing_text<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    session.send_raw_text(json!({"type": "Speak"}).to_string()).await?;
    let body = expect_error(h, session).await?;
    expect::non_empty_str(&body, "/error/message")?;
    Ok(())
}

pub fn rejects_missing_text<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h, h.session_options()).await?;
        stream::closing(&session, missing_text(h, &session)).await
    }
    .boxed_local()
}

async fn unknown_model<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    speak(session, "Testing invalid model").await?;
    expect_error(h, session).await?;
    Ok(())
}

pub fn rejects_unknown_model<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h, h.session_options().query("model", "invalid-model")).await?;
        stream::closing(&session, unknown_model(h, &session)).await
    }
    .boxed_local()
}
