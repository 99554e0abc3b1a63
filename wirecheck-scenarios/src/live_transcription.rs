//! Live transcription of streamed audio.

use futures::future::FutureExt;
use serde_json::{json, Value};
use wirecheck::fixtures::AUDIO_WAV;
use wirecheck::stream::{self, ClientMessage, SessionState};
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{
    Harness, HarnessError, Predicate, Scenario, ScenarioFuture, Session, SessionOptions,
};

use crate::audio;

pub const INTERFACE: &str = "live-transcription";

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(INTERFACE, "accepts model and language", accepts_parameters::<S>),
        Scenario::new(INTERFACE, "finalizes streamed audio", finalizes::<S>),
    ]
}

fn options<S>(h: &Harness<S>) -> SessionOptions {
    h.session_options()
        .query("model", "nova-3")
        .query("encoding", "linear16")
        .query("sample_rate", audio::SAMPLE_RATE)
}

async fn open<S: TelemetrySink>(
    h: &Harness<S>,
    options: SessionOptions,
) -> Result<Session, HarnessError> {
    h.open_session(&h.config().endpoints().live_transcription, options).await
}

/// Final `Results` carrying an alternatives array.
pub fn final_results() -> Predicate {
    Predicate::message_type("Results")
        .and(Predicate::field_eq("/is_final", json!(true)))
        .and(Predicate::new("channel.alternatives is an array", |f| {
            f.json().and_then(|v| v.pointer("/channel/alternatives")).is_some_and(Value::is_array)
        }))
}

pub fn accepts_parameters<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h, options(h).query("language", "es")).await?;
        session.close().await?;
        match session.state() {
            SessionState::Closed => Ok(()),
            other => {
                let context = "session state after close";
                Err(HarnessError::assertion(context, SessionState::Closed, other))
            }
        }
    }
    .boxed_local()
}

async fn transcribe<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    let speech = audio::pcm_of(&h.fixtures().load_binary(AUDIO_WAV).await?);
    audio::stream_pcm(session, &speech).await?;
    // asks the upstream to flush whatever it still holds
    session.send_text(&ClientMessage::CloseStream).await?;
    h.wait_for_one(session.log(), &final_results(), h.wait_options()).await?;
    Ok(())
}

pub fn finalizes<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h, options(h)).await?;
        stream::closing(&session, transcribe(h, &session)).await
    }
    .boxed_local()
}
