//! Flux turn-based transcription.

use std::time::Duration;

use futures::future::FutureExt;
use serde_json::{json, Value};
use wirecheck::fixtures::AUDIO_WAV;
use wirecheck::stream::{self, ClientMessage};
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{
    Harness, HarnessError, Predicate, Scenario, ScenarioFuture, Session, SessionOptions,
};

use crate::audio;

pub const INTERFACE: &str = "flux";

/// Trailing silence long enough for the end-of-turn detector.
const END_OF_TURN_SILENCE: Duration = Duration::from_secs(2);

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(INTERFACE, "connects with audio parameters", connects::<S>),
        Scenario::new(INTERFACE, "reports turns for streamed audio", reports_turns::<S>),
        Scenario::new(INTERFACE, "ends a turn after trailing silence", ends_turn::<S>),
    ]
}

fn options<S>(h: &Harness<S>) -> SessionOptions {
    h.session_options()
        .query("model", "flux-general-en")
        .query("encoding", "linear16")
        .query("sample_rate", audio::SAMPLE_RATE)
}

async fn open<S: TelemetrySink>(h: &Harness<S>) -> Result<Session, HarnessError> {
    h.open_session(&h.config().endpoints().flux, options(h)).await
}

/// `Connected` opens the stream, and its `sequence_id` starts at zero.
async fn await_connected<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    let connected = Predicate::message_type("Connected");
    let connected = h.wait_for_one(session.log(), &connected, h.wait_options()).await?;
    match connected.json().and_then(|v| v.get("sequence_id")) {
        None => Ok(()),
        Some(id) if id.as_u64() == Some(0) => Ok(()),
        Some(other) => Err(HarnessError::assertion("Connected.sequence_id", 0, other)),
    }
}

fn turn_info() -> Predicate {
    Predicate::message_type("TurnInfo")
}

pub fn connects<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, await_connected(h, &session)).await
    }
    .boxed_local()
}

async fn silent_turn<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    await_connected(h, session).await?;
    audio::stream_pcm(session, &audio::silence(Duration::from_secs(1))).await?;

    let frame = h.wait_for_one(session.log(), &turn_info(), h.wait_options()).await?;
    let body = frame.json().cloned().unwrap_or(Value::Null);
    h.validate("flux-turn-info", &body).await
}

pub fn reports_turns<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, silent_turn(h, &session)).await
    }
    .boxed_local()
}

async fn spoken_turn<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    await_connected(h, session).await?;
    let speech = audio::pcm_of(&h.fixtures().load_binary(AUDIO_WAV).await?);
    audio::stream_pcm(session, &speech).await?;
    audio::stream_pcm(session, &audio::silence(END_OF_TURN_SILENCE)).await?;

    let end_of_turn = turn_info().and(Predicate::field_eq("/event", json!("EndOfTurn")));
    let turns = h.wait_for_count(session.log(), &end_of_turn, 1, h.wait_options()).await?;
    for turn in &turns {
        let body = turn.json().cloned().unwrap_or(Value::Null);
        h.validate("flux-turn-info", &body).await?;
    }
    session.send_text(&ClientMessage::CloseStream).await?;
    Ok(())
}

pub fn ends_turn<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, spoken_turn(h, &session)).await
    }
    .boxed_local()
}
