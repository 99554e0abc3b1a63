//! Voice agent conversations over a single WebSocket.
//!
//! The starter relays the upstream agent protocol: `Welcome` on connect, `Settings`
//! acknowledged by `SettingsApplied` (or answered with `Error`), then
//! `ConversationText` for each side of the dialogue.

use std::time::Duration;

use futures::future::FutureExt;
use serde_json::{json, Value};
use wirecheck::stream::{self, ClientMessage};
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{Harness, HarnessError, Predicate, Scenario, ScenarioFuture, Session};

pub const INTERFACE: &str = "voice-agent";

/// Upstream validation of a bad `Settings` can be slow.
pub const SETTINGS_ERROR_TIMEOUT: Duration = Duration::from_secs(25);
/// Covers one full think-and-speak turn of the agent.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

const GREETING: &str = "Hello, how are you?";

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(INTERFACE, "greets with Welcome", greets::<S>),
        Scenario::new(INTERFACE, "applies minimal Settings", applies_settings::<S>),
        Scenario::new(
            INTERFACE,
            "rejects Settings without audio",
            rejects_settings_without_audio::<S>,
        ),
        Scenario::new(
            INTERFACE,
            "rejects Settings without a listen provider",
            rejects_settings_without_listen::<S>,
        ),
        Scenario::new(
            INTERFACE,
            "rejects Settings without a think provider",
            rejects_settings_without_think::<S>,
        ),
        Scenario::new(
            INTERFACE,
            "rejects Settings without a speak provider",
            rejects_settings_without_speak::<S>,
        ),
        Scenario::new(INTERFACE, "answers an injected user message", answers_user_message::<S>),
        Scenario::new(INTERFACE, "speaks the reply as audio", speaks_reply::<S>),
        Scenario::new(
            INTERFACE,
            "rejects InjectUserMessage without content",
            rejects_empty_injection::<S>,
        ),
    ]
}

fn audio() -> Value {
    json!({
        "input": {"encoding": "linear16", "sample_rate": 24000},
        "output": {"encoding": "linear16", "sample_rate": 24000, "container": "none"}
    })
}

fn think() -> Value {
    json!({"provider": {"type": "open_ai", "model": "gpt-4o-mini"}})
}

fn speak() -> Value {
    json!({"provider": {"type": "deepgram", "model": "aura-2-thalia-en"}})
}

/// Smallest `Settings` the agent accepts.
pub fn minimal_settings() -> ClientMessage {
    ClientMessage::Settings {
        audio: Some(audio()),
        agent: Some(json!({"listen": listen(), "think": think(), "speak": speak()})),
    }
}

async fn open<S: TelemetrySink>(h: &Harness<S>) -> Result<Session, HarnessError> {
    h.open_session(&h.config().endpoints().voice_agent, h.session_options()).await
}

async fn await_welcome<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    let welcome =
        h.wait_for_one(session.log(), &Predicate::message_type("Welcome"), h.wait_options()).await?;
    match welcome.json() {
        Some(body) => h.validate("agent-welcome", body).await,
        None => Err(HarnessError::assertion("Welcome", "JSON frame", welcome.kind())),
    }
}

async fn configure<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    await_welcome(h, session).await?;
    session.send_text(&minimal_settings()).await?;
    let applied = Predicate::message_type("SettingsApplied");
    h.wait_for_one(session.log(), &applied, h.wait_options()).await?;
    Ok(())
}

pub fn greets<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, await_welcome(h, &session)).await
    }
    .boxed_local()
}

pub fn applies_settings<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, configure(h, &session)).await
    }
    .boxed_local()
}

fn listen() -> Value {
    json!({"provider": {"type": "deepgram", "model": "nova-3"}})
}

/// `minimal_settings` with one agent section left out.
fn settings_without(section: &str) -> ClientMessage {
    let mut agent = serde_json::Map::new();
    for (name, value) in [("listen", listen()), ("think", think()), ("speak", speak())] {
        if name != section {
            agent.insert(name.to_string(), value);
        }
    }
    ClientMessage::Settings { audio: Some(audio()), agent: Some(Value::Object(agent)) }
}

/// Wait for an `Error` frame that carries a `code`.
async fn expect_error<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    let within = h.wait_within(SETTINGS_ERROR_TIMEOUT);
    let error = h.wait_for_one(session.log(), &Predicate::message_type("Error"), within).await?;
    match error.json().and_then(|v| v.get("code")) {
        Some(code) if !code.is_null() => Ok(()),
        _ => Err(HarnessError::assertion("Error.code", "defined", error.kind())),
    }
}

async fn reject_settings<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
    invalid: ClientMessage,
) -> Result<(), HarnessError> {
    await_welcome(h, session).await?;
    session.send_text(&invalid).await?;
    expect_error(h, session).await
}

pub fn rejects_settings_without_audio<S: TelemetrySink>(
    h: &Harness<S>,
) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        let invalid = ClientMessage::Settings {
            audio: None,
            agent: Some(json!({"listen": listen(), "think": think(), "speak": speak()})),
        };
        stream::closing(&session, reject_settings(h, &session, invalid)).await
    }
    .boxed_local()
}

pub fn rejects_settings_without_listen<S: TelemetrySink>(
    h: &Harness<S>,
) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, reject_settings(h, &session, settings_without("listen"))).await
    }
    .boxed_local()
}

pub fn rejects_settings_without_think<S: TelemetrySink>(
    h: &Harness<S>,
) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, reject_settings(h, &session, settings_without("think"))).await
    }
    .boxed_local()
}

pub fn rejects_settings_without_speak<S: TelemetrySink>(
    h: &Harness<S>,
) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, reject_settings(h, &session, settings_without("speak"))).await
    }
    .boxed_local()
}

async fn converse<S: TelemetrySink>(h: &Harness<S>, session: &Session) -> Result<(), HarnessError> {
    configure(h, session).await?;
    session.send_text(&ClientMessage::inject_user_message(GREETING)).await?;

    let conversation_text = || Predicate::message_type("ConversationText");
    let user = conversation_text().and(Predicate::field_eq("/role", json!("user")));
    let assistant = conversation_text()
        .and(Predicate::field_eq("/role", json!("assistant")))
        .and(Predicate::new("content is non-empty", |f| {
            f.json()
                .and_then(|v| v.get("content"))
                .and_then(Value::as_str)
                .is_some_and(|c| !c.trim().is_empty())
        }));
    let within = h.wait_within(REPLY_TIMEOUT);
    let turns = h.wait_for_sequence(session.log(), &[user, assistant], within).await?;

    // the echoed user turn should carry what was injected
    let echoed = turns[0]
        .json()
        .and_then(|v| v.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    wirecheck::expect::fuzzy_eq(echoed, GREETING, 0.8)
}

pub fn answers_user_message<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, converse(h, &session)).await
    }
    .boxed_local()
}

async fn hear_reply<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    configure(h, session).await?;
    session.send_text(&ClientMessage::inject_user_message("Say hello")).await?;
    let within = h.wait_within(REPLY_TIMEOUT);
    let audio = [Predicate::binary(), Predicate::message_type("AgentAudioDone")];
    h.wait_for_all(session.log(), &audio, within).await?;
    Ok(())
}

pub fn speaks_reply<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, hear_reply(h, &session)).await
    }
    .boxed_local()
}

async fn inject_without_content<S: TelemetrySink>(
    h: &Harness<S>,
    session: &Session,
) -> Result<(), HarnessError> {
    configure(h, session).await?;
    session.send_raw_text(json!({"type": "InjectUserMessage"}).to_string()).await?;
    expect_error(h, session).await
}

pub fn rejects_empty_injection<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let session = open(h).await?;
        stream::closing(&session, inject_without_content(h, &session)).await
    }
    .boxed_local()
}
