//! Ready-made conformance scenarios for starter applications.
//!
//! Every starter implements one or more interfaces of a shared contract. Each module
//! below checks one interface; [`catalog`] collects all of them in run order and
//! [`select`] narrows the catalog to the interfaces a starter actually serves.
//!
//! **Interfaces:**
//! - REST: [`stt`], [`transcription`], [`text_to_speech`], [`text_intelligence`], [`metadata`]
//! - Auth and deployment: [`session_auth`], [`deploy`] (both need `SESSION_AUTH=true`)
//! - Streaming: [`voice_agent`], [`flux`], [`live_transcription`], [`live_text_to_speech`]
//!
//! ```rust,no_run
//! use wirecheck::{Harness, HarnessConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let harness = Harness::new(HarnessConfig::from_env()?)?;
//! let catalog = wirecheck_scenarios::catalog();
//! let scenarios = wirecheck_scenarios::select(catalog, &["stt", "metadata"])?;
//! let report = harness.run_suite(&scenarios).await;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

use wirecheck::telemetry::TelemetrySink;
use wirecheck::Scenario;

mod audio;
pub mod deploy;
pub mod flux;
pub mod live_text_to_speech;
pub mod live_transcription;
pub mod metadata;
pub mod session_auth;
pub mod stt;
pub mod text_intelligence;
pub mod text_to_speech;
pub mod transcription;
pub mod voice_agent;

/// Interface names in catalog order.
pub const INTERFACES: &[&str] = &[
    stt::INTERFACE,
    transcription::INTERFACE,
    text_to_speech::INTERFACE,
    text_intelligence::INTERFACE,
    metadata::INTERFACE,
    session_auth::INTERFACE,
    deploy::INTERFACE,
    voice_agent::INTERFACE,
    flux::INTERFACE,
    live_transcription::INTERFACE,
    live_text_to_speech::INTERFACE,
];

/// Selection named an interface the catalog does not have.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interface `{name}` (known: {})", INTERFACES.join(", "))]
pub struct UnknownInterface {
    pub name: String,
}

/// Every scenario, grouped by interface.
pub fn catalog<S: TelemetrySink>() -> Vec<Scenario<S>> {
    let mut all = Vec::new();
    all.extend(stt::scenarios());
    all.extend(transcription::scenarios());
    all.extend(text_to_speech::scenarios());
    all.extend(text_intelligence::scenarios());
    all.extend(metadata::scenarios());
    all.extend(session_auth::scenarios());
    all.extend(deploy::scenarios());
    all.extend(voice_agent::scenarios());
    all.extend(flux::scenarios());
    all.extend(live_transcription::scenarios());
    all.extend(live_text_to_speech::scenarios());
    all
}

/// Keep only scenarios for `interfaces`; an empty selection keeps everything.
pub fn select<S, I>(
    scenarios: Vec<Scenario<S>>,
    interfaces: &[I],
) -> Result<Vec<Scenario<S>>, UnknownInterface>
where
    I: AsRef<str>,
{
    if interfaces.is_empty() {
        return Ok(scenarios);
    }
    let mut names = interfaces.iter().map(AsRef::as_ref);
    if let Some(unknown) = names.find(|name| !INTERFACES.contains(name)) {
        return Err(UnknownInterface { name: unknown.to_string() });
    }
    Ok(scenarios
        .into_iter()
        .filter(|s| interfaces.iter().any(|i| i.as_ref() == s.interface))
        .collect())
}

/// Split a comma-separated interface list, ignoring blanks.
pub fn parse_interfaces(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}
