//! Starter metadata document.

use futures::future::FutureExt;
use serde_json::Value;
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{
    expect, Harness, HarnessError, RequestSpec, ResponseRecord, Scenario, ScenarioFuture,
};

pub const INTERFACE: &str = "metadata";

/// Use cases a starter may declare.
pub const USE_CASES: &[&str] = &[
    "Live STT",
    "Prerecorded STT",
    "Live TTS",
    "Prerecorded TTS",
    "Text Intelligence",
    "Voice Agent",
];

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(INTERFACE, "serves starter metadata", serves_metadata::<S>),
        Scenario::new(INTERFACE, "declares a known use case", declares_use_case::<S>),
    ]
}

async fn fetch<S: TelemetrySink>(h: &Harness<S>) -> Result<ResponseRecord, HarnessError> {
    let response = h.send(&RequestSpec::get(h.config().endpoints().metadata.clone())).await?;
    expect::status(&response, 200)?;
    expect::header_matches(&response, "content-type", "application/json")?;
    Ok(response)
}

pub fn serves_metadata<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let response = fetch(h).await?;
        let body = expect::json_body(&response)?;
        h.validate("metadata", body).await?;
        for field in ["/title", "/description", "/author", "/language", "/framework", "/sdk"] {
            expect::non_empty_str(body, field)?;
        }
        Ok(())
    }
    .boxed_local()
}

pub fn declares_use_case<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let response = fetch(h).await?;
        let use_case = expect::json_body(&response)?.get("useCase").and_then(Value::as_str);
        match use_case {
            Some(u) if USE_CASES.contains(&u) => Ok(()),
            other => {
                let actual = other.unwrap_or("absent");
                Err(HarnessError::assertion("useCase", USE_CASES.join(" | "), actual))
            }
        }
    }
    .boxed_local()
}
