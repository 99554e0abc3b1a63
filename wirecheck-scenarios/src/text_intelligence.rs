//! Text intelligence: summaries (and friends) over posted text.

use futures::future::FutureExt;
use serde_json::{json, Value};
use wirecheck::fixtures::SAMPLE_TEXT;
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{expect, Harness, HarnessError, RequestSpec, Scenario, ScenarioFuture};

pub const INTERFACE: &str = "text-intelligence";

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(INTERFACE, "summarizes text", summarizes::<S>),
        Scenario::new(INTERFACE, "accepts a language parameter", accepts_language::<S>),
        Scenario::new(INTERFACE, "tolerates unknown parameters", tolerates_unknown_params::<S>),
        Scenario::new(INTERFACE, "rejects empty text", rejects_empty_text::<S>),
    ]
}

fn analyze<S>(h: &Harness<S>, body: Value) -> RequestSpec {
    RequestSpec::post(h.config().endpoints().text_intelligence.clone())
        .query("summarize", "true")
        .json(body)
}

async fn sample<S: TelemetrySink>(h: &Harness<S>) -> Result<Value, HarnessError> {
    let text = h.fixtures().load_text(SAMPLE_TEXT).await?;
    Ok(json!({ "text": text.trim() }))
}

pub fn summarizes<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let body = sample(h).await?;
        h.validate("text-intelligence-request", &body).await?;
        h.validate("text-intelligence-query", &json!({"summarize": true})).await?;

        let response = h.send_authenticated(analyze(h, body)).await?;
        expect::status(&response, 200)?;
        expect::header_matches(&response, "content-type", "application/json")?;
        let result = expect::json_body(&response)?;
        h.validate("text-intelligence-response", result).await?;
        expect::non_empty_str(result, "/results/summary/text")?;
        Ok(())
    }
    .boxed_local()
}

pub fn accepts_language<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let spec = analyze(h, sample(h).await?).query("language", "en");
        let response = h.send_authenticated(spec).await?;
        expect::status(&response, 200)?;
        let result = expect::json_body(&response)?;
        if result.pointer("/results/summary").is_none() {
            return Err(HarnessError::assertion("results.summary", "present", result));
        }
        Ok(())
    }
    .boxed_local()
}

/// Unknown parameters are either ignored or rejected, never a crash.
pub fn tolerates_unknown_params<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let spec = analyze(h, sample(h).await?).query("invalid_param", "value");
        let response = h.send_authenticated(spec).await?;
        expect::status_in(&response, &[200, 400])?;
        if response.status == 400 {
            h.validate("error", expect::json_body(&response)?).await?;
        }
        Ok(())
    }
    .boxed_local()
}

pub fn rejects_empty_text<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let response = h.send_authenticated(analyze(h, json!({"text": ""}))).await?;
        expect::status_at_least(&response, 400)?;
        h.validate("error", expect::json_body(&response)?).await
    }
    .boxed_local()
}
