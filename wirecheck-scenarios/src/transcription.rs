//! Pre-recorded transcription through multipart uploads.

use futures::future::FutureExt;
use wirecheck::fixtures::AUDIO_WAV;
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{expect, FormField, Harness, RequestSpec, Scenario, ScenarioFuture};

pub const INTERFACE: &str = "transcription";

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(INTERFACE, "transcribes an uploaded file", transcribes_upload::<S>),
        Scenario::new(INTERFACE, "rejects a form without audio", rejects_missing_audio::<S>),
        Scenario::new(INTERFACE, "rejects an invalid audio url", rejects_invalid_url::<S>),
    ]
}

fn upload<S>(h: &Harness<S>, fields: Vec<FormField>) -> RequestSpec {
    RequestSpec::post(h.config().endpoints().transcription.clone()).multipart(fields)
}

pub fn transcribes_upload<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let audio = h.fixtures().load_binary(AUDIO_WAV).await?;
        let fields = vec![
            FormField::file("file", "test.wav", "audio/wav", audio),
            FormField::text("model", "nova-3"),
        ];
        let response = h.send_authenticated(upload(h, fields)).await?;
        expect::status(&response, 200)?;
        expect::non_empty_str(expect::json_body(&response)?, "/transcript")?;
        Ok(())
    }
    .boxed_local()
}

pub fn rejects_missing_audio<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let spec = upload(h, vec![FormField::text("model", "nova-3")]);
        let response = h.send_authenticated(spec).await?;
        expect::status_at_least(&response, 400)?;
        h.validate("error", expect::json_body(&response)?).await
    }
    .boxed_local()
}

pub fn rejects_invalid_url<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let spec = upload(h, vec![FormField::text("url", "not-a-valid-url")]);
        let response = h.send_authenticated(spec).await?;
        expect::status_at_least(&response, 400)?;
        h.validate("error", expect::json_body(&response)?).await
    }
    .boxed_local()
}
