//! The scenario-facing entry point.
//!
//! A [`Harness`] bundles configuration, drivers, fixtures, schemas, credentials and a
//! wait engine. Every driver call made through it emits a [`HarnessEvent`] to its
//! telemetry sink. Scenarios receive `&Harness` and return a boxed local future.
//!
//! ```rust,no_run
//! use futures::FutureExt;
//! use wirecheck::prelude::*;
//!
//! fn metadata(h: &Harness) -> ScenarioFuture<'_> {
//!     async move {
//!         let response = h.send(&RequestSpec::get("/api/metadata")).await?;
//!         expect::status(&response, 200)?;
//!         h.validate("metadata", expect::json_body(&response)?).await
//!     }
//!     .boxed_local()
//! }
//!
//! # async fn demo() -> Result<(), HarnessError> {
//! let harness = Harness::new(HarnessConfig::from_env()?)?;
//! let report = harness.run_suite(&[Scenario::new("metadata", "validates", metadata)]).await;
//! std::process::exit(report.exit_code());
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::LocalBoxFuture;
use serde_json::Value;
use tower::Service;

use crate::auth::AuthContext;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, WaitTimeoutError};
use crate::fixtures::FixtureProvider;
use crate::report::{FailureDiagnostic, Outcome, ScenarioReport, SuiteReport};
use crate::rest::{RequestSpec, ResponseRecord, RestDriver};
use crate::schema::SchemaRegistry;
use crate::stream::{Frame, MessageLog, Session, SessionOptions};
use crate::telemetry::{
    emit_best_effort, HarnessEvent, LogSink, RestEvent, ScenarioEvent, SchemaEvent, StreamEvent,
    WaitEvent,
};
use crate::wait::{Predicate, WaitEngine, WaitOptions};

/// Body of a scenario.
pub type ScenarioFuture<'a> = LocalBoxFuture<'a, Result<(), HarnessError>>;

pub type ScenarioFn<S> = for<'a> fn(&'a Harness<S>) -> ScenarioFuture<'a>;

/// A named conformance check against one starter interface.
pub struct Scenario<S = LogSink> {
    pub interface: &'static str,
    pub name: &'static str,
    pub run: ScenarioFn<S>,
    /// Skip unless session auth is enabled in the configuration.
    pub requires_session_auth: bool,
}

impl<S> Scenario<S> {
    pub fn new(interface: &'static str, name: &'static str, run: ScenarioFn<S>) -> Self {
        Self { interface, name, run, requires_session_auth: false }
    }

    pub fn requires_session_auth(mut self) -> Self {
        self.requires_session_auth = true;
        self
    }
}

impl<S> Clone for Scenario<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Scenario<S> {}

impl<S> fmt::Debug for Scenario<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("interface", &self.interface)
            .field("name", &self.name)
            .field("requires_session_auth", &self.requires_session_auth)
            .finish()
    }
}

/// Shared state for one conformance run.
#[derive(Debug, Clone)]
pub struct Harness<S = LogSink> {
    config: HarnessConfig,
    rest: RestDriver,
    fixtures: FixtureProvider,
    schemas: Arc<SchemaRegistry>,
    auth: AuthContext,
    waits: WaitEngine,
    sink: S,
}

impl Harness<LogSink> {
    /// Harness with bundled schemas, synthetic fixture fallbacks and a logging sink.
    pub fn new(config: HarnessConfig) -> Result<Self, HarnessError> {
        let rest = RestDriver::from_config(&config)?;
        let fixtures = FixtureProvider::with_synthetic_fallbacks(config.fixtures_dir());
        let schemas = Arc::new(SchemaRegistry::builtin()?);
        let auth = AuthContext::from_config(&config);
        let waits = WaitEngine::default();
        Ok(Self { config, rest, fixtures, schemas, auth, waits, sink: LogSink })
    }
}

impl<S> Harness<S> {
    /// Replace the telemetry sink.
    pub fn with_sink<T>(self, sink: T) -> Harness<T> {
        Harness {
            config: self.config,
            rest: self.rest,
            fixtures: self.fixtures,
            schemas: self.schemas,
            auth: self.auth,
            waits: self.waits,
            sink,
        }
    }

    pub fn with_wait_engine(mut self, waits: WaitEngine) -> Self {
        self.waits = waits;
        self
    }

    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_fixtures(mut self, fixtures: FixtureProvider) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn with_schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = Arc::new(schemas);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn rest(&self) -> &RestDriver {
        &self.rest
    }

    pub fn fixtures(&self) -> &FixtureProvider {
        &self.fixtures
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Wait options from configuration.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::new(self.config.wait_timeout()).poll_interval(self.config.poll_interval())
    }

    /// Configured poll interval with a scenario-specific deadline.
    pub fn wait_within(&self, timeout: Duration) -> WaitOptions {
        WaitOptions { timeout, poll_interval: self.config.poll_interval() }
    }

    /// Handshake options from configuration.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::from_config(&self.config)
    }
}

impl<S> Harness<S>
where
    S: Service<HarnessEvent, Response = ()> + Clone + Send + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    async fn emit(&self, event: HarnessEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }

    /// Send a request as-is.
    pub async fn send(&self, spec: &RequestSpec) -> Result<ResponseRecord, HarnessError> {
        let method = spec.method().to_string();
        let path = spec.path().to_string();
        match self.rest.send(spec).await {
            Ok(response) => {
                self.emit(HarnessEvent::Rest(RestEvent::Completed {
                    method,
                    path,
                    status: response.status,
                    elapsed: response.elapsed,
                }))
                .await;
                Ok(response)
            }
            Err(err) => {
                let error = err.to_string();
                self.emit(HarnessEvent::Rest(RestEvent::Failed { method, path, error })).await;
                Err(err.into())
            }
        }
    }

    /// Send with the run's bearer token attached, when there is one.
    pub async fn send_authenticated(
        &self,
        spec: RequestSpec,
    ) -> Result<ResponseRecord, HarnessError> {
        let spec = match self.auth.bearer_header(&self.rest, &self.schemas).await? {
            Some(bearer) => spec.header("Authorization", bearer),
            None => spec,
        };
        self.send(&spec).await
    }

    /// Open a session on `path` relative to the streaming base URL.
    ///
    /// Auth subprotocols are offered ahead of any already in `options`.
    pub async fn open_session(
        &self,
        path: &str,
        options: SessionOptions,
    ) -> Result<Session, HarnessError> {
        let protocols = self.auth.ws_protocols(&self.rest, &self.schemas).await?;
        let options = options.prepend_protocols(protocols);
        let url = self.config.ws_url(path);
        match Session::open(&url, options).await {
            Ok(session) => {
                let url = session.url().to_string();
                self.emit(HarnessEvent::Stream(StreamEvent::Opened { url })).await;
                Ok(session)
            }
            Err(err) => {
                let error = err.to_string();
                self.emit(HarnessEvent::Stream(StreamEvent::OpenFailed { url, error })).await;
                Err(err.into())
            }
        }
    }

    /// Validate `payload` against a registered schema.
    pub async fn validate(&self, schema: &str, payload: &Value) -> Result<(), HarnessError> {
        let report = self.schemas.validate(schema, payload)?;
        self.emit(HarnessEvent::Schema(SchemaEvent::Validated {
            schema: schema.to_string(),
            violations: report.violations.len(),
        }))
        .await;
        report.into_result()
    }

    async fn record_wait<T>(
        &self,
        description: String,
        started: u64,
        result: &Result<T, WaitTimeoutError>,
    ) {
        let event = match result {
            Ok(_) => WaitEvent::Satisfied {
                predicate: description,
                elapsed: Duration::from_millis(
                    self.waits.clock().now_millis().saturating_sub(started),
                ),
            },
            Err(err) => WaitEvent::TimedOut {
                predicate: err.predicate.clone(),
                elapsed: err.elapsed,
                matched: err.matched,
                observed: err.observed_types.clone(),
            },
        };
        self.emit(HarnessEvent::Wait(event)).await;
    }

    pub async fn wait_for_one(
        &self,
        log: &MessageLog,
        predicate: &Predicate,
        opts: WaitOptions,
    ) -> Result<Frame, HarnessError> {
        let started = self.waits.clock().now_millis();
        let result = self.waits.wait_for_one(log, predicate, opts).await;
        self.record_wait(predicate.to_string(), started, &result).await;
        Ok(result?)
    }

    pub async fn wait_for_all(
        &self,
        log: &MessageLog,
        predicates: &[Predicate],
        opts: WaitOptions,
    ) -> Result<Vec<Frame>, HarnessError> {
        let started = self.waits.clock().now_millis();
        let result = self.waits.wait_for_all(log, predicates, opts).await;
        self.record_wait(format!("all of {} predicates", predicates.len()), started, &result).await;
        Ok(result?)
    }

    pub async fn wait_for_count(
        &self,
        log: &MessageLog,
        predicate: &Predicate,
        n: usize,
        opts: WaitOptions,
    ) -> Result<Vec<Frame>, HarnessError> {
        let started = self.waits.clock().now_millis();
        let result = self.waits.wait_for_count(log, predicate, n, opts).await;
        self.record_wait(format!("at least {n} x {predicate}"), started, &result).await;
        Ok(result?)
    }

    pub async fn wait_for_sequence(
        &self,
        log: &MessageLog,
        steps: &[Predicate],
        opts: WaitOptions,
    ) -> Result<Vec<Frame>, HarnessError> {
        let started = self.waits.clock().now_millis();
        let result = self.waits.wait_for_sequence(log, steps, opts).await;
        self.record_wait(format!("sequence of {} steps", steps.len()), started, &result).await;
        Ok(result?)
    }

    /// Run one scenario and report its outcome.
    pub async fn run_scenario(&self, scenario: &Scenario<S>) -> ScenarioReport {
        let interface = scenario.interface.to_string();
        let name = scenario.name.to_string();

        if scenario.requires_session_auth && !self.config.session_auth() {
            tracing::info!(
                interface = %interface,
                scenario = %name,
                "skipped: session auth disabled"
            );
            return self.skip(scenario, "SESSION_AUTH is not enabled".to_string()).await;
        }

        self.emit(HarnessEvent::Scenario(ScenarioEvent::Started {
            interface: interface.clone(),
            name: name.clone(),
        }))
        .await;
        let start = Instant::now();
        let result = (scenario.run)(self).await;
        let duration = start.elapsed();

        let (outcome, failure) = match &result {
            Ok(()) => (Outcome::Passed, None),
            Err(err) => {
                tracing::error!(
                    interface = %interface,
                    scenario = %name,
                    error = %err,
                    "scenario failed"
                );
                (Outcome::Failed, Some(FailureDiagnostic::from(err)))
            }
        };
        self.emit(HarnessEvent::Scenario(ScenarioEvent::Finished {
            interface: interface.clone(),
            name: name.clone(),
            outcome,
            duration,
        }))
        .await;

        ScenarioReport {
            interface,
            name,
            outcome,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            failure,
            reason: None,
        }
    }

    async fn skip(&self, scenario: &Scenario<S>, reason: String) -> ScenarioReport {
        self.emit(HarnessEvent::Scenario(ScenarioEvent::Finished {
            interface: scenario.interface.to_string(),
            name: scenario.name.to_string(),
            outcome: Outcome::Skipped,
            duration: Duration::ZERO,
        }))
        .await;
        ScenarioReport {
            interface: scenario.interface.to_string(),
            name: scenario.name.to_string(),
            outcome: Outcome::Skipped,
            duration_ms: 0,
            failure: None,
            reason: Some(reason),
        }
    }

    /// Run scenarios one after another.
    ///
    /// A fatal failure (broken schema registry, bad config) skips every scenario after it.
    pub async fn run_suite(&self, scenarios: &[Scenario<S>]) -> SuiteReport {
        let mut suite = SuiteReport::default();
        let mut aborted: Option<String> = None;
        for scenario in scenarios {
            if let Some(reason) = &aborted {
                suite.push(self.skip(scenario, reason.clone()).await);
                continue;
            }
            let report = self.run_scenario(scenario).await;
            if report.failure.as_ref().is_some_and(FailureDiagnostic::is_fatal) {
                tracing::error!(
                    interface = %report.interface,
                    scenario = %report.name,
                    "fatal failure, skipping remaining scenarios"
                );
                aborted = Some(format!("run aborted after {}/{}", report.interface, report.name));
            }
            suite.push(report);
        }
        tracing::info!(
            passed = suite.passed,
            failed = suite.failed,
            skipped = suite.skipped,
            "suite finished"
        );
        suite
    }
}
