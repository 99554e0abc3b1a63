#![forbid(unsafe_code)]

//! # wirecheck
//!
//! Conformance harness for services that share a wire contract: JSON Schema
//! validation, REST and WebSocket drivers, and a polling wait engine with fuzzy
//! text matching.
//!
//! ## Features
//!
//! - **Schema validation** with ordered, structured violations
//! - **Fixtures** from disk, memory or deterministic synthetic audio
//! - **REST driver** over `reqwest`, one call per send, no retries
//! - **Streaming sessions** over `tokio-tungstenite` with an append-only message log
//! - **Waits** that poll the log under explicit timeouts and explain what they saw
//! - **Telemetry** as `tower::Service<HarnessEvent>` sinks
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use serde_json::json;
//! use wirecheck::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let schemas = SchemaRegistry::builtin().unwrap();
//! let body = json!({"error": {"type": "ValidationError", "code": "BAD_AUDIO", "message": "x"}});
//! let report = schemas.validate("error", &body).unwrap();
//! assert!(report.valid);
//!
//! let log = MessageLog::new();
//! log.push(Frame::Json(json!({"type": "Welcome", "request_id": "r-1"})));
//! let opts = WaitOptions::new(Duration::from_secs(1));
//! let welcome = WaitEngine::default()
//!     .wait_for_one(&log, &Predicate::message_type("Welcome"), opts)
//!     .await
//!     .unwrap();
//! assert_eq!(welcome.message_type(), Some("Welcome"));
//! # }
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod expect;
pub mod fixtures;
pub mod fuzzy;
pub mod harness;
pub mod prelude;
pub mod report;
pub mod rest;
pub mod schema;
pub mod sleeper;
pub mod stream;
pub mod telemetry;
pub mod wait;

// Re-exports
pub use auth::AuthContext;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, Endpoints, HarnessConfig, HarnessConfigBuilder};
pub use error::{HarnessError, SchemaError, TransportError, ValidationFailure, WaitTimeoutError};
pub use fixtures::FixtureProvider;
pub use harness::{Harness, Scenario, ScenarioFn, ScenarioFuture};
pub use report::{FailureDiagnostic, Outcome, ScenarioReport, SuiteReport};
pub use rest::{FormField, RequestBody, RequestSpec, ResponseBody, ResponseRecord, RestDriver};
pub use schema::{SchemaRegistry, SchemaValidator, ValidationReport, Violation};
pub use sleeper::{ClockAdvancingSleeper, Sleeper, TokioSleeper};
pub use stream::{
    ClientMessage, Frame, MessageLog, Session, SessionOptions, SessionState, StreamMessage,
};
pub use wait::{Predicate, WaitEngine, WaitOptions};
