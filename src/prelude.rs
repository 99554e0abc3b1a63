//! Convenient re-exports for writing scenarios.
pub use crate::{
    auth::AuthContext,
    config::HarnessConfig,
    error::{HarnessError, TransportError},
    expect,
    fixtures::{self, FixtureProvider},
    harness::{Harness, Scenario, ScenarioFuture},
    report::{Outcome, SuiteReport},
    rest::{FormField, RequestSpec, ResponseRecord},
    schema::SchemaRegistry,
    stream::{ClientMessage, Frame, MessageLog, Session, SessionOptions, StreamMessage},
    wait::{Predicate, WaitEngine, WaitOptions},
};
