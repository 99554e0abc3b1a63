//! Structured harness events and the sinks that consume them.
//!
//! The [`Harness`](crate::Harness) emits a [`HarnessEvent`] for every REST exchange,
//! session handshake, wait outcome, validation and scenario boundary. Events flow
//! through [`TelemetrySink`] implementations, which are plain
//! `tower::Service<HarnessEvent>`s so they compose like any other service.
//!
//! Emission is best effort: a failing sink never fails a scenario.

pub mod events;
pub mod sinks;

pub use events::{
    event_to_json, HarnessEvent, RestEvent, ScenarioEvent, SchemaEvent, StreamEvent, WaitEvent,
};
pub use sinks::{
    emit_best_effort, ComposedSinkError, LogSink, MemorySink, MulticastSink, NullSink, SinkFuture,
    TelemetrySink,
};
