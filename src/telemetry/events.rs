use std::fmt;
use std::time::Duration;

use serde_json::json;

use crate::report::Outcome;

/// Events emitted while a harness drives a starter.
///
/// Every driver call made through a [`Harness`](crate::Harness) produces one of these.
/// Sinks can log them, keep them for assertions, or forward them to CI tooling.
#[derive(Debug, Clone, PartialEq)]
pub enum HarnessEvent {
    /// REST exchanges
    Rest(RestEvent),
    /// Streaming session lifecycle
    Stream(StreamEvent),
    /// Wait outcomes
    Wait(WaitEvent),
    /// Schema validations
    Schema(SchemaEvent),
    /// Scenario lifecycle
    Scenario(ScenarioEvent),
}

/// Events emitted by the REST driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestEvent {
    /// A response was received, whatever its status.
    Completed {
        method: String,
        path: String,
        status: u16,
        elapsed: Duration,
    },
    /// No response: connect failure, timeout, broken body.
    Failed { method: String, path: String, error: String },
}

/// Events emitted by streaming sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Handshake succeeded.
    Opened { url: String },
    /// Handshake failed or timed out.
    OpenFailed { url: String, error: String },
}

/// Events emitted by the wait engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitEvent {
    /// The awaited condition held.
    Satisfied { predicate: String, elapsed: Duration },
    /// The deadline passed first.
    TimedOut {
        predicate: String,
        elapsed: Duration,
        matched: usize,
        /// Message types seen, in arrival order.
        observed: Vec<String>,
    },
}

/// Events emitted by schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaEvent {
    Validated { schema: String, violations: usize },
}

/// Scenario lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioEvent {
    Started { interface: String, name: String },
    Finished {
        interface: String,
        name: String,
        outcome: Outcome,
        duration: Duration,
    },
}

impl fmt::Display for HarnessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessEvent::Rest(event) => write!(f, "Rest::{}", event),
            HarnessEvent::Stream(event) => write!(f, "Stream::{}", event),
            HarnessEvent::Wait(event) => write!(f, "Wait::{}", event),
            HarnessEvent::Schema(event) => write!(f, "Schema::{}", event),
            HarnessEvent::Scenario(event) => write!(f, "Scenario::{}", event),
        }
    }
}

impl fmt::Display for RestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestEvent::Completed { method, path, status, elapsed } => {
                write!(f, "Completed({} {} -> {}, {:?})", method, path, status, elapsed)
            }
            RestEvent::Failed { method, path, error } => {
                write!(f, "Failed({} {}: {})", method, path, error)
            }
        }
    }
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEvent::Opened { url } => write!(f, "Opened({})", url),
            StreamEvent::OpenFailed { url, error } => write!(f, "OpenFailed({}: {})", url, error),
        }
    }
}

impl fmt::Display for WaitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitEvent::Satisfied { predicate, elapsed } => {
                write!(f, "Satisfied({}, {:?})", predicate, elapsed)
            }
            WaitEvent::TimedOut { predicate, elapsed, matched, .. } => {
                write!(f, "TimedOut({}, {:?}, matched={})", predicate, elapsed, matched)
            }
        }
    }
}

impl fmt::Display for SchemaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaEvent::Validated { schema, violations } => {
                write!(f, "Validated({}, violations={})", schema, violations)
            }
        }
    }
}

impl fmt::Display for ScenarioEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioEvent::Started { interface, name } => {
                write!(f, "Started({}/{})", interface, name)
            }
            ScenarioEvent::Finished { interface, name, outcome, duration } => {
                write!(f, "Finished({}/{}: {}, {:?})", interface, name, outcome, duration)
            }
        }
    }
}

#[inline]
fn clamp_u64(val: u128) -> u64 {
    val.min(u128::from(u64::MAX)) as u64
}

/// Convert an event into a flat JSON object with a `kind` discriminator.
pub fn event_to_json(event: &HarnessEvent) -> serde_json::Value {
    match event {
        HarnessEvent::Rest(r) => match r {
            RestEvent::Completed { method, path, status, elapsed } => json!({
                "kind": "rest_completed",
                "method": method,
                "path": path,
                "status": *status,
                "elapsed_ms": clamp_u64(elapsed.as_millis()),
            }),
            RestEvent::Failed { method, path, error } => json!({
                "kind": "rest_failed",
                "method": method,
                "path": path,
                "error": error,
            }),
        },
        HarnessEvent::Stream(s) => match s {
            StreamEvent::Opened { url } => json!({ "kind": "stream_opened", "url": url }),
            StreamEvent::OpenFailed { url, error } => {
                json!({ "kind": "stream_open_failed", "url": url, "error": error })
            }
        },
        HarnessEvent::Wait(w) => match w {
            WaitEvent::Satisfied { predicate, elapsed } => json!({
                "kind": "wait_satisfied",
                "predicate": predicate,
                "elapsed_ms": clamp_u64(elapsed.as_millis()),
            }),
            WaitEvent::TimedOut { predicate, elapsed, matched, observed } => json!({
                "kind": "wait_timed_out",
                "predicate": predicate,
                "elapsed_ms": clamp_u64(elapsed.as_millis()),
                "matched": *matched,
                "observed": observed,
            }),
        },
        HarnessEvent::Schema(SchemaEvent::Validated { schema, violations }) => json!({
            "kind": "schema_validated",
            "schema": schema,
            "valid": *violations == 0,
            "violations": *violations,
        }),
        HarnessEvent::Scenario(s) => match s {
            ScenarioEvent::Started { interface, name } => {
                json!({ "kind": "scenario_started", "interface": interface, "name": name })
            }
            ScenarioEvent::Finished { interface, name, outcome, duration } => json!({
                "kind": "scenario_finished",
                "interface": interface,
                "name": name,
                "outcome": outcome.as_str(),
                "duration_ms": clamp_u64(duration.as_millis()),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_namespaced() {
        let event = HarnessEvent::Rest(RestEvent::Completed {
            method: "POST".into(),
            path: "/stt/transcribe".into(),
            status: 415,
            elapsed: Duration::from_millis(12),
        });
        let s = event.to_string();
        assert!(s.starts_with("Rest::Completed"));
        assert!(s.contains("415"));
    }

    #[test]
    fn wait_timeout_json() {
        let v = event_to_json(&HarnessEvent::Wait(WaitEvent::TimedOut {
            predicate: "type == \"Welcome\"".into(),
            elapsed: Duration::from_millis(1500),
            matched: 0,
            observed: vec!["binary".into()],
        }));
        assert_eq!(v["kind"], "wait_timed_out");
        assert_eq!(v["elapsed_ms"], 1500);
        assert_eq!(v["observed"][0], "binary");
    }

    #[test]
    fn scenario_finished_json() {
        let v = event_to_json(&HarnessEvent::Scenario(ScenarioEvent::Finished {
            interface: "voice-agent".into(),
            name: "welcome".into(),
            outcome: Outcome::Failed,
            duration: Duration::from_millis(42),
        }));
        assert_eq!(v["kind"], "scenario_finished");
        assert_eq!(v["outcome"], "failed");
        assert_eq!(v["duration_ms"], 42);
    }

    #[test]
    fn schema_json_reports_validity() {
        let event = SchemaEvent::Validated { schema: "error".into(), violations: 2 };
        let v = event_to_json(&HarnessEvent::Schema(event));
        assert_eq!(v["valid"], false);
        assert_eq!(v["violations"], 2);
    }
}
