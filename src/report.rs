//! Machine-readable scenario results.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{HarnessError, TransportError};
use crate::schema::Violation;

/// Result of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a scenario failed, in a form CI tooling can consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureDiagnostic {
    SchemaViolations { schema: String, violations: Vec<Violation> },
    WaitTimeout {
        predicate: String,
        timeout_ms: u64,
        elapsed_ms: u64,
        observed_types: Vec<String>,
        type_counts: BTreeMap<String, usize>,
        matched: usize,
        transport_errors: Vec<String>,
    },
    Transport { timeout: bool, message: String },
    Assertion { context: String, expected: String, actual: String },
    Fixture { name: String, message: String },
    Schema { message: String },
    Config { message: String },
}

impl FailureDiagnostic {
    /// Mirrors [`HarnessError::is_fatal`].
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Schema { .. } | Self::Config { .. })
    }
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl From<&HarnessError> for FailureDiagnostic {
    fn from(err: &HarnessError) -> Self {
        match err {
            HarnessError::Validation(v) => Self::SchemaViolations {
                schema: v.schema.clone(),
                violations: v.violations.clone(),
            },
            HarnessError::WaitTimeout(w) => Self::WaitTimeout {
                predicate: w.predicate.clone(),
                timeout_ms: millis(w.timeout),
                elapsed_ms: millis(w.elapsed),
                observed_types: w.observed_types.clone(),
                type_counts: w.type_counts.clone(),
                matched: w.matched,
                transport_errors: w.transport_errors.clone(),
            },
            HarnessError::Transport(t) => {
                Self::Transport { timeout: TransportError::is_timeout(t), message: t.to_string() }
            }
            HarnessError::Assertion { context, expected, actual } => Self::Assertion {
                context: context.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            HarnessError::FixtureNotFound { name, .. }
            | HarnessError::FixtureParse { name, .. } => {
                Self::Fixture { name: name.clone(), message: err.to_string() }
            }
            HarnessError::Schema(e) => Self::Schema { message: e.to_string() },
            HarnessError::Config(e) => Self::Config { message: e.to_string() },
        }
    }
}

/// One scenario's report entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub interface: String,
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDiagnostic>,
    /// Why the scenario was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Whole-run report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuiteReport {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn push(&mut self, report: ScenarioReport) {
        match report.outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
        }
        self.scenarios.push(report);
    }

    pub fn total(&self) -> usize {
        self.scenarios.len()
    }

    /// `0` when nothing failed, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 {
            0
        } else {
            1
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.scenarios.iter().filter(|s| s.outcome == Outcome::Failed)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scenarios: {} passed, {} failed, {} skipped",
            self.total(),
            self.passed,
            self.failed,
            self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ValidationFailure, WaitTimeoutError};
    use std::time::Duration;

    fn entry(outcome: Outcome, failure: Option<FailureDiagnostic>) -> ScenarioReport {
        ScenarioReport {
            interface: "stt".into(),
            name: "accepts wav".into(),
            outcome,
            duration_ms: 5,
            failure,
            reason: None,
        }
    }

    #[test]
    fn exit_code_reflects_failures() {
        let mut suite = SuiteReport::default();
        suite.push(entry(Outcome::Passed, None));
        suite.push(entry(Outcome::Skipped, None));
        assert_eq!(suite.exit_code(), 0);
        suite.push(entry(Outcome::Failed, None));
        assert_eq!(suite.exit_code(), 1);
        assert_eq!(suite.to_string(), "3 scenarios: 1 passed, 1 failed, 1 skipped");
        assert_eq!(suite.failures().count(), 1);
    }

    #[test]
    fn validation_failure_serializes_violations() {
        let err: HarnessError = ValidationFailure {
            schema: "error".into(),
            violations: vec![Violation {
                keyword: "enum".into(),
                path: "/error/code".into(),
                message: "m".into(),
            }],
        }
        .into();
        let json = serde_json::to_value(FailureDiagnostic::from(&err)).unwrap();
        assert_eq!(json["kind"], "schema_violations");
        assert_eq!(json["violations"][0]["keyword"], "enum");
    }

    #[test]
    fn wait_timeout_serializes_observed_types() {
        let err: HarnessError = WaitTimeoutError {
            predicate: "type == \"SettingsApplied\"".into(),
            timeout: Duration::from_secs(15),
            elapsed: Duration::from_millis(15_020),
            observed_types: vec!["Welcome".into()],
            type_counts: BTreeMap::from([("Welcome".to_string(), 1)]),
            matched: 0,
            transport_errors: vec![],
        }
        .into();
        let json = serde_json::to_value(FailureDiagnostic::from(&err)).unwrap();
        assert_eq!(json["kind"], "wait_timeout");
        assert_eq!(json["observed_types"][0], "Welcome");
        assert_eq!(json["timeout_ms"], 15_000);
    }

    #[test]
    fn passed_entry_omits_failure() {
        let json = serde_json::to_value(entry(Outcome::Passed, None)).unwrap();
        assert_eq!(json["outcome"], "passed");
        assert!(json.get("failure").is_none());
    }
}
