//! Error types for the conformance harness
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::config::ConfigError;
use crate::schema::Violation;

/// Cap the number of observed message types stored inside a wait timeout.
pub const MAX_OBSERVED_TYPES: usize = 64;

/// Unified error type for every harness operation.
///
/// Low-level drivers never swallow errors; they surface one of these variants and
/// the scenario layer decides pass/fail.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HarnessError {
    /// A schema document could not be compiled or looked up.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A payload failed schema validation.
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    /// Network-level failure (connect, DNS, socket, handshake, timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A wait predicate was never satisfied in time.
    #[error(transparent)]
    WaitTimeout(#[from] WaitTimeoutError),
    /// A named fixture does not exist.
    #[error("fixture `{name}` not found at {path}")]
    FixtureNotFound { name: String, path: String },
    /// A fixture exists but could not be decoded.
    #[error("fixture `{name}` could not be parsed: {reason}")]
    FixtureParse { name: String, reason: String },
    /// A semantic expectation did not hold.
    #[error("{context}: expected {expected}, got {actual}")]
    Assertion { context: String, expected: String, actual: String },
    /// Invalid harness configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HarnessError {
    /// Build an assertion failure from anything printable.
    pub fn assertion(
        context: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        Self::Assertion {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
    /// Check if this error is a wait timeout.
    pub fn is_wait_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout(_))
    }
    /// Check if this error came from the network layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
    /// Check if this error is a schema validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
    /// Check if this error is an assertion failure.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::Assertion { .. })
    }
    /// Errors that abort the whole run rather than a single scenario.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Schema(_) | Self::Config(_))
    }
    /// Borrow the violations if this is a validation failure.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Self::Validation(v) => Some(&v.violations),
            _ => None,
        }
    }
    /// Borrow the wait timeout details if present.
    pub fn as_wait_timeout(&self) -> Option<&WaitTimeoutError> {
        match self {
            Self::WaitTimeout(w) => Some(w),
            _ => None,
        }
    }
}

/// Malformed or unknown schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The schema document is not valid JSON.
    #[error("schema `{name}` is not valid JSON: {reason}")]
    Parse { name: String, reason: String },
    /// The schema document is JSON but not a valid JSON Schema.
    #[error("schema `{name}` failed to compile: {reason}")]
    Compile { name: String, reason: String },
    /// No schema registered under this name.
    #[error("no schema registered as `{0}`")]
    Unknown(String),
}

/// A payload that failed validation, with every violated constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub schema: String,
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.violations.len();
        write!(f, "payload violates schema `{}` ({count} violations)", self.schema)?;
        for v in &self.violations {
            write!(f, "; {}", v)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

/// Network-level failures. HTTP error statuses are never reported here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, TLS failure.
    #[error("connect to {target} failed: {reason}")]
    Connect { target: String, reason: String },
    /// The operation did not complete within its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
    /// The streaming handshake was rejected.
    #[error("handshake with {target} rejected: {reason}")]
    Handshake { target: String, reason: String },
    /// Socket-level break after the connection was established.
    #[error("i/o error: {0}")]
    Io(String),
    /// The request could not be built (bad header, bad URL, bad mime type).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The session was already closed.
    #[error("session closed")]
    Closed,
}

impl TransportError {
    /// Check if this is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A predicate that never held before its deadline.
///
/// Carries what the log contained so a failure is diagnosable without re-running.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitTimeoutError {
    /// Human-readable description of the awaited condition.
    pub predicate: String,
    pub timeout: Duration,
    pub elapsed: Duration,
    /// Distinct message types in first-seen order (capped at [`MAX_OBSERVED_TYPES`]).
    pub observed_types: Vec<String>,
    /// Count of each message type seen.
    pub type_counts: BTreeMap<String, usize>,
    /// How many frames matched when the wait gave up.
    pub matched: usize,
    /// Out-of-band transport errors recorded on the log.
    pub transport_errors: Vec<String>,
}

impl fmt::Display for WaitTimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timed out after {:?} (limit: {:?}) waiting for {}; matched {}; received: [",
            self.elapsed, self.timeout, self.predicate, self.matched
        )?;
        for (i, kind) in self.observed_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match self.type_counts.get(kind) {
                Some(count) => write!(f, "{kind} x{count}")?,
                None => f.write_str(kind)?,
            }
        }
        f.write_str("]")?;
        if !self.transport_errors.is_empty() {
            write!(f, "; transport errors: {}", self.transport_errors.join(" | "))?;
        }
        Ok(())
    }
}

impl std::error::Error for WaitTimeoutError {}
