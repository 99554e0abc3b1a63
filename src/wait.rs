//! Polling waits over a [`MessageLog`].
//!
//! A wait checks the log immediately and returns without sleeping when the condition
//! already holds. Otherwise it sleeps `poll_interval` between checks and gives up once
//! `timeout` has elapsed, so a timeout fires no earlier than `timeout` and no later than
//! `timeout + poll_interval`. Time comes from a [`Clock`] and sleeping goes through a
//! [`Sleeper`], which lets tests drive waits without real delays.
//!
//! ```rust
//! use std::time::Duration;
//! use serde_json::json;
//! use wirecheck::stream::{Frame, MessageLog};
//! use wirecheck::wait::{Predicate, WaitEngine, WaitOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let log = MessageLog::new();
//! log.push(Frame::Json(json!({"type": "Welcome", "request_id": "r-1"})));
//!
//! let engine = WaitEngine::default();
//! let opts = WaitOptions::new(Duration::from_secs(1));
//! let frame = engine.wait_for_one(&log, &Predicate::message_type("Welcome"), opts).await.unwrap();
//! assert_eq!(frame.json().unwrap()["request_id"], "r-1");
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::clock::{Clock, MonotonicClock};
use crate::error::{WaitTimeoutError, MAX_OBSERVED_TYPES};
use crate::fuzzy;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::stream::{Frame, MessageLog};

/// A described, pure test over one frame.
#[derive(Clone)]
pub struct Predicate {
    description: String,
    test: Arc<dyn Fn(&Frame) -> bool + Send + Sync>,
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.description).finish()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl Predicate {
    pub fn new<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Frame) -> bool + Send + Sync + 'static,
    {
        Self { description: description.into(), test: Arc::new(test) }
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        (self.test)(frame)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// JSON frame whose `type` equals `kind`.
    pub fn message_type(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self::new(format!("type == {kind:?}"), move |f| f.message_type() == Some(kind.as_str()))
    }

    /// JSON frame whose `type` is any of `kinds`.
    pub fn any_type<I, T>(kinds: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let kinds: Vec<String> = kinds.into_iter().map(Into::into).collect();
        let description = format!("type in [{}]", kinds.join(", "));
        Self::new(description, move |f| {
            f.message_type().is_some_and(|t| kinds.iter().any(|k| k == t))
        })
    }

    /// Any binary frame.
    pub fn binary() -> Self {
        Self::new("binary frame", Frame::is_binary)
    }

    /// JSON frame where the value at `pointer` equals `expected`.
    pub fn field_eq(pointer: impl Into<String>, expected: Value) -> Self {
        let pointer = pointer.into();
        Self::new(format!("{pointer} == {expected}"), move |f| {
            f.json().and_then(|v| v.pointer(&pointer)) == Some(&expected)
        })
    }

    /// JSON frame where the string at `pointer` fuzzily matches `expected`.
    pub fn field_fuzzy(
        pointer: impl Into<String>,
        expected: impl Into<String>,
        threshold: f64,
    ) -> Self {
        let pointer = pointer.into();
        let expected = expected.into();
        Self::new(format!("{pointer} ~= {expected:?} (>= {threshold})"), move |f| {
            f.json()
                .and_then(|v| v.pointer(&pointer))
                .and_then(Value::as_str)
                .is_some_and(|actual| fuzzy::fuzzy_text_match(actual, &expected, threshold))
        })
    }

    /// Both predicates hold.
    pub fn and(self, other: Predicate) -> Self {
        let description = format!("({}) and ({})", self.description, other.description);
        Self::new(description, move |f| self.matches(f) && other.matches(f))
    }

    /// Either predicate holds.
    pub fn or(self, other: Predicate) -> Self {
        let description = format!("({}) or ({})", self.description, other.description);
        Self::new(description, move |f| self.matches(f) || other.matches(f))
    }
}

/// Deadline and poll cadence for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitOptions {
    /// `timeout` with the default 100ms poll interval.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, poll_interval: Duration::from_millis(100) }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

/// Runs waits against a clock and sleeper.
#[derive(Debug, Clone)]
pub struct WaitEngine {
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for WaitEngine {
    fn default() -> Self {
        Self::new(Arc::new(MonotonicClock::default()), Arc::new(TokioSleeper))
    }
}

impl WaitEngine {
    pub fn new(clock: Arc<dyn Clock>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { clock, sleeper }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Poll until `check` yields a value or the deadline passes.
    async fn poll<T, F>(
        &self,
        log: &MessageLog,
        description: &str,
        opts: WaitOptions,
        mut check: F,
    ) -> Result<T, WaitTimeoutError>
    where
        F: FnMut(&[Frame]) -> Result<T, usize>,
    {
        let start = self.clock.now_millis();
        let limit = u64::try_from(opts.timeout.as_millis()).unwrap_or(u64::MAX);
        loop {
            let frames = log.frames();
            let matched = match check(&frames) {
                Ok(found) => return Ok(found),
                Err(matched) => matched,
            };
            let elapsed = self.clock.now_millis().saturating_sub(start);
            if elapsed >= limit {
                let waited = Duration::from_millis(elapsed);
                let err = timeout_error(log, description, opts.timeout, waited, matched);
                tracing::warn!(
                    predicate = description,
                    elapsed_ms = elapsed,
                    matched,
                    "wait timed out"
                );
                return Err(err);
            }
            self.sleeper.sleep(opts.poll_interval).await;
        }
    }

    /// First frame satisfying `predicate`.
    pub async fn wait_for_one(
        &self,
        log: &MessageLog,
        predicate: &Predicate,
        opts: WaitOptions,
    ) -> Result<Frame, WaitTimeoutError> {
        self.poll(log, predicate.description(), opts, |frames| {
            frames.iter().find(|f| predicate.matches(f)).cloned().ok_or(0)
        })
        .await
    }

    /// Snapshot of the log once every predicate is satisfied by some frame.
    pub async fn wait_for_all(
        &self,
        log: &MessageLog,
        predicates: &[Predicate],
        opts: WaitOptions,
    ) -> Result<Vec<Frame>, WaitTimeoutError> {
        let description = format!(
            "all of [{}]",
            predicates.iter().map(Predicate::description).collect::<Vec<_>>().join("; ")
        );
        self.poll(log, &description, opts, |frames| {
            let satisfied =
                predicates.iter().filter(|p| frames.iter().any(|f| p.matches(f))).count();
            if satisfied == predicates.len() {
                Ok(frames.to_vec())
            } else {
                Err(satisfied)
            }
        })
        .await
    }

    /// At least `n` frames satisfying `predicate`; returns the matching subsequence.
    pub async fn wait_for_count(
        &self,
        log: &MessageLog,
        predicate: &Predicate,
        n: usize,
        opts: WaitOptions,
    ) -> Result<Vec<Frame>, WaitTimeoutError> {
        let description = format!("at least {n} x {}", predicate.description());
        self.poll(log, &description, opts, |frames| {
            let matching: Vec<Frame> =
                frames.iter().filter(|f| predicate.matches(f)).cloned().collect();
            if matching.len() >= n {
                Ok(matching)
            } else {
                Err(matching.len())
            }
        })
        .await
    }

    /// One frame per step, each found after the previous one in arrival order.
    pub async fn wait_for_sequence(
        &self,
        log: &MessageLog,
        steps: &[Predicate],
        opts: WaitOptions,
    ) -> Result<Vec<Frame>, WaitTimeoutError> {
        let description = format!(
            "sequence [{}]",
            steps.iter().map(Predicate::description).collect::<Vec<_>>().join(" -> ")
        );
        self.poll(log, &description, opts, |frames| {
            let mut found = Vec::with_capacity(steps.len());
            let mut rest = frames.iter();
            for step in steps {
                match rest.find(|f| step.matches(f)) {
                    Some(f) => found.push(f.clone()),
                    None => return Err(found.len()),
                }
            }
            Ok(found)
        })
        .await
    }
}

fn timeout_error(
    log: &MessageLog,
    predicate: &str,
    timeout: Duration,
    elapsed: Duration,
    matched: usize,
) -> WaitTimeoutError {
    let mut observed_types: Vec<String> = Vec::new();
    for kind in log.kinds() {
        if observed_types.len() == MAX_OBSERVED_TYPES {
            break;
        }
        if !observed_types.contains(&kind) {
            observed_types.push(kind);
        }
    }
    WaitTimeoutError {
        predicate: predicate.to_string(),
        timeout,
        elapsed,
        observed_types,
        type_counts: log.kind_counts(),
        matched,
        transport_errors: log.errors(),
    }
}
