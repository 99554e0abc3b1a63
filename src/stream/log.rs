//! Append-only record of inbound frames.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::Value;

use super::message::StreamMessage;

/// Type label used for binary frames in diagnostics.
pub const BINARY_KIND: &str = "binary";
/// Type label used for JSON frames without a string `type` field.
pub const UNTYPED_KIND: &str = "untyped";

/// One inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Text frame that parsed as JSON.
    Json(Value),
    /// Binary frame, or a text frame that was not valid JSON.
    Binary(Bytes),
}

impl Frame {
    /// Classify a text payload.
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(v) => Self::Json(v),
            Err(_) => Self::Binary(Bytes::copy_from_slice(text.as_bytes())),
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Binary(_) => None,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// The `type` discriminator of a JSON frame.
    pub fn message_type(&self) -> Option<&str> {
        self.json().and_then(|v| v.get("type")).and_then(Value::as_str)
    }

    /// Label used in diagnostics: the message type, `binary`, or `untyped`.
    pub fn kind(&self) -> &str {
        match self {
            Self::Binary(_) => BINARY_KIND,
            Self::Json(_) => self.message_type().unwrap_or(UNTYPED_KIND),
        }
    }

    /// Decode into the typed message union. Binary frames yield `None`.
    pub fn message(&self) -> Option<StreamMessage> {
        self.json().map(StreamMessage::from_value)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Json(v) => v.to_string().len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A frame with its arrival position.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Zero-based arrival index.
    pub seq: u64,
    /// Time since the log was created.
    pub at: Duration,
    pub frame: Frame,
}

#[derive(Debug)]
struct Inner {
    started: Instant,
    entries: Vec<LogEntry>,
    errors: Vec<String>,
}

/// Shared, append-only message log.
///
/// Entries are never reordered or removed. Clones observe the same log.
#[derive(Debug, Clone)]
pub struct MessageLog {
    inner: Arc<RwLock<Inner>>,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                started: Instant::now(),
                entries: Vec::new(),
                errors: Vec::new(),
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a frame, returning its sequence number.
    pub fn push(&self, frame: Frame) -> u64 {
        let mut inner = self.write();
        let seq = inner.entries.len() as u64;
        let at = inner.started.elapsed();
        inner.entries.push(LogEntry { seq, at, frame });
        seq
    }

    /// Record an out-of-band transport error. Buffered frames stay valid.
    pub fn record_error(&self, error: impl Into<String>) {
        self.write().errors.push(error.into());
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry in arrival order.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.read().entries.clone()
    }

    /// Copy of every frame in arrival order.
    pub fn frames(&self) -> Vec<Frame> {
        self.read().entries.iter().map(|e| e.frame.clone()).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.read().errors.clone()
    }

    /// Kind of every frame in arrival order.
    pub fn kinds(&self) -> Vec<String> {
        self.read().entries.iter().map(|e| e.frame.kind().to_string()).collect()
    }

    pub fn kind_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.read().entries.iter() {
            *counts.entry(entry.frame.kind().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// JSON frames whose `type` equals `kind`.
    pub fn of_type(&self, kind: &str) -> Vec<Value> {
        self.read()
            .entries
            .iter()
            .filter(|e| e.frame.message_type() == Some(kind))
            .filter_map(|e| e.frame.json().cloned())
            .collect()
    }

    /// Number of binary frames received.
    pub fn binary_count(&self) -> usize {
        self.read().entries.iter().filter(|e| e.frame.is_binary()).count()
    }
}
