use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tower::{Service, ServiceExt};

use super::events::{HarnessEvent, RestEvent, ScenarioEvent, SchemaEvent, StreamEvent, WaitEvent};
use crate::report::Outcome;

/// Boxed future returned by every sink in this crate.
pub type SinkFuture<E> = Pin<Box<dyn std::future::Future<Output = Result<(), E>> + Send>>;

/// A telemetry sink that consumes harness events.
///
/// Bounding on this trait gives everything [`Harness`](crate::Harness) needs from a sink.
pub trait TelemetrySink:
    tower::Service<
        HarnessEvent,
        Response = (),
        Error = Self::SinkError,
        Future = SinkFuture<Self::SinkError>,
    > + Clone
    + Send
    + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Best-effort emit helper that honors `poll_ready` and swallows errors.
pub async fn emit_best_effort<S>(sink: S, event: HarnessEvent)
where
    S: tower::Service<HarnessEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    if let Ok(mut ready_sink) = sink.ready_oneshot().await {
        let _ = ready_sink.call(event).await;
    }
}

/// Discards every event.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl Service<HarnessEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Infallible>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: HarnessEvent) -> Self::Future {
        Box::pin(std::future::ready(Ok(())))
    }
}

impl TelemetrySink for NullSink {
    type SinkError = Infallible;
}

/// Something went wrong on the starter's side of the wire.
fn is_problem(event: &HarnessEvent) -> bool {
    match event {
        HarnessEvent::Rest(RestEvent::Failed { .. })
        | HarnessEvent::Stream(StreamEvent::OpenFailed { .. })
        | HarnessEvent::Wait(WaitEvent::TimedOut { .. }) => true,
        HarnessEvent::Schema(SchemaEvent::Validated { violations, .. }) => *violations > 0,
        HarnessEvent::Scenario(ScenarioEvent::Finished { outcome, .. }) => {
            *outcome == Outcome::Failed
        }
        _ => false,
    }
}

/// Writes events through `tracing`: problems at `warn`, everything else at `debug`.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl Service<HarnessEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Infallible>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: HarnessEvent) -> Self::Future {
        if is_problem(&event) {
            tracing::warn!(target: "wirecheck::events", %event);
        } else {
            tracing::debug!(target: "wirecheck::events", %event);
        }
        Box::pin(std::future::ready(Ok(())))
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

const MEMORY_SINK_CAPACITY: usize = 10_000;

/// Keeps the most recent events for assertions. Clones share one buffer.
#[derive(Clone, Debug)]
pub struct MemorySink {
    buffer: Arc<Mutex<VecDeque<HarnessEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_capacity(MEMORY_SINK_CAPACITY)
    }

    /// A zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
            evicted: Arc::default(),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<HarnessEvent>> {
        match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot, oldest first.
    pub fn events(&self) -> Vec<HarnessEvent> {
        self.buffer().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.buffer().clear();
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events dropped to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<HarnessEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Infallible>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: HarnessEvent) -> Self::Future {
        let mut buffer = self.buffer();
        while buffer.len() >= self.capacity {
            buffer.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        buffer.push_back(event);
        Box::pin(std::future::ready(Ok(())))
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}

/// A [`MulticastSink`] branch failed.
#[derive(Debug, thiserror::Error)]
#[error("telemetry sink error: {0}")]
pub struct ComposedSinkError(#[source] Box<dyn std::error::Error + Send + Sync>);

/// Fans every event out to two sinks concurrently.
///
/// Both branches always receive the event; the first failure is reported.
#[derive(Clone, Debug)]
pub struct MulticastSink<A, B> {
    primary: A,
    secondary: B,
}

impl<A, B> MulticastSink<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<A, B> Service<HarnessEvent> for MulticastSink<A, B>
where
    A: TelemetrySink,
    A::SinkError: Sync,
    B: TelemetrySink,
    B::SinkError: Sync,
{
    type Response = ();
    type Error = ComposedSinkError;
    type Future = SinkFuture<ComposedSinkError>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: HarnessEvent) -> Self::Future {
        let first = self.primary.clone().oneshot(event.clone());
        let second = self.secondary.clone().oneshot(event);
        Box::pin(async move {
            let (first, second) = tokio::join!(first, second);
            first.map_err(|e| ComposedSinkError(Box::new(e)))?;
            second.map_err(|e| ComposedSinkError(Box::new(e)))
        })
    }
}

impl<A, B> TelemetrySink for MulticastSink<A, B>
where
    A: TelemetrySink,
    A::SinkError: Sync,
    B: TelemetrySink,
    B::SinkError: Sync,
{
    type SinkError = ComposedSinkError;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::events::{RestEvent, SchemaEvent, StreamEvent};
    use std::future::Future;
    use std::time::Duration;

    fn opened(url: &str) -> HarnessEvent {
        HarnessEvent::Stream(StreamEvent::Opened { url: url.into() })
    }

    #[tokio::test]
    async fn memory_sink_evicts_oldest() {
        let mut sink = MemorySink::with_capacity(2);
        assert!(sink.is_empty());

        let a = opened("ws://a");
        let b =
            HarnessEvent::Schema(SchemaEvent::Validated { schema: "error".into(), violations: 0 });
        let c = HarnessEvent::Rest(RestEvent::Completed {
            method: "GET".into(),
            path: "/api/metadata".into(),
            status: 200,
            elapsed: Duration::from_millis(3),
        });

        sink.call(a).await.unwrap();
        sink.call(b.clone()).await.unwrap();
        sink.call(c.clone()).await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.evicted(), 1);
        assert_eq!(sink.events(), vec![b, c]);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn multicast_reaches_both() {
        let left = MemorySink::new();
        let right = MemorySink::new();
        let mut sink = MulticastSink::new(left.clone(), right.clone());
        sink.call(opened("ws://x")).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 1);
    }

    #[tokio::test]
    async fn emit_best_effort_swallows_errors() {
        #[derive(Clone)]
        struct Fails;
        impl TelemetrySink for Fails {
            type SinkError = std::io::Error;
        }
        impl tower::Service<HarnessEvent> for Fails {
            type Response = ();
            type Error = std::io::Error;
            type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;
            fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }
            fn call(&mut self, _req: HarnessEvent) -> Self::Future {
                Box::pin(async { Err(std::io::Error::new(std::io::ErrorKind::Other, "fail")) })
            }
        }

        emit_best_effort(Fails, opened("ws://y")).await;
    }

    #[tokio::test]
    async fn null_and_log_sinks_accept_events() {
        NullSink.call(opened("ws://n")).await.unwrap();
        LogSink.call(opened("ws://l")).await.unwrap();
    }
}
