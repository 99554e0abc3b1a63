//! JSONL sink for `wirecheck`. Writes one harness event per line.
//! Always appends; bring your own path.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use wirecheck::telemetry::{event_to_json, HarnessEvent, SinkFuture, TelemetrySink};

#[derive(Clone, Debug)]
pub struct JsonlSink {
    path: Arc<PathBuf>,
    // one writer at a time so lines never interleave
    write_lock: Arc<Mutex<()>>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Arc::new(path.into()), write_lock: Arc::new(Mutex::new(())) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an arbitrary JSON object as one line.
    pub async fn append(&self, value: &Value) -> io::Result<()> {
        let line = value.to_string() + "\n";
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_ref())
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl tower_service::Service<HarnessEvent> for JsonlSink {
    type Response = ();
    type Error = io::Error;
    type Future = SinkFuture<io::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: HarnessEvent) -> Self::Future {
        let sink = self.clone();
        let value = event_to_json(&event);
        Box::pin(async move {
            let result = sink.append(&value).await;
            if let Err(e) = &result {
                tracing::warn!(path = %sink.path.display(), error = %e, "jsonl write failed");
            }
            result
        })
    }
}

impl TelemetrySink for JsonlSink {
    type SinkError = io::Error;
}
