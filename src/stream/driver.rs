//! I/O loop that owns a WebSocket for one session.
//!
//! The session talks to the driver through a bounded channel and observes it through a
//! `watch` channel carrying [`SessionState`]. When every sender is dropped the driver
//! performs a graceful close on its own.

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use super::log::{Frame, MessageLog};
use super::session::SessionState;

/// Outbound queue size (messages).
pub const OUTBOUND_QUEUE_SIZE: usize = 256;

/// Messages from the session to the driver.
#[derive(Debug)]
pub(crate) enum Outbound {
    Text(String),
    Binary(Bytes),
    Close,
}

/// Move to `next` unless the current state is terminal. Returns whether it changed.
pub(crate) fn transition(
    state: &watch::Sender<SessionState>,
    url: &str,
    next: SessionState,
) -> bool {
    let mut previous = None;
    let changed = state.send_if_modified(|current| {
        if current.is_terminal() || *current == next {
            return false;
        }
        previous = Some(std::mem::replace(current, next.clone()));
        true
    });
    if let Some(from) = previous {
        match &next {
            SessionState::Failed(reason) => {
                tracing::warn!(url, from = %from, reason = %reason, "session failed")
            }
            _ => tracing::info!(url, from = %from, to = %next, "session state"),
        }
    }
    changed
}

pub(crate) struct Driver<S> {
    pub ws: WebSocketStream<S>,
    pub out_rx: mpsc::Receiver<Outbound>,
    pub log: MessageLog,
    pub state: watch::Sender<SessionState>,
    pub url: String,
    pub close_timeout: Duration,
}

impl<S> Driver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn record(&self, message: Message) {
        let frame = match message {
            Message::Text(text) => Frame::from_text(text.as_str()),
            Message::Binary(data) => Frame::Binary(data),
            _ => return,
        };
        tracing::trace!(url = %self.url, kind = frame.kind(), len = frame.len(), "frame received");
        self.log.push(frame);
    }

    fn fail(&self, reason: String) {
        self.log.record_error(reason.clone());
        transition(&self.state, &self.url, SessionState::Failed(reason));
    }

    /// Run until the socket closes or fails.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                outbound = self.out_rx.recv() => {
                    let message = match outbound {
                        Some(Outbound::Text(text)) => Message::Text(text.into()),
                        Some(Outbound::Binary(data)) => Message::Binary(data),
                        // explicit close, or every sender dropped
                        Some(Outbound::Close) | None => {
                            self.shutdown().await;
                            return;
                        }
                    };
                    if let Err(e) = self.ws.send(message).await {
                        self.fail(format!("send failed: {e}"));
                        return;
                    }
                }

                inbound = self.ws.next() => {
                    match inbound {
                        Some(Ok(Message::Close(frame))) => {
                            tracing::debug!(url = %self.url, ?frame, "peer closed session");
                            let _ = self.ws.flush().await;
                            transition(&self.state, &self.url, SessionState::Closed);
                            return;
                        }
                        Some(Ok(message)) => self.record(message),
                        Some(Err(e)) => {
                            self.fail(e.to_string());
                            return;
                        }
                        None => {
                            transition(&self.state, &self.url, SessionState::Closed);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Close handshake: send Close, keep recording until the peer answers or the deadline passes.
    async fn shutdown(&mut self) {
        transition(&self.state, &self.url, SessionState::Closing);
        let deadline = self.close_timeout;
        let drained = tokio::time::timeout(deadline, async {
            if self.ws.close(None).await.is_err() {
                return;
            }
            while let Some(inbound) = self.ws.next().await {
                match inbound {
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(message) => self.record(message),
                }
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(url = %self.url, ?deadline, "close handshake timed out");
        }
        transition(&self.state, &self.url, SessionState::Closed);
    }
}
