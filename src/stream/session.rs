use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Url;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::WebSocketStream;

use super::driver::{transition, Driver, Outbound, OUTBOUND_QUEUE_SIZE};
use super::log::MessageLog;
use crate::config::HarnessConfig;
use crate::error::TransportError;

/// Connection lifecycle.
///
/// `Connecting → Open → Closing → Closed`, or `→ Failed` from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
    Failed(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Handshake options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    protocols: Vec<String>,
    query: Vec<(String, String)>,
    connect_timeout: Duration,
    close_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            protocols: Vec::new(),
            query: Vec::new(),
            connect_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(2),
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults taken from harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::default().connect_timeout(config.connect_timeout())
    }

    /// Offer one subprotocol token.
    pub fn protocol(mut self, token: impl Into<String>) -> Self {
        self.protocols.push(token.into());
        self
    }

    pub fn protocols<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.protocols.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Offer `tokens` ahead of any protocols already configured.
    pub fn prepend_protocols(mut self, mut tokens: Vec<String>) -> Self {
        tokens.append(&mut self.protocols);
        self.protocols = tokens;
        self
    }

    /// Append a query parameter to the endpoint URL.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn offered_protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Endpoint URL with query parameters applied.
    pub fn target_url(&self, url: &str) -> Result<Url, TransportError> {
        let mut target = Url::parse(url)
            .map_err(|e| TransportError::InvalidRequest(format!("url `{url}`: {e}")))?;
        if !self.query.is_empty() {
            let mut pairs = target.query_pairs_mut();
            for (k, v) in &self.query {
                pairs.append_pair(k, v);
            }
        }
        Ok(target)
    }
}

fn classify_handshake(err: WsError, target: &str) -> TransportError {
    let target = target.to_string();
    match err {
        WsError::Http(response) => {
            TransportError::Handshake { target, reason: format!("HTTP {}", response.status()) }
        }
        WsError::Io(e) => TransportError::Connect { target, reason: e.to_string() },
        WsError::Tls(e) => TransportError::Connect { target, reason: e.to_string() },
        WsError::Url(e) => TransportError::InvalidRequest(e.to_string()),
        other => TransportError::Handshake { target, reason: other.to_string() },
    }
}

/// One open streaming connection.
///
/// Inbound frames land in [`Session::log`]. Dropping the session closes the socket;
/// [`Session::close`] does the same but waits for the close handshake.
#[derive(Debug)]
pub struct Session {
    url: String,
    log: MessageLog,
    out_tx: mpsc::Sender<Outbound>,
    state: watch::Sender<SessionState>,
    driver: JoinHandle<()>,
    close_timeout: Duration,
}

impl Session {
    /// Perform the handshake and start the I/O driver.
    pub async fn open(url: &str, options: SessionOptions) -> Result<Self, TransportError> {
        let target = options.target_url(url)?;
        let mut request = target
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        if !options.protocols.is_empty() {
            let value = HeaderValue::from_str(&options.protocols.join(", "))
                .map_err(|e| TransportError::InvalidRequest(format!("subprotocol: {e}")))?;
            request.headers_mut().insert("Sec-WebSocket-Protocol", value);
        }

        tracing::debug!(url = %target, "session connecting");
        let handshake = tokio_tungstenite::connect_async(request);
        let (ws, _response) = match tokio::time::timeout(options.connect_timeout, handshake).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(classify_handshake(e, target.as_str())),
            Err(_) => {
                return Err(TransportError::Timeout {
                    operation: format!("open {target}"),
                    after: options.connect_timeout,
                })
            }
        };
        Ok(Self::from_stream(target.to_string(), ws, &options))
    }

    /// Wrap an already-upgraded WebSocket.
    pub fn from_stream<S>(
        url: impl Into<String>,
        ws: WebSocketStream<S>,
        options: &SessionOptions,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let url = url.into();
        let log = MessageLog::new();
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let (state, _) = watch::channel(SessionState::Connecting);
        transition(&state, &url, SessionState::Open);

        let driver = Driver {
            ws,
            out_rx,
            log: log.clone(),
            state: state.clone(),
            url: url.clone(),
            close_timeout: options.close_timeout,
        };
        let driver = tokio::spawn(driver.run());

        Self { url, log, out_tx, state, driver, close_timeout: options.close_timeout }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        *self.state.borrow() == SessionState::Open
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        match &*self.state.borrow() {
            SessionState::Open => Ok(()),
            SessionState::Failed(reason) => Err(TransportError::Io(reason.clone())),
            _ => Err(TransportError::Closed),
        }
    }

    async fn enqueue(&self, msg: Outbound) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.out_tx.send(msg).await.map_err(|_| TransportError::Closed)
    }

    /// Serialize `message` as JSON and send it as a text frame.
    pub async fn send_text<T: Serialize + ?Sized>(
        &self,
        message: &T,
    ) -> Result<(), TransportError> {
        let text = serde_json::to_string(message)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        self.enqueue(Outbound::Text(text)).await
    }

    /// Send a text frame verbatim.
    pub async fn send_raw_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.enqueue(Outbound::Text(text.into())).await
    }

    pub async fn send_binary(&self, data: impl Into<Bytes>) -> Result<(), TransportError> {
        self.enqueue(Outbound::Binary(data.into())).await
    }

    /// Wait until the session reaches a terminal state.
    pub async fn wait_terminal(&self, timeout: Duration) -> Result<SessionState, TransportError> {
        let mut rx = self.state.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(SessionState::is_terminal)).await;
        match waited {
            Ok(Ok(state)) => Ok(state.clone()),
            // sender lives in self, so the channel cannot close under us
            Ok(Err(_)) => Ok(self.state()),
            Err(_) => Err(self.close_timed_out(timeout)),
        }
    }

    /// Close the connection. Idempotent; closing a closed or failed session is a no-op.
    pub async fn close(&self) -> Result<(), TransportError> {
        if self.state.borrow().is_terminal() {
            return Ok(());
        }
        // queue behind pending frames; a send error means the driver already exited
        let queued =
            tokio::time::timeout(self.close_timeout, self.out_tx.send(Outbound::Close)).await;
        if queued.is_err() {
            tracing::warn!(
                url = %self.url,
                after = ?self.close_timeout,
                "outbound queue never drained"
            );
            return Err(self.abandon(self.close_timeout));
        }
        // the driver bounds its own handshake by close_timeout; allow a little slack on top
        let limit = self.close_timeout + Duration::from_millis(500);
        match self.wait_terminal(limit).await {
            Ok(_) => Ok(()),
            Err(_) => Err(self.abandon(limit)),
        }
    }

    fn abandon(&self, after: Duration) -> TransportError {
        self.driver.abort();
        transition(&self.state, &self.url, SessionState::Closed);
        self.close_timed_out(after)
    }

    fn close_timed_out(&self, after: Duration) -> TransportError {
        TransportError::Timeout { operation: format!("close {}", self.url), after }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.state.borrow().is_terminal() {
            tracing::debug!(url = %self.url, "session dropped while open; driver will close it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parameters_are_appended() {
        let opts =
            SessionOptions::new().query("model", "flux-general-en").query("sample_rate", 16000);
        let url = opts.target_url("ws://localhost:8080/api/flux").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:8080/api/flux?model=flux-general-en&sample_rate=16000"
        );
    }

    #[test]
    fn bad_url_is_invalid_request() {
        let err = SessionOptions::new().target_url("not a url").unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[test]
    fn state_display_and_terminality() {
        assert_eq!(SessionState::Failed("boom".into()).to_string(), "failed: boom");
        assert!(SessionState::Closed.is_terminal());
        assert!(!SessionState::Closing.is_terminal());
    }
}
