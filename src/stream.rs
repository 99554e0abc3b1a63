//! Duplex WebSocket sessions.
//!
//! A [`Session`] owns one connection. A spawned driver task reads every inbound frame
//! into the session's [`MessageLog`] in arrival order; the scenario sends through the
//! session and waits on the log with the [`wait`](crate::wait) engine.
//!
//! ```rust,no_run
//! use wirecheck::stream::{ClientMessage, Session, SessionOptions};
//!
//! # async fn demo() -> Result<(), wirecheck::HarnessError> {
//! let url = "ws://localhost:8080/api/voice-agent";
//! let session = Session::open(url, SessionOptions::new()).await?;
//! wirecheck::stream::scoped(session, |s| Box::pin(async move {
//!     s.send_text(&ClientMessage::KeepAlive).await?;
//!     Ok(())
//! }))
//! .await
//! # }
//! ```

use std::future::Future;

use futures::future::LocalBoxFuture;

use crate::error::HarnessError;

mod driver;
pub mod log;
pub mod message;
pub mod session;

pub use log::{Frame, LogEntry, MessageLog};
pub use message::{Alternative, ClientMessage, ResultsChannel, StreamMessage};
pub use session::{Session, SessionOptions, SessionState};

/// Run `f` against `session`, then close it whatever `f` returned.
///
/// The closure's result wins; a failed close after a successful body is logged.
pub async fn scoped<T, F>(session: Session, f: F) -> Result<T, HarnessError>
where
    F: for<'a> FnOnce(&'a Session) -> LocalBoxFuture<'a, Result<T, HarnessError>>,
{
    let result = f(&session).await;
    if let Err(e) = session.close().await {
        tracing::warn!(url = session.url(), error = %e, "session close failed");
    }
    result
}

/// Await `body`, then close `session` whatever it returned.
///
/// Same contract as [`scoped`] for bodies that also borrow other state.
pub async fn closing<T, F>(session: &Session, body: F) -> Result<T, HarnessError>
where
    F: Future<Output = Result<T, HarnessError>>,
{
    let result = body.await;
    if let Err(e) = session.close().await {
        tracing::warn!(url = session.url(), error = %e, "session close failed");
    }
    result
}
