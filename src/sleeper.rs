//! Pauses between wait-engine polls.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{saturating_millis, ManualClock};

pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration) -> SleepFuture;
}

/// `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Returns immediately after moving a [`ManualClock`] forward by the requested pause.
///
/// Share the clock with a `WaitEngine` and a wait's whole timeout elapses instantly,
/// poll by poll. Every requested pause is kept for inspection.
#[derive(Debug, Clone)]
pub struct ClockAdvancingSleeper {
    clock: ManualClock,
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl ClockAdvancingSleeper {
    pub fn new(clock: ManualClock) -> Self {
        Self { clock, pauses: Arc::default() }
    }

    /// Pauses requested so far, oldest first.
    pub fn calls(&self) -> Vec<Duration> {
        match self.pauses.lock() {
            Ok(pauses) => pauses.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn total(&self) -> Duration {
        self.calls().iter().sum()
    }
}

impl Sleeper for ClockAdvancingSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture {
        match self.pauses.lock() {
            Ok(mut pauses) => pauses.push(duration),
            Err(poisoned) => poisoned.into_inner().push(duration),
        }
        self.clock.advance(duration);
        tracing::trace!(millis = saturating_millis(duration), "virtual pause");
        Box::pin(std::future::ready(()))
    }
}
