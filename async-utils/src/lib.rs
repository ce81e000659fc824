//! Async utilities for cancellation-aware futures and delayed actions.
//!
//! Provides the `OrCancelExt` trait for racing futures against a tokio
//! `CancellationToken`, and `TimerSet`, a group of delayed actions that
//! share one token so the whole group can be disarmed at once.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Error returned when a future is cancelled.
#[derive(Debug, PartialEq, Eq)]
pub enum CancelErr {
    Cancelled,
}

/// Extension trait for making futures cancellable.
///
/// Allows any future to race against a `CancellationToken`, returning
/// `Err(CancelErr::Cancelled)` if the token is cancelled before the
/// future completes.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Race this future against the cancellation token.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            // Cancellation wins ties so a disarmed timer never runs its action.
            biased;
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }
}

/// How a scheduled action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFired {
    /// The delay elapsed and the action ran to completion.
    Ran,
    /// The set was cancelled before the delay elapsed; the action never ran.
    Cancelled,
}

/// A group of delayed actions sharing one cancellation token.
///
/// Every action scheduled through the set sleeps for its delay and then
/// runs, unless [`TimerSet::cancel_all`] is called first. Cancellation
/// only interrupts the sleep: an action that has already started runs to
/// completion, which lets an action cancel its own siblings.
#[derive(Debug, Clone, Default)]
pub struct TimerSet {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `action` to run after `delay`.
    ///
    /// Scheduling on an already-cancelled set is allowed; the returned task
    /// resolves to [`TimerFired::Cancelled`] without running the action.
    pub fn schedule<Fut>(&self, delay: Duration, action: Fut) -> JoinHandle<TimerFired>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        self.tracker.spawn(async move {
            if tokio::time::sleep(delay).or_cancel(&token).await.is_err() {
                return TimerFired::Cancelled;
            }
            action.await;
            TimerFired::Ran
        })
    }

    /// Disarm every action that is still waiting on its delay.
    pub fn cancel_all(&self) {
        self.token.cancel();
        self.tracker.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of scheduled actions that have not finished yet.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every scheduled action has either run or been cancelled.
    ///
    /// Only returns once the set has been cancelled.
    pub async fn drained(&self) {
        self.tracker.wait().await;
    }
}
