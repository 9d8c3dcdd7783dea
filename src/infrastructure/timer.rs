use crate::types::constants::{FATAL_ERROR_CODES, IMMEDIATE_RETRY_ERROR_CODES};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Why the reconnect policy refused another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// The server closed the connection with an application-fatal code
    FatalError(u16),
    /// The maximum number of attempts has been used up
    Exhausted,
}

/// Outcome of evaluating the reconnect policy on a close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    GiveUp(GiveUpReason),
    Retry { attempt: u32, delay: Duration },
}

/// Linear-backoff reconnect policy with a ceiling on attempts
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    interval: Duration,
    maximum_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(interval: Duration, maximum_attempts: u32) -> Self {
        Self {
            interval,
            maximum_attempts,
        }
    }

    /// Decide what to do after a close.
    ///
    /// `attempts` is the number of reconnects already made since the last
    /// successful open. Codes in 4000..=4099 stop for good, codes in
    /// 4200..=4299 retry without delay, anything else waits
    /// `attempt * interval`.
    pub fn decide(&self, error_code: Option<u16>, attempts: u32) -> ReconnectDecision {
        if let Some(code) = error_code
            && FATAL_ERROR_CODES.contains(&code)
        {
            return ReconnectDecision::GiveUp(GiveUpReason::FatalError(code));
        }

        if attempts >= self.maximum_attempts {
            return ReconnectDecision::GiveUp(GiveUpReason::Exhausted);
        }

        let attempt = attempts + 1;
        let delay = match error_code {
            Some(code) if IMMEDIATE_RETRY_ERROR_CODES.contains(&code) => Duration::ZERO,
            _ => self.interval.saturating_mul(attempt),
        };

        ReconnectDecision::Retry { attempt, delay }
    }
}

/// One-shot timer that can be cancelled before it fires.
///
/// Dropping the task cancels it.
pub struct ScheduledTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Runs `fire` after `delay` unless `parent` or this task is cancelled first
    pub fn after<F>(delay: Duration, parent: &CancellationToken, fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let token = parent.child_token();
        let guard = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = sleep(delay) => fire(),
            }
        });

        Self { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
