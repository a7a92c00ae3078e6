//! Convergence polling for asynchronous control-plane operations.
//!
//! Stopping a server or detaching a volume returns as soon as the request is
//! accepted; the resource reaches its target state later. [`StatusPoller`]
//! queries the status on a fixed interval until it matches or the timeout
//! elapses. There is no backoff and no cancellation.

use crate::error::Error;
use crate::types::PollConfig;
use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

/// Source of time for the poller.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    /// Block for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant`] and [`thread::sleep`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Virtual clock for tests: sleeping advances time instantly.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    sleeps: Cell<u32>,
}

impl ManualClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without counting a sleep.
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    /// Number of times [`Clock::sleep`] was called.
    pub fn sleeps(&self) -> u32 {
        self.sleeps.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.set(self.sleeps.get() + 1);
        self.advance(duration);
    }
}

/// Callback trait for poll progress notifications.
pub trait PollCallback {
    /// Called when an observation did not match and the poller is about to sleep.
    ///
    /// # Arguments
    /// * `resource` - Server name or volume id being polled
    /// * `desired` - Status token being waited for
    /// * `observed` - Last observed status, `None` if the query failed
    /// * `delay` - Time until the next query
    fn on_pending(&self, resource: &str, desired: &str, observed: Option<&str>, delay: Duration);

    /// Called when a status query itself failed.
    fn on_query_error(&self, resource: &str, error: &Error);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl PollCallback for NoCallback {
    fn on_pending(&self, _resource: &str, _desired: &str, _observed: Option<&str>, _delay: Duration) {
    }

    fn on_query_error(&self, _resource: &str, _error: &Error) {}
}

/// Result of waiting for a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A query returned the desired status
    Reached {
        /// Time from the first query to the matching one
        elapsed: Duration,
    },
    /// The timeout elapsed without a matching observation
    TimedOut {
        /// Last successfully observed status, if any query succeeded
        last_observed: Option<String>,
        /// Time from the first query to giving up
        elapsed: Duration,
    },
}

impl PollOutcome {
    /// Whether the desired status was observed.
    pub fn is_reached(&self) -> bool {
        matches!(self, PollOutcome::Reached { .. })
    }
}

/// Polls a status query until it matches or times out.
pub struct StatusPoller<'a> {
    config: PollConfig,
    clock: &'a dyn Clock,
    callback: &'a dyn PollCallback,
}

impl<'a> StatusPoller<'a> {
    /// Create a poller with the given timing and time source.
    pub fn new(config: PollConfig, clock: &'a dyn Clock) -> Self {
        Self {
            config,
            clock,
            callback: &NoCallback,
        }
    }

    /// Report progress to a callback.
    pub fn with_callback(mut self, callback: &'a dyn PollCallback) -> Self {
        self.callback = callback;
        self
    }

    /// Whether a raw status matches the desired token under the configured mode.
    pub fn matches(&self, observed: &str, desired: &str) -> bool {
        self.config.match_mode.matches(observed, desired)
    }

    /// Wait until `query` reports `desired`.
    ///
    /// The first query runs immediately. After that the poller sleeps one
    /// interval between queries and stops as soon as the elapsed time reaches
    /// the timeout, so it gives up no later than `timeout + interval` after
    /// the first query. A failed query counts as "not there yet".
    pub fn wait_for<F>(&self, resource: &str, desired: &str, mut query: F) -> PollOutcome
    where
        F: FnMut() -> crate::Result<String>,
    {
        let start = self.clock.now();
        let mut last_observed = None;

        loop {
            match query() {
                Ok(observed) => {
                    if self.matches(&observed, desired) {
                        return PollOutcome::Reached {
                            elapsed: self.clock.now() - start,
                        };
                    }
                    last_observed = Some(observed.trim().to_string());
                }
                Err(e) => self.callback.on_query_error(resource, &e),
            }

            let elapsed = self.clock.now() - start;
            if elapsed >= self.config.timeout {
                return PollOutcome::TimedOut {
                    last_observed,
                    elapsed,
                };
            }

            self.callback.on_pending(
                resource,
                desired,
                last_observed.as_deref(),
                self.config.interval,
            );
            self.clock.sleep(self.config.interval);
        }
    }

    /// Boolean form of [`wait_for`](Self::wait_for).
    pub fn wait_for_status<F>(&self, resource: &str, desired: &str, query: F) -> bool
    where
        F: FnMut() -> crate::Result<String>,
    {
        self.wait_for(resource, desired, query).is_reached()
    }
}
