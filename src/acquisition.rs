//! Acquisition loop.
//!
//! Wait-then-dispatch state machine run on the recording worker thread:
//!
//! ```text
//!            ┌──────────── reconnect ok ─────────────┐
//!            ▼                                       │
//!   ──▶ Running ── dispatch: connection lost ──▶ Reconnecting
//!         │  │                                       │
//!  shutdown  └── wait/dispatch: other error ──┐      └── reconnect failed ──┐
//!         ▼                                   ▼                             ▼
//!      Stopped                              Failed ◀────────────────────────┘
//! ```
//!
//! Every iteration checks the shutdown flag first, so the stop latency is
//! bounded by one wait timeout while the loop is running. A reconnect in
//! progress is not interruptible.

use crate::connection::ConnectionManager;
use crate::status::StatusSender;
use crate::subscription::SubscriptionSet;
use crate::translate::InvalidGazePolicy;
use bridge_core::{
    ClockResyncError, ConnectionError, DeviceApi, DeviceSession, DispatchError, DriverError,
    DriverErrorKind,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Cooperative stop flag shared by the controller and the worker.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Returns `true` if this call set the flag.
    pub fn trigger(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    /// Whether a stop was requested.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Tunables of the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionSettings {
    /// Upper bound on one wait-for-callbacks call
    pub wait_timeout: Duration,
    /// Device clock time between timesync requests
    pub timesync_interval: Duration,
    /// What to publish for invalid gaze points
    pub invalid_gaze: InvalidGazePolicy,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_millis(100),
            timesync_interval: Duration::from_secs(30),
            invalid_gaze: InvalidGazePolicy::Placeholder,
        }
    }
}

/// Where the loop is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for and dispatching callbacks
    Running,
    /// Connection lost, reconnect in progress
    Reconnecting,
    /// Shutdown requested and observed
    Stopped,
    /// Ended on an unrecoverable error
    Failed,
}

/// Why the loop ended in [`LoopState::Failed`].
#[derive(Error, Debug, Clone)]
pub enum LoopFailure {
    /// Wait failed with something other than a timeout or lost connection
    #[error("waiting for callbacks failed: {0}")]
    Wait(DriverError),

    /// Dispatch failed with something other than a lost connection
    #[error(transparent)]
    Dispatch(DispatchError),

    /// The reconnect budget ran out or was aborted
    #[error("connection lost and reconnect failed: {0}")]
    Reconnect(ConnectionError),
}

/// Terminal state of one loop run.
#[derive(Debug, Clone)]
pub enum LoopExit {
    /// The shutdown flag was observed
    Stopped,
    /// A fatal error ended the loop
    Failed(LoopFailure),
}

/// Counters for the final log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Loop iterations started
    pub iterations: u64,
    /// Waits that timed out
    pub timeouts: u64,
    /// Successful dispatch calls
    pub dispatches: u64,
    /// Events routed to handlers
    pub events: u64,
    /// Successful reconnects
    pub reconnects: u64,
    /// Successful timesync requests
    pub timesyncs: u64,
    /// Failed timesync requests
    pub timesync_failures: u64,
}

/// One acquisition loop over an established session.
pub struct AcquisitionLoop<'a> {
    connection: &'a ConnectionManager,
    settings: AcquisitionSettings,
    shutdown: &'a ShutdownSignal,
    status: &'a StatusSender,
    state: LoopState,
    stats: LoopStats,
}

impl<'a> AcquisitionLoop<'a> {
    /// Loop over `connection`, stopping when `shutdown` is triggered.
    pub fn new(
        connection: &'a ConnectionManager,
        settings: AcquisitionSettings,
        shutdown: &'a ShutdownSignal,
        status: &'a StatusSender,
    ) -> Self {
        Self {
            connection,
            settings,
            shutdown,
            status,
            state: LoopState::Running,
            stats: LoopStats::default(),
        }
    }

    /// Counters collected so far.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Run until shutdown or a fatal error.
    ///
    /// The timesync baseline is the driver clock at entry, so the first
    /// resync happens one full interval after the loop starts.
    pub fn run<A: DeviceApi>(
        &mut self,
        api: &A,
        session: &mut A::Session,
        subscriptions: &mut SubscriptionSet,
    ) -> LoopExit {
        let interval_us =
            i64::try_from(self.settings.timesync_interval.as_micros()).unwrap_or(i64::MAX);
        let mut last_sync_us = match api.system_clock_us() {
            Ok(now) => Some(now),
            Err(e) => {
                warn!(error = %e, "Reading driver clock failed, timesync deferred");
                None
            }
        };
        let delivered_before = subscriptions.delivered();
        info!(endpoint = %session.endpoint(), "Acquisition loop started");

        let exit = loop {
            if self.shutdown.is_triggered() {
                self.state = LoopState::Stopped;
                break LoopExit::Stopped;
            }
            self.stats.iterations += 1;

            self.maybe_resync(api, session, interval_us, &mut last_sync_us);

            match session.wait_for_callbacks(self.settings.wait_timeout) {
                Ok(()) => {}
                Err(e) if e.is_timeout() => {
                    self.stats.timeouts += 1;
                    continue;
                }
                Err(e) if e.kind == DriverErrorKind::ConnectionFailed => {
                    if let Err(failure) = self.reconnect(session, e) {
                        break LoopExit::Failed(failure);
                    }
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Waiting for callbacks failed");
                    self.state = LoopState::Failed;
                    break LoopExit::Failed(LoopFailure::Wait(e));
                }
            }

            match session.process_callbacks(subscriptions).map_err(DispatchError::from) {
                Ok(()) => self.stats.dispatches += 1,
                Err(DispatchError::ConnectionLost(e)) => {
                    if let Err(failure) = self.reconnect(session, e) {
                        break LoopExit::Failed(failure);
                    }
                }
                Err(err @ DispatchError::Other(_)) => {
                    error!(error = %err, "Dispatch failed");
                    self.state = LoopState::Failed;
                    break LoopExit::Failed(LoopFailure::Dispatch(err));
                }
            }
        };

        self.stats.events = subscriptions.delivered() - delivered_before;
        info!(state = ?self.state, stats = ?self.stats, "Acquisition loop exited");
        exit
    }

    fn maybe_resync<A: DeviceApi>(
        &mut self,
        api: &A,
        session: &mut A::Session,
        interval_us: i64,
        last_sync_us: &mut Option<i64>,
    ) {
        let now = match api.system_clock_us() {
            Ok(now) => now,
            Err(e) => {
                debug!(error = %e, "Reading driver clock failed");
                return;
            }
        };
        let due = match *last_sync_us {
            Some(last) => now.saturating_sub(last) >= interval_us,
            None => true,
        };
        if !due {
            return;
        }

        // The baseline moves even when the resync fails.
        *last_sync_us = Some(now);
        match session
            .update_timesync()
            .map_err(|source| ClockResyncError { source })
        {
            Ok(()) => {
                self.stats.timesyncs += 1;
                debug!(clock_us = now, "Timesync updated");
            }
            Err(e) => {
                self.stats.timesync_failures += 1;
                warn!(error = %e, "Timesync failed, continuing");
            }
        }
    }

    fn reconnect<S: DeviceSession>(
        &mut self,
        session: &mut S,
        cause: DriverError,
    ) -> Result<(), LoopFailure> {
        warn!(error = %cause, "Connection lost");
        self.state = LoopState::Reconnecting;
        self.status.send("Connection lost, reconnecting.");

        match self.connection.reconnect(session) {
            Ok(()) => {
                self.state = LoopState::Running;
                self.stats.reconnects += 1;
                self.status.send("Reconnected.");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Reconnect failed");
                self.state = LoopState::Failed;
                Err(LoopFailure::Reconnect(e))
            }
        }
    }
}
