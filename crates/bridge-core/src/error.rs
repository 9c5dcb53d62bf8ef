//! Error taxonomy for the acquisition bridge.
//!
//! Driver calls fail with a raw [`DriverError`]. Every call site classifies
//! that raw error into one of the taxonomy types below before it travels any
//! further:
//!
//! - **`EnumerationError`**: listing endpoints failed. Non-fatal, callers
//!   degrade to an empty device list.
//! - **`ConnectionError`**: connect or reconnect gave up. Carries whether the
//!   last failure was transient (budget exhausted) or permanent (aborted on
//!   the first attempt), plus attempt count and interval for diagnostics.
//! - **`SubscriptionError`**: registering or removing a category handler
//!   failed, or the request did not match the active set.
//! - **`DispatchError`**: dispatch failed. `ConnectionLost` drives the
//!   in-loop reconnect, `Other` is fatal to the loop.
//! - **`ClockResyncError`**: timesync failed. Always logged and ignored.

use crate::event::EventCategory;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Raw driver errors
// =============================================================================

/// Error codes a device driver can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverErrorKind {
    /// Unexpected failure inside the driver
    Internal,
    /// The device does not support the request
    NotSupported,
    /// The requested device or feature is not available
    NotAvailable,
    /// The connection to the device dropped or could not be made
    ConnectionFailed,
    /// The device is busy upgrading its firmware
    FirmwareUpgradeInProgress,
    /// Nothing happened within the requested timeout
    TimedOut,
    /// An argument was rejected
    InvalidParameter,
    /// The category is already subscribed
    AlreadySubscribed,
    /// The category is not subscribed
    NotSubscribed,
    /// The device refuses further subscribers
    TooManySubscribers,
    /// The call failed for a reason the driver does not classify
    OperationFailed,
    /// The device requires a license the caller lacks
    Unauthorized,
}

impl DriverErrorKind {
    /// Errors that are expected to clear up after a short wait.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::ConnectionFailed | Self::FirmwareUpgradeInProgress)
    }
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Internal => "internal",
            Self::NotSupported => "not_supported",
            Self::NotAvailable => "not_available",
            Self::ConnectionFailed => "connection_failed",
            Self::FirmwareUpgradeInProgress => "firmware_upgrade_in_progress",
            Self::TimedOut => "timed_out",
            Self::InvalidParameter => "invalid_parameter",
            Self::AlreadySubscribed => "already_subscribed",
            Self::NotSubscribed => "not_subscribed",
            Self::TooManySubscribers => "too_many_subscribers",
            Self::OperationFailed => "operation_failed",
            Self::Unauthorized => "unauthorized",
        };
        write!(f, "{}", label)
    }
}

/// Raw failure reported by a driver call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("driver {kind} error: {message}")]
pub struct DriverError {
    /// Error code
    pub kind: DriverErrorKind,
    /// Driver-supplied detail
    pub message: String,
}

impl DriverError {
    /// Error with an explicit code and detail.
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The wait-for-callbacks timeout. Not a failure for the acquisition loop.
    pub fn timed_out() -> Self {
        Self::new(DriverErrorKind::TimedOut, "no callbacks within timeout")
    }

    /// A dropped or refused connection.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::ConnectionFailed, message)
    }

    /// Whether this is the wait-for-callbacks timeout.
    pub fn is_timeout(&self) -> bool {
        self.kind == DriverErrorKind::TimedOut
    }

    /// Whether retrying may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

// =============================================================================
// Classified errors
// =============================================================================

/// Enumerating device endpoints failed.
#[derive(Error, Debug, Clone)]
#[error("failed to enumerate devices: {source}")]
pub struct EnumerationError {
    /// Underlying driver failure
    #[source]
    pub source: DriverError,
}

/// Which connection operation gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOperation {
    /// Initial session creation
    Connect,
    /// Re-establishing an existing session
    Reconnect,
}

impl fmt::Display for ConnectOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Reconnect => write!(f, "reconnect"),
        }
    }
}

/// Whether the final connection failure was worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Every attempt hit a transient error and the budget ran out
    Transient,
    /// A non-retryable error aborted the retry loop
    Permanent,
}

/// Connect or reconnect gave up.
#[derive(Error, Debug, Clone)]
#[error(
    "{operation} to '{endpoint}' failed ({kind:?}) after {attempts} attempt(s) \
     at {interval:?} intervals: {source}"
)]
pub struct ConnectionError {
    /// Connect or reconnect
    pub operation: ConnectOperation,
    /// Endpoint URL
    pub endpoint: String,
    /// Transient or permanent
    pub kind: ConnectionErrorKind,
    /// Attempts actually made
    pub attempts: u32,
    /// Configured delay between attempts
    pub interval: Duration,
    /// Last driver failure
    #[source]
    pub source: DriverError,
}

impl ConnectionError {
    /// Whether the retry budget ran out rather than being aborted.
    pub fn is_transient(&self) -> bool {
        self.kind == ConnectionErrorKind::Transient
    }
}

/// Registering or removing an event handler failed.
#[derive(Error, Debug, Clone)]
pub enum SubscriptionError {
    /// The driver refused the subscription
    #[error("subscribing to {category} failed: {source}")]
    Subscribe {
        /// Category that was being subscribed
        category: EventCategory,
        /// Driver refusal
        #[source]
        source: DriverError,
    },

    /// The driver refused to remove an active subscription
    #[error("unsubscribing from {category} failed: {source}")]
    Unsubscribe {
        /// Category that was being unsubscribed
        category: EventCategory,
        /// Driver refusal
        #[source]
        source: DriverError,
    },

    /// Subscribing a category that is already active
    #[error("{category} is already subscribed")]
    AlreadyActive {
        /// Requested category
        category: EventCategory,
    },

    /// Unsubscribing a category that is not active; the driver is not called
    #[error("{category} is not subscribed")]
    NotActive {
        /// Requested category
        category: EventCategory,
    },
}

/// Dispatching callbacks failed.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    /// The device connection dropped; reconnect may repair it
    #[error("connection lost during dispatch: {0}")]
    ConnectionLost(DriverError),

    /// Anything else; fatal to the acquisition loop
    #[error("dispatch failed: {0}")]
    Other(DriverError),
}

impl From<DriverError> for DispatchError {
    fn from(err: DriverError) -> Self {
        if err.kind == DriverErrorKind::ConnectionFailed {
            Self::ConnectionLost(err)
        } else {
            Self::Other(err)
        }
    }
}

/// Clock resynchronization failed.
#[derive(Error, Debug, Clone)]
#[error("clock resync failed: {source}")]
pub struct ClockResyncError {
    /// Underlying driver failure
    #[source]
    pub source: DriverError,
}
