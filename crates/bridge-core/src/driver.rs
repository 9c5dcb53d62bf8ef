//! Driver boundary traits.
//!
//! A driver exposes three nested resources, each with an explicit close call:
//!
//! ```text
//!   DeviceDriver ──create_api──▶ DeviceApi ──create_session──▶ DeviceSession
//!                                 destroy()                     destroy()
//! ```
//!
//! The bridge owns all of them on a single worker thread, so none of the
//! traits require `Send`. Callbacks are modelled as an [`EventSink`] handed to
//! [`DeviceSession::process_callbacks`]: events are delivered synchronously
//! inside that call and nowhere else.

use crate::device::{DeviceEndpoint, DeviceInfo};
use crate::error::DriverError;
use crate::event::{DeviceEvent, EventCategory};
use std::time::Duration;

/// Factory for process-scoped API contexts.
///
/// Shared between the controller and the worker thread; the worker calls
/// [`create_api`](DeviceDriver::create_api) once per recording run.
pub trait DeviceDriver: Send + Sync + 'static {
    /// Process context type produced by this driver.
    type Api: DeviceApi;

    /// Human-readable driver name for logs.
    fn name(&self) -> &str;

    /// Create a new API context.
    fn create_api(&self) -> Result<Self::Api, DriverError>;
}

/// Process-scoped context required to enumerate devices and create sessions.
pub trait DeviceApi {
    /// Session type created by this context.
    type Session: DeviceSession;

    /// List reachable device endpoints. Order is not guaranteed.
    fn enumerate_endpoints(&self) -> Result<Vec<DeviceEndpoint>, DriverError>;

    /// Open one session to `endpoint`. Single attempt, no retry.
    fn create_session(&self, endpoint: &DeviceEndpoint) -> Result<Self::Session, DriverError>;

    /// Driver system clock in microseconds.
    fn system_clock_us(&self) -> Result<i64, DriverError>;

    /// Release the context. Every session must be destroyed first.
    fn destroy(self) -> Result<(), DriverError>
    where
        Self: Sized;
}

/// Receives events during [`DeviceSession::process_callbacks`].
pub trait EventSink {
    /// Handle one event. Runs on the dispatching thread.
    fn deliver(&mut self, event: DeviceEvent);
}

impl<F> EventSink for F
where
    F: FnMut(DeviceEvent),
{
    fn deliver(&mut self, event: DeviceEvent) {
        self(event)
    }
}

/// One live connection to one device.
pub trait DeviceSession {
    /// Endpoint this session was created for.
    fn endpoint(&self) -> &DeviceEndpoint;

    /// Re-establish a dropped connection. Single attempt, no retry.
    fn reconnect(&mut self) -> Result<(), DriverError>;

    /// Query model, serial and generation information.
    fn device_info(&self) -> Result<DeviceInfo, DriverError>;

    /// Start delivering events of `category` during dispatch.
    fn subscribe(&mut self, category: EventCategory) -> Result<(), DriverError>;

    /// Stop delivering events of `category`.
    fn unsubscribe(&mut self, category: EventCategory) -> Result<(), DriverError>;

    /// Block until callbacks are pending or `timeout` elapses.
    ///
    /// Returns a [`DriverErrorKind::TimedOut`](crate::DriverErrorKind::TimedOut)
    /// error when nothing arrived in time.
    fn wait_for_callbacks(&mut self, timeout: Duration) -> Result<(), DriverError>;

    /// Run all pending callbacks, delivering their events to `sink`.
    fn process_callbacks(&mut self, sink: &mut dyn EventSink) -> Result<(), DriverError>;

    /// Re-align the device clock with the host clock.
    fn update_timesync(&mut self) -> Result<(), DriverError>;

    /// Close the session. Every subscription must be removed first.
    fn destroy(self) -> Result<(), DriverError>
    where
        Self: Sized;
}
