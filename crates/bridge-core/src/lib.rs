//! `bridge-core`
//!
//! Shared building blocks for the gaze-bridge acquisition pipeline.
//!
//! This crate defines the boundary between the bridge and an eye-tracker
//! driver, the raw event payloads the driver pushes, and the error taxonomy
//! every driver failure is classified into before it travels further up.
//!
//! ## Driver Boundary
//!
//! - [`DeviceDriver`]: factory for a process-scoped [`DeviceApi`] context
//! - [`DeviceApi`]: endpoint enumeration, session creation, system clock
//! - [`DeviceSession`]: one live connection with subscribe / wait / dispatch
//!
//! ## Key Types
//!
//! - [`DeviceEndpoint`] / [`DeviceInfo`]: what the directory and the session report
//! - [`DeviceEvent`]: gaze, presence and notification payloads
//! - [`DriverError`]: raw driver failure, classified by [`DriverErrorKind`]
//! - [`RetryPolicy`]: bounded retry budget shared by connect and reconnect

pub mod device;
pub mod driver;
pub mod error;
pub mod event;
pub mod retry;

pub use device::{DeviceEndpoint, DeviceInfo};
pub use driver::{DeviceApi, DeviceDriver, DeviceSession, EventSink};
pub use error::{
    ClockResyncError, ConnectOperation, ConnectionError, ConnectionErrorKind, DispatchError,
    DriverError, DriverErrorKind, EnumerationError, SubscriptionError,
};
pub use event::{
    DeviceEvent, EventCategory, GazePoint, Notification, NotificationKind, PresenceEvent,
    PresenceStatus, Validity,
};
pub use retry::RetryPolicy;
