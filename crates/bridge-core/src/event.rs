//! Raw event payloads pushed by the device.
//!
//! These mirror what an eye-tracker driver hands to its callbacks. They are
//! translated into outbound samples by the bridge, never forwarded as-is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Independent event feed a session can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Primary gaze point signal
    Gaze,
    /// User presence state changes
    Presence,
    /// Device notifications (calibration, pause, framerate, ...)
    Notifications,
}

impl EventCategory {
    /// Every category, in subscription order.
    pub const ALL: [EventCategory; 3] = [
        EventCategory::Gaze,
        EventCategory::Presence,
        EventCategory::Notifications,
    ];

    /// Suffix used for stream names and source identifiers.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Gaze => "gaze",
            Self::Presence => "presence",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Validity flag attached to a gaze point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    /// Tracking lost; the position is meaningless
    Invalid,
    /// Position is a real measurement
    Valid,
}

/// Gaze point on the display, normalized to `[0, 1]` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazePoint {
    /// Device clock timestamp in microseconds
    pub timestamp_us: i64,
    /// Whether `position_xy` holds a measurement
    pub validity: Validity,
    /// Normalized (x, y) display position
    pub position_xy: [f32; 2],
}

impl GazePoint {
    /// A valid gaze point.
    pub fn valid(timestamp_us: i64, x: f32, y: f32) -> Self {
        Self {
            timestamp_us,
            validity: Validity::Valid,
            position_xy: [x, y],
        }
    }

    /// An invalid gaze point (tracking lost).
    pub fn invalid(timestamp_us: i64) -> Self {
        Self {
            timestamp_us,
            validity: Validity::Invalid,
            position_xy: [0.0, 0.0],
        }
    }
}

/// User presence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceStatus {
    /// The device cannot tell
    Unknown,
    /// Nobody in front of the device
    Away,
    /// A user is present
    Present,
}

/// Presence change with its device timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    /// New presence state
    pub status: PresenceStatus,
    /// Device clock timestamp in microseconds
    pub timestamp_us: i64,
}

/// Kind of device notification, with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Calibration started (`true`) or stopped (`false`)
    CalibrationStateChanged(bool),
    /// Excluded region of the tracking area changed
    ExcludedRegionChanged,
    /// Combined gaze factor changed
    CombinedGazeFactorChanged,
    /// Trackbox geometry changed
    TrackboxChanged,
    /// Display area geometry changed
    DisplayAreaChanged,
    /// Output framerate changed to the given value
    FramerateChanged(f32),
    /// Power save entered (`true`) or left (`false`)
    PowerSaveStateChanged(bool),
    /// Device paused (`true`) or resumed (`false`)
    DevicePausedStateChanged(bool),
    /// Eye used for calibration changed
    CalibrationEnabledEyeChanged,
    /// Active calibration id changed to the given value
    CalibrationIdChanged(u32),
    /// Eye selection for combined gaze changed
    CombinedGazeEyeSelectionChanged,
    /// Fault list changed
    FaultsChanged(String),
    /// Warning list changed
    WarningsChanged(String),
    /// Face type changed
    FaceTypeChanged(String),
}

/// Device notification. The driver stamps it with its system clock at dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// What changed
    pub kind: NotificationKind,
    /// Driver system clock timestamp in microseconds
    pub timestamp_us: i64,
}

/// Any event a session delivers during dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// Gaze point sample
    Gaze(GazePoint),
    /// Presence change
    Presence(PresenceEvent),
    /// Device notification
    Notification(Notification),
}

impl DeviceEvent {
    /// The feed this event belongs to.
    pub fn category(&self) -> EventCategory {
        match self {
            Self::Gaze(_) => EventCategory::Gaze,
            Self::Presence(_) => EventCategory::Presence,
            Self::Notification(_) => EventCategory::Notifications,
        }
    }

    /// Device timestamp of the event in microseconds.
    pub fn timestamp_us(&self) -> i64 {
        match self {
            Self::Gaze(gaze) => gaze.timestamp_us,
            Self::Presence(presence) => presence.timestamp_us,
            Self::Notification(notification) => notification.timestamp_us,
        }
    }
}
