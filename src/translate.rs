//! Device event to outbound sample translation.
//!
//! Pure functions, no I/O. Timestamps convert from device microseconds to
//! seconds on the same clock.

use crate::publisher::Sample;
use bridge_core::{
    GazePoint, Notification, NotificationKind, PresenceEvent, PresenceStatus, Validity,
};
use serde::{Deserialize, Serialize};

/// What to publish for a gaze point without a valid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidGazePolicy {
    /// Publish `[NaN, NaN]` at the event timestamp
    #[default]
    Placeholder,
    /// Publish nothing
    Drop,
}

/// Device microseconds to stream seconds.
pub fn timestamp_seconds(timestamp_us: i64) -> f64 {
    timestamp_us as f64 / 1_000_000.0
}

/// Two-channel gaze sample, or `None` when `policy` drops invalid points.
pub fn gaze_sample(gaze: &GazePoint, policy: InvalidGazePolicy) -> Option<Sample> {
    let timestamp = timestamp_seconds(gaze.timestamp_us);
    match (gaze.validity, policy) {
        (Validity::Valid, _) => Some(Sample::numeric(gaze.position_xy.to_vec(), timestamp)),
        (Validity::Invalid, InvalidGazePolicy::Placeholder) => {
            Some(Sample::numeric(vec![f32::NAN, f32::NAN], timestamp))
        }
        (Validity::Invalid, InvalidGazePolicy::Drop) => None,
    }
}

/// Marker text for a presence status.
pub fn presence_token(status: PresenceStatus) -> &'static str {
    match status {
        PresenceStatus::Unknown => "USER_PRESENCE_STATUS_UNKNOWN",
        PresenceStatus::Away => "USER_PRESENCE_STATUS_AWAY",
        PresenceStatus::Present => "USER_PRESENCE_STATUS_PRESENT",
    }
}

/// Presence change as a text marker sample.
pub fn presence_sample(presence: &PresenceEvent) -> Sample {
    Sample::text(
        presence_token(presence.status),
        timestamp_seconds(presence.timestamp_us),
    )
}

/// Marker text for a notification. Kinds without a marker yield `None`.
pub fn notification_text(kind: &NotificationKind) -> Option<String> {
    let text = match kind {
        NotificationKind::CalibrationStateChanged(true) => "Calibration started".to_string(),
        NotificationKind::CalibrationStateChanged(false) => "Calibration stopped".to_string(),
        NotificationKind::DevicePausedStateChanged(true) => "Paused".to_string(),
        NotificationKind::DevicePausedStateChanged(false) => "Unpaused".to_string(),
        NotificationKind::FramerateChanged(_) => "FRAMERATE_CHANGED".to_string(),
        NotificationKind::CalibrationEnabledEyeChanged => {
            "CALIBRATION_ENABLED_EYE_CHANGED".to_string()
        }
        NotificationKind::CombinedGazeEyeSelectionChanged => {
            "COMBINED_GAZE_EYE_SELECTION_CHANGED".to_string()
        }
        NotificationKind::CalibrationIdChanged(id) => format!("Calibration ID changed to {}", id),
        NotificationKind::ExcludedRegionChanged
        | NotificationKind::CombinedGazeFactorChanged
        | NotificationKind::TrackboxChanged
        | NotificationKind::DisplayAreaChanged
        | NotificationKind::PowerSaveStateChanged(_)
        | NotificationKind::FaultsChanged(_)
        | NotificationKind::WarningsChanged(_)
        | NotificationKind::FaceTypeChanged(_) => return None,
    };
    Some(text)
}

/// Marker sample for a notification, if its kind has a marker text.
pub fn notification_sample(notification: &Notification) -> Option<Sample> {
    notification_text(&notification.kind)
        .map(|text| Sample::text(text, timestamp_seconds(notification.timestamp_us)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::SampleValues;

    fn numeric(sample: &Sample) -> &[f32] {
        match &sample.values {
            SampleValues::Numeric(v) => v,
            SampleValues::Text(_) => panic!("expected numeric sample"),
        }
    }

    #[test]
    fn test_valid_gaze_keeps_position_and_converts_time() {
        let sample = gaze_sample(
            &GazePoint::valid(2_500_000, 0.25, 0.75),
            InvalidGazePolicy::Placeholder,
        )
        .unwrap();
        assert_eq!(numeric(&sample), &[0.25, 0.75]);
        assert_eq!(sample.timestamp, 2.5);
    }

    #[test]
    fn test_invalid_gaze_placeholder_is_nan() {
        let sample =
            gaze_sample(&GazePoint::invalid(7_000_000), InvalidGazePolicy::Placeholder).unwrap();
        let values = numeric(&sample);
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| v.is_nan()));
        assert_eq!(sample.timestamp, 7.0);
    }

    #[test]
    fn test_invalid_gaze_drop_policy_skips() {
        assert!(gaze_sample(&GazePoint::invalid(1), InvalidGazePolicy::Drop).is_none());
        assert!(gaze_sample(&GazePoint::valid(1, 0.1, 0.1), InvalidGazePolicy::Drop).is_some());
    }

    #[test]
    fn test_presence_tokens() {
        assert_eq!(
            presence_token(PresenceStatus::Unknown),
            "USER_PRESENCE_STATUS_UNKNOWN"
        );
        assert_eq!(presence_token(PresenceStatus::Away), "USER_PRESENCE_STATUS_AWAY");
        let sample = presence_sample(&PresenceEvent {
            status: PresenceStatus::Present,
            timestamp_us: 1_000_000,
        });
        assert_eq!(
            sample,
            Sample::text("USER_PRESENCE_STATUS_PRESENT", 1.0)
        );
    }

    #[test]
    fn test_notification_markers() {
        let cases = [
            (NotificationKind::CalibrationStateChanged(true), Some("Calibration started")),
            (NotificationKind::CalibrationStateChanged(false), Some("Calibration stopped")),
            (NotificationKind::DevicePausedStateChanged(true), Some("Paused")),
            (NotificationKind::DevicePausedStateChanged(false), Some("Unpaused")),
            (NotificationKind::FramerateChanged(90.0), Some("FRAMERATE_CHANGED")),
            (
                NotificationKind::CalibrationEnabledEyeChanged,
                Some("CALIBRATION_ENABLED_EYE_CHANGED"),
            ),
            (
                NotificationKind::CombinedGazeEyeSelectionChanged,
                Some("COMBINED_GAZE_EYE_SELECTION_CHANGED"),
            ),
            (NotificationKind::TrackboxChanged, None),
            (NotificationKind::PowerSaveStateChanged(true), None),
            (NotificationKind::FaultsChanged("fan".into()), None),
        ];
        for (kind, expected) in cases {
            assert_eq!(notification_text(&kind).as_deref(), expected, "{:?}", kind);
        }
        assert_eq!(
            notification_text(&NotificationKind::CalibrationIdChanged(42)).as_deref(),
            Some("Calibration ID changed to 42")
        );
    }

    #[test]
    fn test_notification_uses_dispatch_timestamp() {
        let sample = notification_sample(&Notification {
            kind: NotificationKind::DevicePausedStateChanged(true),
            timestamp_us: 3_000_000,
        })
        .unwrap();
        assert_eq!(sample, Sample::text("Paused", 3.0));
    }
}
