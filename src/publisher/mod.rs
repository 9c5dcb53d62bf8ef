//! Outbound stream publishing.
//!
//! A [`StreamPublisher`] turns a [`StreamDeclaration`] into a live
//! [`StreamOutlet`]. Outlets accept timestamped [`Sample`]s and never report
//! delivery failures back to the caller: pushing is fire-and-forget, exactly
//! like a network multicast outlet.
//!
//! Two backends exist:
//!
//! - [`LocalStreamHub`]: in-process fan-out over `tokio::sync::broadcast`,
//!   always compiled. Used by tests and by the CLI when no network backend
//!   is enabled.
//! - `LslPublisher`: Lab Streaming Layer outlets, behind the `lsl` feature.

mod local;
#[cfg(feature = "lsl")]
mod lsl;

pub use local::{LocalOutlet, LocalStreamHub};
#[cfg(feature = "lsl")]
pub use self::lsl::LslPublisher;

use bridge_core::{DeviceInfo, EventCategory};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Nominal sampling rate of event-driven streams.
pub const IRREGULAR_RATE: f64 = 0.0;

/// Payload element type of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelFormat {
    /// 32-bit float channels
    Float32,
    /// Variable-length text channels
    String,
}

/// Values carried by one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValues {
    /// One `f32` per channel
    Numeric(Vec<f32>),
    /// Single-channel text marker
    Text(String),
}

impl SampleValues {
    /// Channel format these values need.
    pub fn format(&self) -> ChannelFormat {
        match self {
            Self::Numeric(_) => ChannelFormat::Float32,
            Self::Text(_) => ChannelFormat::String,
        }
    }

    /// Number of channels these values fill.
    pub fn channel_count(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(_) => 1,
        }
    }
}

/// One outbound sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Channel values
    pub values: SampleValues,
    /// Seconds on the device clock
    pub timestamp: f64,
}

impl Sample {
    /// Float sample.
    pub fn numeric(values: Vec<f32>, timestamp: f64) -> Self {
        Self {
            values: SampleValues::Numeric(values),
            timestamp,
        }
    }

    /// Single-channel text sample.
    pub fn text(text: impl Into<String>, timestamp: f64) -> Self {
        Self {
            values: SampleValues::Text(text.into()),
            timestamp,
        }
    }
}

/// Node in a stream's structured description tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataNode {
    /// Element name
    pub name: String,
    /// Text content of a leaf
    pub value: Option<String>,
    /// Child elements in insertion order
    pub children: Vec<MetadataNode>,
}

impl MetadataNode {
    /// Empty node called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a leaf `name = value` and return `self` for chaining.
    pub fn append_child_value(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.children.push(MetadataNode {
            name: name.to_string(),
            value: Some(value.into()),
            children: Vec::new(),
        });
        self
    }

    /// Append an empty child and return it.
    pub fn append_child(&mut self, name: &str) -> &mut MetadataNode {
        self.children.push(MetadataNode::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// First child called `name`.
    pub fn child(&self, name: &str) -> Option<&MetadataNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Value of the first leaf child called `name`.
    pub fn child_value(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.value.as_deref())
    }
}

/// Per-channel description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Channel label
    pub label: &'static str,
    /// Measurement unit
    pub unit: &'static str,
    /// Channel type
    pub kind: &'static str,
}

static GAZE_CHANNELS: [ChannelSpec; 2] = [
    ChannelSpec {
        label: "x",
        unit: "normalized",
        kind: "screen",
    },
    ChannelSpec {
        label: "y",
        unit: "normalized",
        kind: "screen",
    },
];

static PRESENCE_CHANNELS: [ChannelSpec; 1] = [ChannelSpec {
    label: "presence",
    unit: "none",
    kind: "marker",
}];

static NOTIFICATION_CHANNELS: [ChannelSpec; 1] = [ChannelSpec {
    label: "notification",
    unit: "none",
    kind: "marker",
}];

/// Immutable identity and description of an outbound stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDeclaration {
    /// Stream name, `{base}_{suffix}`
    pub name: String,
    /// Content type advertised to consumers
    pub content_type: String,
    /// Channels per sample
    pub channel_count: usize,
    /// Nominal rate in Hz, [`IRREGULAR_RATE`] for events
    pub nominal_rate: f64,
    /// Payload element type
    pub format: ChannelFormat,
    /// Stable id consumers use to re-resolve the stream
    pub source_id: String,
    /// Root `desc` node
    pub desc: MetadataNode,
}

impl StreamDeclaration {
    /// Declaration for one event category of a recording.
    ///
    /// Stream name is `{base_name}_{suffix}` and source id is
    /// `{serial}_{suffix}`. Every stream carries the device description.
    pub fn for_category(base_name: &str, category: EventCategory, device: &DeviceInfo) -> Self {
        let (content_type, format, channels): (_, _, &[ChannelSpec]) = match category {
            EventCategory::Gaze => ("gaze", ChannelFormat::Float32, &GAZE_CHANNELS[..]),
            EventCategory::Presence => (
                "gaze_events",
                ChannelFormat::String,
                &PRESENCE_CHANNELS[..],
            ),
            EventCategory::Notifications => (
                "gaze_events",
                ChannelFormat::String,
                &NOTIFICATION_CHANNELS[..],
            ),
        };

        let mut desc = MetadataNode::new("desc");
        desc.append_child_value("manufacturer", device.manufacturer.as_str())
            .append_child_value("model", device.model.as_str())
            .append_child_value("serial", device.serial_number.as_str())
            .append_child_value("generation", device.generation.as_str())
            .append_child_value("firmware", device.firmware_version.as_str());
        let channel_list = desc.append_child("channels");
        for channel in channels {
            channel_list
                .append_child("channel")
                .append_child_value("label", channel.label)
                .append_child_value("unit", channel.unit)
                .append_child_value("type", channel.kind);
        }

        Self {
            name: format!("{}_{}", base_name, category.suffix()),
            content_type: content_type.to_string(),
            channel_count: channels.len(),
            nominal_rate: IRREGULAR_RATE,
            format,
            source_id: device.source_id(category.suffix()),
            desc,
        }
    }

    /// Whether `other` describes the same stream shape and identity.
    pub fn same_identity(&self, other: &StreamDeclaration) -> bool {
        self.name == other.name
            && self.content_type == other.content_type
            && self.channel_count == other.channel_count
            && self.format == other.format
            && self.source_id == other.source_id
    }

    /// Whether `sample` fits this stream's format and channel count.
    pub fn accepts(&self, sample: &Sample) -> bool {
        sample.values.format() == self.format && sample.values.channel_count() == self.channel_count
    }
}

/// Declaring a stream failed.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    /// A stream with this name exists with a different identity
    #[error("stream '{name}' is already declared with a different shape")]
    Conflict {
        /// Stream name
        name: String,
    },

    /// The backend refused the declaration
    #[error("stream backend error: {0}")]
    Backend(String),
}

/// Live outbound stream.
pub trait StreamOutlet {
    /// Declaration the outlet was created from.
    fn declaration(&self) -> &StreamDeclaration;

    /// Push one sample. Delivery failures are not reported.
    fn push(&self, sample: Sample);
}

/// Factory for outlets, shared between controller and worker.
pub trait StreamPublisher: Send + Sync {
    /// Create an outlet for `declaration`.
    fn declare(&self, declaration: StreamDeclaration)
        -> Result<Box<dyn StreamOutlet>, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme_device() -> DeviceInfo {
        DeviceInfo {
            manufacturer: "Tobii".to_string(),
            model: "Eye Tracker 5".to_string(),
            serial_number: "ET5-1234".to_string(),
            generation: "IS5".to_string(),
            firmware_version: "2.1.0".to_string(),
        }
    }

    #[test]
    fn test_stream_layout_per_category() {
        let device = acme_device();

        let gaze = StreamDeclaration::for_category("Acme", EventCategory::Gaze, &device);
        assert_eq!(gaze.name, "Acme_gaze");
        assert_eq!(gaze.content_type, "gaze");
        assert_eq!(gaze.channel_count, 2);
        assert_eq!(gaze.format, ChannelFormat::Float32);
        assert_eq!(gaze.source_id, "ET5-1234_gaze");
        assert_eq!(gaze.nominal_rate, IRREGULAR_RATE);

        let presence = StreamDeclaration::for_category("Acme", EventCategory::Presence, &device);
        assert_eq!(presence.name, "Acme_presence");
        assert_eq!(presence.content_type, "gaze_events");
        assert_eq!(presence.channel_count, 1);
        assert_eq!(presence.format, ChannelFormat::String);
        assert_eq!(presence.source_id, "ET5-1234_presence");

        let notes = StreamDeclaration::for_category("Acme", EventCategory::Notifications, &device);
        assert_eq!(notes.name, "Acme_notifications");
        assert_eq!(notes.source_id, "ET5-1234_notifications");
    }

    #[test]
    fn test_every_stream_carries_device_metadata() {
        let device = acme_device();
        for category in EventCategory::ALL {
            let decl = StreamDeclaration::for_category("Acme", category, &device);
            assert_eq!(decl.desc.child_value("manufacturer"), Some("Tobii"));
            assert_eq!(decl.desc.child_value("model"), Some("Eye Tracker 5"));
            assert_eq!(decl.desc.child_value("serial"), Some("ET5-1234"));
            assert_eq!(decl.desc.child_value("generation"), Some("IS5"));
            assert_eq!(decl.desc.child_value("firmware"), Some("2.1.0"));

            let channels = decl.desc.child("channels").unwrap();
            assert_eq!(channels.children.len(), decl.channel_count);
        }
    }

    #[test]
    fn test_gaze_channel_descriptions() {
        let decl = StreamDeclaration::for_category("B", EventCategory::Gaze, &acme_device());
        let channels = decl.desc.child("channels").unwrap();
        let labels: Vec<_> = channels
            .children
            .iter()
            .map(|c| c.child_value("label").unwrap())
            .collect();
        assert_eq!(labels, vec!["x", "y"]);
        assert_eq!(channels.children[0].child_value("unit"), Some("normalized"));
        assert_eq!(channels.children[0].child_value("type"), Some("screen"));
    }

    #[test]
    fn test_accepts_checks_shape() {
        let decl = StreamDeclaration::for_category("B", EventCategory::Gaze, &acme_device());
        assert!(decl.accepts(&Sample::numeric(vec![0.1, 0.2], 1.0)));
        assert!(!decl.accepts(&Sample::numeric(vec![0.1], 1.0)));
        assert!(!decl.accepts(&Sample::text("x", 1.0)));
    }
}
