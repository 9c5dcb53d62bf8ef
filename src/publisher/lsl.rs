//! Lab Streaming Layer backend.

use super::{
    ChannelFormat, MetadataNode, PublishError, Sample, SampleValues, StreamDeclaration,
    StreamOutlet, StreamPublisher,
};
use lsl::{ExPushable, XMLElement};
use tracing::{debug, warn};

/// Outlet buffer length in seconds.
const MAX_BUFFERED_S: i32 = 360;

/// Publishes each declaration as a real LSL outlet on the local network.
#[derive(Debug, Default, Clone, Copy)]
pub struct LslPublisher;

impl LslPublisher {
    /// Publisher for the local LSL network.
    pub fn new() -> Self {
        Self
    }
}

fn copy_children(node: &MetadataNode, target: &mut XMLElement) {
    for child in &node.children {
        match &child.value {
            Some(value) => {
                target.append_child_value(&child.name, value);
            }
            None => {
                let mut element = target.append_child(&child.name);
                copy_children(child, &mut element);
            }
        }
    }
}

impl StreamPublisher for LslPublisher {
    fn declare(
        &self,
        declaration: StreamDeclaration,
    ) -> Result<Box<dyn StreamOutlet>, PublishError> {
        let format = match declaration.format {
            ChannelFormat::Float32 => lsl::ChannelFormat::Float32,
            ChannelFormat::String => lsl::ChannelFormat::String,
        };
        let channel_count = u32::try_from(declaration.channel_count)
            .map_err(|_| PublishError::Backend("channel count out of range".to_string()))?;

        let mut info = lsl::StreamInfo::new(
            &declaration.name,
            &declaration.content_type,
            channel_count,
            declaration.nominal_rate,
            format,
            &declaration.source_id,
        )
        .map_err(|e| PublishError::Backend(e.to_string()))?;
        let mut desc = info.desc();
        copy_children(&declaration.desc, &mut desc);

        let outlet = lsl::StreamOutlet::new(&info, 0, MAX_BUFFERED_S)
            .map_err(|e| PublishError::Backend(e.to_string()))?;
        debug!(stream = %declaration.name, "Declared LSL outlet");

        Ok(Box::new(LslOutlet {
            declaration,
            outlet,
        }))
    }
}

struct LslOutlet {
    declaration: StreamDeclaration,
    outlet: lsl::StreamOutlet,
}

impl StreamOutlet for LslOutlet {
    fn declaration(&self) -> &StreamDeclaration {
        &self.declaration
    }

    fn push(&self, sample: Sample) {
        let result = match sample.values {
            SampleValues::Numeric(values) => {
                self.outlet.push_sample_ex(&values, sample.timestamp, true)
            }
            SampleValues::Text(text) => {
                self.outlet.push_sample_ex(&vec![text], sample.timestamp, true)
            }
        };
        if let Err(e) = result {
            warn!(stream = %self.declaration.name, error = %e, "LSL push failed");
        }
    }
}
