//! In-process stream hub.

use super::{PublishError, Sample, StreamDeclaration, StreamOutlet, StreamPublisher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 4096;

struct StreamEntry {
    declaration: Option<StreamDeclaration>,
    sender: broadcast::Sender<Sample>,
}

/// Named broadcast channels standing in for network stream outlets.
///
/// Consumers may [`subscribe`](LocalStreamHub::subscribe) to a stream name
/// before any recording declares it. Samples pushed while nobody listens are
/// discarded, the same as an outlet without inlets.
#[derive(Clone)]
pub struct LocalStreamHub {
    streams: Arc<Mutex<HashMap<String, StreamEntry>>>,
    capacity: usize,
}

impl Default for LocalStreamHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LocalStreamHub {
    /// Hub with the default per-stream buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub whose per-stream buffers hold `capacity` samples per lagging consumer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            streams: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Receive every sample pushed to `name` from now on.
    pub fn subscribe(&self, name: &str) -> broadcast::Receiver<Sample> {
        let mut streams = self.streams.lock();
        streams
            .entry(name.to_string())
            .or_insert_with(|| StreamEntry {
                declaration: None,
                sender: broadcast::channel(self.capacity).0,
            })
            .sender
            .subscribe()
    }

    /// Declaration of `name`, once a publisher declared it.
    pub fn declaration(&self, name: &str) -> Option<StreamDeclaration> {
        self.streams
            .lock()
            .get(name)
            .and_then(|entry| entry.declaration.clone())
    }

    /// Names of all declared streams, sorted.
    pub fn declared_streams(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .streams
            .lock()
            .iter()
            .filter(|(_, entry)| entry.declaration.is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl StreamPublisher for LocalStreamHub {
    fn declare(
        &self,
        declaration: StreamDeclaration,
    ) -> Result<Box<dyn StreamOutlet>, PublishError> {
        let mut streams = self.streams.lock();
        let entry = streams
            .entry(declaration.name.clone())
            .or_insert_with(|| StreamEntry {
                declaration: None,
                sender: broadcast::channel(self.capacity).0,
            });

        if let Some(existing) = &entry.declaration {
            if !existing.same_identity(&declaration) {
                return Err(PublishError::Conflict {
                    name: declaration.name,
                });
            }
        }
        entry.declaration = Some(declaration.clone());

        debug!(
            stream = %declaration.name,
            source_id = %declaration.source_id,
            channels = declaration.channel_count,
            "Declared local stream"
        );
        Ok(Box::new(LocalOutlet {
            declaration,
            sender: entry.sender.clone(),
        }))
    }
}

/// Outlet handed out by [`LocalStreamHub`].
pub struct LocalOutlet {
    declaration: StreamDeclaration,
    sender: broadcast::Sender<Sample>,
}

impl StreamOutlet for LocalOutlet {
    fn declaration(&self) -> &StreamDeclaration {
        &self.declaration
    }

    fn push(&self, sample: Sample) {
        if !self.declaration.accepts(&sample) {
            warn!(
                stream = %self.declaration.name,
                "Dropping sample that does not match the stream format"
            );
            return;
        }
        // No receivers is not an error for an outlet.
        let _ = self.sender.send(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{DeviceInfo, EventCategory};

    fn device() -> DeviceInfo {
        DeviceInfo {
            manufacturer: "Tobii".to_string(),
            model: "Sim".to_string(),
            serial_number: "S1".to_string(),
            generation: "G".to_string(),
            firmware_version: "1".to_string(),
        }
    }

    #[test]
    fn test_subscribe_before_declare_receives_samples() {
        let hub = LocalStreamHub::new();
        let mut rx = hub.subscribe("Acme_gaze");

        let outlet = hub
            .declare(StreamDeclaration::for_category(
                "Acme",
                EventCategory::Gaze,
                &device(),
            ))
            .unwrap();
        outlet.push(Sample::numeric(vec![0.25, 0.75], 1.5));

        let sample = rx.try_recv().unwrap();
        assert_eq!(sample, Sample::numeric(vec![0.25, 0.75], 1.5));
        assert_eq!(hub.declared_streams(), vec!["Acme_gaze".to_string()]);
    }

    #[test]
    fn test_redeclare_same_identity_reuses_channel() {
        let hub = LocalStreamHub::new();
        let decl = StreamDeclaration::for_category("A", EventCategory::Presence, &device());
        let first = hub.declare(decl.clone()).unwrap();
        let mut rx = hub.subscribe("A_presence");
        let second = hub.declare(decl).unwrap();

        first.push(Sample::text("one", 1.0));
        second.push(Sample::text("two", 2.0));
        assert_eq!(rx.try_recv().unwrap().timestamp, 1.0);
        assert_eq!(rx.try_recv().unwrap().timestamp, 2.0);
    }

    #[test]
    fn test_conflicting_declaration_is_rejected() {
        let hub = LocalStreamHub::new();
        let decl = StreamDeclaration::for_category("A", EventCategory::Gaze, &device());
        hub.declare(decl.clone()).unwrap();

        let mut other = decl;
        other.channel_count = 3;
        assert!(matches!(
            hub.declare(other),
            Err(PublishError::Conflict { .. })
        ));
    }

    #[test]
    fn test_mismatched_sample_is_dropped() {
        let hub = LocalStreamHub::new();
        let mut rx = hub.subscribe("A_gaze");
        let outlet = hub
            .declare(StreamDeclaration::for_category(
                "A",
                EventCategory::Gaze,
                &device(),
            ))
            .unwrap();

        outlet.push(Sample::text("not gaze", 1.0));
        assert!(rx.try_recv().is_err());
    }
}
