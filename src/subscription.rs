//! Event subscription set.
//!
//! Binds one [`EventHandler`] per [`EventCategory`] to a device session. The
//! set mirrors the driver exactly: a category is recorded as active only
//! after the driver accepted the subscription, so teardown unsubscribes
//! precisely what was subscribed.
//!
//! Handlers never run on their own. The set is the [`EventSink`] handed to
//! `process_callbacks`, so every handler runs synchronously inside the
//! acquisition loop's dispatch call.

use crate::publisher::StreamOutlet;
use crate::translate::{self, InvalidGazePolicy};
use bridge_core::{DeviceEvent, DeviceSession, EventCategory, EventSink, SubscriptionError};
use tracing::{debug, trace, warn};

/// Turns device events of one category into outbound samples.
pub trait EventHandler {
    /// Category this handler consumes.
    fn category(&self) -> EventCategory;

    /// Outbound stream the samples go to.
    fn stream_name(&self) -> &str;

    /// Translate and publish one event. Events of other categories are ignored.
    fn handle(&mut self, event: &DeviceEvent);
}

/// Publishes gaze points as two-channel float samples.
pub struct GazeHandler {
    outlet: Box<dyn StreamOutlet>,
    policy: InvalidGazePolicy,
}

impl GazeHandler {
    /// Handler publishing to `outlet`.
    pub fn new(outlet: Box<dyn StreamOutlet>, policy: InvalidGazePolicy) -> Self {
        Self { outlet, policy }
    }
}

impl EventHandler for GazeHandler {
    fn category(&self) -> EventCategory {
        EventCategory::Gaze
    }

    fn stream_name(&self) -> &str {
        &self.outlet.declaration().name
    }

    fn handle(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::Gaze(gaze) = event {
            if let Some(sample) = translate::gaze_sample(gaze, self.policy) {
                self.outlet.push(sample);
            }
        }
    }
}

/// Publishes presence changes as string markers.
pub struct PresenceHandler {
    outlet: Box<dyn StreamOutlet>,
}

impl PresenceHandler {
    /// Handler publishing to `outlet`.
    pub fn new(outlet: Box<dyn StreamOutlet>) -> Self {
        Self { outlet }
    }
}

impl EventHandler for PresenceHandler {
    fn category(&self) -> EventCategory {
        EventCategory::Presence
    }

    fn stream_name(&self) -> &str {
        &self.outlet.declaration().name
    }

    fn handle(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::Presence(presence) = event {
            self.outlet.push(translate::presence_sample(presence));
        }
    }
}

/// Publishes the notification kinds that have a marker text.
pub struct NotificationHandler {
    outlet: Box<dyn StreamOutlet>,
}

impl NotificationHandler {
    /// Handler publishing to `outlet`.
    pub fn new(outlet: Box<dyn StreamOutlet>) -> Self {
        Self { outlet }
    }
}

impl EventHandler for NotificationHandler {
    fn category(&self) -> EventCategory {
        EventCategory::Notifications
    }

    fn stream_name(&self) -> &str {
        &self.outlet.declaration().name
    }

    fn handle(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::Notification(notification) = event {
            if let Some(sample) = translate::notification_sample(notification) {
                self.outlet.push(sample);
            }
        }
    }
}

/// Handler for `category` publishing to `outlet`.
pub fn handler_for(
    category: EventCategory,
    outlet: Box<dyn StreamOutlet>,
    policy: InvalidGazePolicy,
) -> Box<dyn EventHandler> {
    match category {
        EventCategory::Gaze => Box::new(GazeHandler::new(outlet, policy)),
        EventCategory::Presence => Box::new(PresenceHandler::new(outlet)),
        EventCategory::Notifications => Box::new(NotificationHandler::new(outlet)),
    }
}

/// Active subscriptions of one session, in subscription order.
#[derive(Default)]
pub struct SubscriptionSet {
    active: Vec<(EventCategory, Box<dyn EventHandler>)>,
    delivered: u64,
}

impl SubscriptionSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` with the driver for its category.
    ///
    /// On failure the set is unchanged; earlier subscriptions stay active.
    pub fn subscribe<S: DeviceSession>(
        &mut self,
        session: &mut S,
        handler: Box<dyn EventHandler>,
    ) -> Result<(), SubscriptionError> {
        let category = handler.category();
        if self.is_active(category) {
            return Err(SubscriptionError::AlreadyActive { category });
        }
        session
            .subscribe(category)
            .map_err(|source| SubscriptionError::Subscribe { category, source })?;

        debug!(%category, stream = handler.stream_name(), "Subscribed");
        self.active.push((category, handler));
        Ok(())
    }

    /// Remove an active subscription. Inactive categories are rejected
    /// without calling the driver.
    pub fn unsubscribe<S: DeviceSession>(
        &mut self,
        session: &mut S,
        category: EventCategory,
    ) -> Result<(), SubscriptionError> {
        let index = self
            .active
            .iter()
            .position(|(c, _)| *c == category)
            .ok_or(SubscriptionError::NotActive { category })?;
        session
            .unsubscribe(category)
            .map_err(|source| SubscriptionError::Unsubscribe { category, source })?;

        self.active.remove(index);
        debug!(%category, "Unsubscribed");
        Ok(())
    }

    /// Unsubscribe everything in reverse subscription order.
    ///
    /// Every category is attempted once and leaves the set even when the
    /// driver refuses; the refusals are returned.
    pub fn unsubscribe_all<S: DeviceSession>(
        &mut self,
        session: &mut S,
    ) -> Vec<SubscriptionError> {
        let mut errors = Vec::new();
        while let Some((category, _handler)) = self.active.pop() {
            match session.unsubscribe(category) {
                Ok(()) => debug!(%category, "Unsubscribed"),
                Err(source) => {
                    warn!(%category, error = %source, "Unsubscribe failed during teardown");
                    errors.push(SubscriptionError::Unsubscribe { category, source });
                }
            }
        }
        errors
    }

    /// Whether `category` is currently subscribed.
    pub fn is_active(&self, category: EventCategory) -> bool {
        self.active.iter().any(|(c, _)| *c == category)
    }

    /// Active categories in subscription order.
    pub fn active_categories(&self) -> Vec<EventCategory> {
        self.active.iter().map(|(c, _)| *c).collect()
    }

    /// Whether nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Events routed to a handler so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl EventSink for SubscriptionSet {
    fn deliver(&mut self, event: DeviceEvent) {
        let category = event.category();
        match self.active.iter_mut().find(|(c, _)| *c == category) {
            Some((_, handler)) => {
                handler.handle(&event);
                self.delivered += 1;
            }
            None => trace!(
                %category,
                timestamp_us = event.timestamp_us(),
                "Event without an active handler"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{LocalStreamHub, StreamDeclaration, StreamPublisher};
    use bridge_core::{
        DeviceApi, DeviceDriver, DeviceEndpoint, DeviceInfo, DriverErrorKind, GazePoint,
    };
    use bridge_driver_mock::{DriverCall, Scenario, SimulatedDriver};

    const URL: &str = "tobii-ttp://sub-test";

    fn device() -> DeviceInfo {
        DeviceInfo {
            manufacturer: "Tobii".into(),
            model: "Sim".into(),
            serial_number: "S".into(),
            generation: "G".into(),
            firmware_version: "1".into(),
        }
    }

    fn handler(hub: &LocalStreamHub, category: EventCategory) -> Box<dyn EventHandler> {
        let outlet = hub
            .declare(StreamDeclaration::for_category("T", category, &device()))
            .unwrap();
        handler_for(category, outlet, InvalidGazePolicy::Placeholder)
    }

    #[test]
    fn test_unsubscribe_inactive_does_not_call_driver() {
        let driver = SimulatedDriver::new(Scenario::single_device(URL));
        let journal = driver.journal();
        let api = driver.create_api().unwrap();
        let mut session = api.create_session(&DeviceEndpoint::new(URL)).unwrap();
        let mut set = SubscriptionSet::new();

        let err = set
            .unsubscribe(&mut session, EventCategory::Presence)
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::NotActive { .. }));
        assert_eq!(
            journal.count(&DriverCall::Unsubscribe(EventCategory::Presence)),
            0
        );

        session.destroy().unwrap();
        api.destroy().unwrap();
    }

    #[test]
    fn test_failed_subscribe_keeps_earlier_ones() {
        let driver = SimulatedDriver::new(
            Scenario::single_device(URL)
                .failing_subscribe(EventCategory::Notifications, DriverErrorKind::NotSupported),
        );
        let journal = driver.journal();
        let hub = LocalStreamHub::new();
        let api = driver.create_api().unwrap();
        let mut session = api.create_session(&DeviceEndpoint::new(URL)).unwrap();
        let mut set = SubscriptionSet::new();

        set.subscribe(&mut session, handler(&hub, EventCategory::Gaze))
            .unwrap();
        set.subscribe(&mut session, handler(&hub, EventCategory::Presence))
            .unwrap();
        assert!(set
            .subscribe(&mut session, handler(&hub, EventCategory::Notifications))
            .is_err());
        assert_eq!(
            set.active_categories(),
            vec![EventCategory::Gaze, EventCategory::Presence]
        );

        assert!(set.unsubscribe_all(&mut session).is_empty());
        assert!(set.is_empty());
        let tail: Vec<_> = journal
            .calls()
            .into_iter()
            .filter(|c| matches!(c, DriverCall::Unsubscribe(_)))
            .collect();
        assert_eq!(
            tail,
            vec![
                DriverCall::Unsubscribe(EventCategory::Presence),
                DriverCall::Unsubscribe(EventCategory::Gaze),
            ]
        );

        session.destroy().unwrap();
        api.destroy().unwrap();
    }

    #[test]
    fn test_double_subscribe_rejected_locally() {
        let driver = SimulatedDriver::new(Scenario::single_device(URL));
        let journal = driver.journal();
        let hub = LocalStreamHub::new();
        let api = driver.create_api().unwrap();
        let mut session = api.create_session(&DeviceEndpoint::new(URL)).unwrap();
        let mut set = SubscriptionSet::new();

        set.subscribe(&mut session, handler(&hub, EventCategory::Gaze))
            .unwrap();
        let err = set
            .subscribe(&mut session, handler(&hub, EventCategory::Gaze))
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::AlreadyActive { .. }));
        assert_eq!(journal.count(&DriverCall::Subscribe(EventCategory::Gaze)), 1);

        set.unsubscribe(&mut session, EventCategory::Gaze).unwrap();
        assert!(!set.is_active(EventCategory::Gaze));
        session.destroy().unwrap();
        api.destroy().unwrap();
    }

    #[test]
    fn test_sink_routes_by_category() {
        let hub = LocalStreamHub::new();
        let mut rx = hub.subscribe("T_gaze");
        let driver = SimulatedDriver::new(Scenario::single_device(URL));
        let api = driver.create_api().unwrap();
        let mut session = api.create_session(&DeviceEndpoint::new(URL)).unwrap();
        let mut set = SubscriptionSet::new();
        set.subscribe(&mut session, handler(&hub, EventCategory::Gaze))
            .unwrap();

        set.deliver(DeviceEvent::Gaze(GazePoint::valid(1_000_000, 0.5, 0.5)));
        set.deliver(DeviceEvent::Presence(bridge_core::PresenceEvent {
            status: bridge_core::PresenceStatus::Away,
            timestamp_us: 2,
        }));

        assert_eq!(rx.try_recv().unwrap().timestamp, 1.0);
        assert_eq!(set.delivered(), 1);

        set.unsubscribe_all(&mut session);
        session.destroy().unwrap();
        api.destroy().unwrap();
    }

    #[test]
    fn test_handlers_publish_to_their_declared_stream() {
        let hub = LocalStreamHub::new();
        for (category, stream) in [
            (EventCategory::Gaze, "T_gaze"),
            (EventCategory::Presence, "T_presence"),
            (EventCategory::Notifications, "T_notifications"),
        ] {
            let bound = handler(&hub, category);
            assert_eq!(bound.category(), category);
            assert_eq!(bound.stream_name(), stream);
        }
    }
}
