//! Simulated driver, API context and session.

use crate::clock::SimClock;
use crate::journal::{CallJournal, DriverCall};
use crate::scenario::{Scenario, Step};
use bridge_core::{
    DeviceApi, DeviceDriver, DeviceEndpoint, DeviceEvent, DeviceInfo, DeviceSession, DriverError,
    DriverErrorKind, EventCategory, EventSink, GazePoint, PresenceEvent, PresenceStatus,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Probability that a synthetic gaze sample reports tracking loss.
const SYNTHETIC_INVALID_RATE: f64 = 0.02;
/// Probability per synthetic sample that the user walks away or comes back.
const SYNTHETIC_PRESENCE_FLIP_RATE: f64 = 0.002;

/// Mutable state shared by the driver and everything it creates.
#[derive(Debug)]
struct SimState {
    scenario: Scenario,
    clock: SimClock,
    live_sessions: usize,
    rng: StdRng,
    free_run: Option<FreeRun>,
}

#[derive(Debug)]
struct FreeRun {
    period: Duration,
    next_sample_at: Instant,
    position: [f32; 2],
    present: bool,
}

/// What the next `process_callbacks` call will do.
#[derive(Debug)]
enum Pending {
    Events(Vec<DeviceEvent>),
    Error(DriverErrorKind),
}

/// Outcome of popping the next scripted step while holding the state lock.
enum WaitPlan {
    Ready(Pending),
    Fail(DriverError),
    Sleep(Duration, bool),
}

// =============================================================================
// Driver
// =============================================================================

/// Hardware-free [`DeviceDriver`] driven by a [`Scenario`].
///
/// Script queues live in the driver, so they are consumed once across every
/// API context it creates.
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    state: Arc<Mutex<SimState>>,
    journal: CallJournal,
}

impl SimulatedDriver {
    /// Driver playing back `scenario`.
    pub fn new(scenario: Scenario) -> Self {
        let rng = if scenario.free_run_period.is_some() {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(0x5eed)
        };
        let free_run = scenario.free_run_period.map(|period| FreeRun {
            period,
            next_sample_at: Instant::now(),
            position: [0.5, 0.5],
            present: true,
        });
        let state = SimState {
            clock: SimClock::new(scenario.clock),
            scenario,
            live_sessions: 0,
            rng,
            free_run,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            journal: CallJournal::new(),
        }
    }

    /// Journal of every resource-affecting call made through this driver.
    pub fn journal(&self) -> CallJournal {
        self.journal.clone()
    }
}

impl DeviceDriver for SimulatedDriver {
    type Api = SimulatedApi;

    fn name(&self) -> &str {
        "simulated"
    }

    fn create_api(&self) -> Result<SimulatedApi, DriverError> {
        self.journal.record(DriverCall::CreateApi);
        if let Some(kind) = self.state.lock().scenario.create_api_error {
            return Err(DriverError::new(kind, "simulated API creation failure"));
        }
        Ok(SimulatedApi {
            state: Arc::clone(&self.state),
            journal: self.journal.clone(),
            destroyed: false,
        })
    }
}

// =============================================================================
// API context
// =============================================================================

/// Simulated process context.
#[derive(Debug)]
pub struct SimulatedApi {
    state: Arc<Mutex<SimState>>,
    journal: CallJournal,
    destroyed: bool,
}

impl DeviceApi for SimulatedApi {
    type Session = SimulatedSession;

    fn enumerate_endpoints(&self) -> Result<Vec<DeviceEndpoint>, DriverError> {
        self.journal.record(DriverCall::Enumerate);
        let state = self.state.lock();
        match state.scenario.enumerate_error {
            Some(kind) => Err(DriverError::new(kind, "simulated enumeration failure")),
            None => Ok(state.scenario.endpoints.clone()),
        }
    }

    fn create_session(&self, endpoint: &DeviceEndpoint) -> Result<SimulatedSession, DriverError> {
        self.journal
            .record(DriverCall::CreateSession(endpoint.as_str().to_string()));
        let mut state = self.state.lock();

        if !state.scenario.endpoints.contains(endpoint) {
            return Err(DriverError::new(
                DriverErrorKind::NotAvailable,
                format!("no simulated device at '{}'", endpoint),
            ));
        }
        let failure = state
            .scenario
            .connect_script
            .pop_front()
            .or(state.scenario.connect_fallback);
        if let Some(kind) = failure {
            return Err(DriverError::new(kind, "simulated connect failure"));
        }

        state.live_sessions += 1;
        Ok(SimulatedSession {
            endpoint: endpoint.clone(),
            state: Arc::clone(&self.state),
            journal: self.journal.clone(),
            subscribed: HashSet::new(),
            connected: true,
            pending: None,
            destroyed: false,
        })
    }

    fn system_clock_us(&self) -> Result<i64, DriverError> {
        Ok(self.state.lock().clock.read())
    }

    fn destroy(mut self) -> Result<(), DriverError> {
        self.destroyed = true;
        self.journal.record(DriverCall::DestroyApi);
        let live = self.state.lock().live_sessions;
        if live > 0 {
            return Err(DriverError::new(
                DriverErrorKind::OperationFailed,
                format!("{} session(s) still open", live),
            ));
        }
        Ok(())
    }
}

impl Drop for SimulatedApi {
    fn drop(&mut self) {
        if !self.destroyed {
            self.journal.record(DriverCall::LeakedApi);
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Simulated device session.
#[derive(Debug)]
pub struct SimulatedSession {
    endpoint: DeviceEndpoint,
    state: Arc<Mutex<SimState>>,
    journal: CallJournal,
    subscribed: HashSet<EventCategory>,
    connected: bool,
    pending: Option<Pending>,
    destroyed: bool,
}

impl SimulatedSession {
    /// Whether the session is currently connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn release(&mut self) {
        self.destroyed = true;
        let mut state = self.state.lock();
        state.live_sessions = state.live_sessions.saturating_sub(1);
    }

    fn plan_wait(&mut self, timeout: Duration) -> WaitPlan {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.scenario.steps.pop_front() {
            Some(Step::Events(events)) => return WaitPlan::Ready(Pending::Events(events)),
            Some(Step::DispatchError(kind)) => return WaitPlan::Ready(Pending::Error(kind)),
            Some(Step::Timeout) => return WaitPlan::Fail(DriverError::timed_out()),
            Some(Step::WaitError(kind)) => {
                return WaitPlan::Fail(DriverError::new(kind, "simulated wait failure"))
            }
            None => {}
        }

        let Some(free_run) = state.free_run.as_mut() else {
            return WaitPlan::Sleep(timeout, false);
        };
        let until_next = free_run
            .next_sample_at
            .saturating_duration_since(Instant::now());
        if until_next > timeout {
            return WaitPlan::Sleep(timeout, false);
        }
        free_run.next_sample_at += free_run.period;
        WaitPlan::Sleep(until_next, true)
    }

    fn synthesize(&mut self) -> Vec<DeviceEvent> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let now_us = state.clock.read();
        let rng = &mut state.rng;
        let Some(free_run) = state.free_run.as_mut() else {
            return Vec::new();
        };

        let mut events = Vec::with_capacity(2);
        if rng.gen_bool(SYNTHETIC_PRESENCE_FLIP_RATE) {
            free_run.present = !free_run.present;
            events.push(DeviceEvent::Presence(PresenceEvent {
                status: if free_run.present {
                    PresenceStatus::Present
                } else {
                    PresenceStatus::Away
                },
                timestamp_us: now_us,
            }));
        }

        if !free_run.present || rng.gen_bool(SYNTHETIC_INVALID_RATE) {
            events.push(DeviceEvent::Gaze(GazePoint::invalid(now_us)));
        } else {
            for axis in free_run.position.iter_mut() {
                *axis = (*axis + rng.gen_range(-0.02..0.02)).clamp(0.0, 1.0);
            }
            let [x, y] = free_run.position;
            events.push(DeviceEvent::Gaze(GazePoint::valid(now_us, x, y)));
        }
        events
    }
}

impl DeviceSession for SimulatedSession {
    fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    fn reconnect(&mut self) -> Result<(), DriverError> {
        self.journal.record(DriverCall::Reconnect);
        let failure = {
            let mut state = self.state.lock();
            state
                .scenario
                .reconnect_script
                .pop_front()
                .or(state.scenario.reconnect_fallback)
        };
        match failure {
            Some(kind) => Err(DriverError::new(kind, "simulated reconnect failure")),
            None => {
                self.connected = true;
                Ok(())
            }
        }
    }

    fn device_info(&self) -> Result<DeviceInfo, DriverError> {
        self.journal.record(DriverCall::DeviceInfo);
        Ok(self.state.lock().scenario.device_info.clone())
    }

    fn subscribe(&mut self, category: EventCategory) -> Result<(), DriverError> {
        self.journal.record(DriverCall::Subscribe(category));
        if let Some(kind) = self.state.lock().scenario.subscribe_errors.get(&category) {
            return Err(DriverError::new(
                *kind,
                format!("simulated {} subscribe failure", category),
            ));
        }
        if !self.subscribed.insert(category) {
            return Err(DriverError::new(
                DriverErrorKind::AlreadySubscribed,
                format!("{} already subscribed", category),
            ));
        }
        Ok(())
    }

    fn unsubscribe(&mut self, category: EventCategory) -> Result<(), DriverError> {
        self.journal.record(DriverCall::Unsubscribe(category));
        if !self.subscribed.remove(&category) {
            return Err(DriverError::new(
                DriverErrorKind::NotSubscribed,
                format!("{} not subscribed", category),
            ));
        }
        Ok(())
    }

    fn wait_for_callbacks(&mut self, timeout: Duration) -> Result<(), DriverError> {
        if self.pending.is_some() {
            return Ok(());
        }
        if !self.connected {
            std::thread::sleep(timeout);
            return Err(DriverError::connection_failed("device disconnected"));
        }

        match self.plan_wait(timeout) {
            WaitPlan::Ready(pending) => {
                self.pending = Some(pending);
                Ok(())
            }
            WaitPlan::Fail(err) => Err(err),
            WaitPlan::Sleep(duration, sample_due) => {
                std::thread::sleep(duration);
                if sample_due {
                    let events = self.synthesize();
                    self.pending = Some(Pending::Events(events));
                    Ok(())
                } else {
                    Err(DriverError::timed_out())
                }
            }
        }
    }

    fn process_callbacks(&mut self, sink: &mut dyn EventSink) -> Result<(), DriverError> {
        match self.pending.take() {
            None => Ok(()),
            Some(Pending::Events(events)) => {
                for event in events {
                    if self.subscribed.contains(&event.category()) {
                        sink.deliver(event);
                    }
                }
                Ok(())
            }
            Some(Pending::Error(kind)) => {
                if kind == DriverErrorKind::ConnectionFailed {
                    self.connected = false;
                }
                Err(DriverError::new(kind, "simulated dispatch failure"))
            }
        }
    }

    fn update_timesync(&mut self) -> Result<(), DriverError> {
        self.journal.record(DriverCall::UpdateTimesync);
        match self.state.lock().scenario.timesync_error {
            Some(kind) => Err(DriverError::new(kind, "simulated timesync failure")),
            None => Ok(()),
        }
    }

    fn destroy(mut self) -> Result<(), DriverError> {
        self.journal.record(DriverCall::DestroySession);
        self.release();
        if !self.subscribed.is_empty() {
            return Err(DriverError::new(
                DriverErrorKind::OperationFailed,
                format!("{} subscription(s) still active", self.subscribed.len()),
            ));
        }
        Ok(())
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        if !self.destroyed {
            self.journal.record(DriverCall::LeakedSession);
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{Notification, NotificationKind};

    const URL: &str = "tobii-ttp://sim-test";

    fn gaze(ts: i64) -> DeviceEvent {
        DeviceEvent::Gaze(GazePoint::valid(ts, 0.1, 0.2))
    }

    #[test]
    fn test_connect_script_then_success() {
        let driver = SimulatedDriver::new(
            Scenario::single_device(URL).connect_failures(DriverErrorKind::ConnectionFailed, 2),
        );
        let api = driver.create_api().unwrap();
        let endpoint = DeviceEndpoint::new(URL);

        assert!(api.create_session(&endpoint).is_err());
        assert!(api.create_session(&endpoint).is_err());
        let session = api.create_session(&endpoint).unwrap();

        session.destroy().unwrap();
        api.destroy().unwrap();
        assert_eq!(driver.journal().connect_attempts(), 3);
    }

    #[test]
    fn test_dispatch_filters_unsubscribed_categories() {
        let notification = DeviceEvent::Notification(Notification {
            kind: NotificationKind::TrackboxChanged,
            timestamp_us: 5,
        });
        let driver = SimulatedDriver::new(
            Scenario::single_device(URL).then_events(vec![gaze(1), notification]),
        );
        let api = driver.create_api().unwrap();
        let mut session = api.create_session(&DeviceEndpoint::new(URL)).unwrap();
        session.subscribe(EventCategory::Gaze).unwrap();

        let mut seen = Vec::new();
        session
            .wait_for_callbacks(Duration::from_millis(10))
            .unwrap();
        session
            .process_callbacks(&mut |event: DeviceEvent| seen.push(event))
            .unwrap();
        assert_eq!(seen, vec![gaze(1)]);

        session.unsubscribe(EventCategory::Gaze).unwrap();
        session.destroy().unwrap();
        api.destroy().unwrap();
    }

    #[test]
    fn test_double_subscribe_is_rejected() {
        let driver = SimulatedDriver::new(Scenario::single_device(URL));
        let api = driver.create_api().unwrap();
        let mut session = api.create_session(&DeviceEndpoint::new(URL)).unwrap();

        session.subscribe(EventCategory::Presence).unwrap();
        let err = session.subscribe(EventCategory::Presence).unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::AlreadySubscribed);
        let err = session.unsubscribe(EventCategory::Gaze).unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::NotSubscribed);

        session.unsubscribe(EventCategory::Presence).unwrap();
        session.destroy().unwrap();
        api.destroy().unwrap();
    }

    #[test]
    fn test_connection_loss_and_reconnect() {
        let driver = SimulatedDriver::new(
            Scenario::single_device(URL).then_dispatch_error(DriverErrorKind::ConnectionFailed),
        );
        let api = driver.create_api().unwrap();
        let mut session = api.create_session(&DeviceEndpoint::new(URL)).unwrap();

        session.wait_for_callbacks(Duration::from_millis(1)).unwrap();
        let err = session.process_callbacks(&mut |_: DeviceEvent| {}).unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::ConnectionFailed);
        assert!(!session.is_connected());

        session.reconnect().unwrap();
        assert!(session.is_connected());
        session.destroy().unwrap();
        api.destroy().unwrap();
    }

    #[test]
    fn test_empty_script_times_out() {
        let driver = SimulatedDriver::new(Scenario::single_device(URL));
        let api = driver.create_api().unwrap();
        let mut session = api.create_session(&DeviceEndpoint::new(URL)).unwrap();

        let err = session
            .wait_for_callbacks(Duration::from_millis(1))
            .unwrap_err();
        assert!(err.is_timeout());
        session.destroy().unwrap();
        api.destroy().unwrap();
    }

    #[test]
    fn test_leaks_and_out_of_order_teardown_are_detected() {
        let driver = SimulatedDriver::new(Scenario::single_device(URL));
        let journal = driver.journal();
        {
            let api = driver.create_api().unwrap();
            let session = api.create_session(&DeviceEndpoint::new(URL)).unwrap();
            assert!(matches!(
                api.destroy(),
                Err(DriverError {
                    kind: DriverErrorKind::OperationFailed,
                    ..
                })
            ));
            drop(session);
        }
        assert_eq!(journal.count(&DriverCall::LeakedSession), 1);
        assert_eq!(journal.count(&DriverCall::LeakedApi), 0);
    }

    #[test]
    fn test_free_running_produces_gaze() {
        let driver = SimulatedDriver::new(Scenario::free_running(URL, 500.0));
        let api = driver.create_api().unwrap();
        let mut session = api.create_session(&DeviceEndpoint::new(URL)).unwrap();
        session.subscribe(EventCategory::Gaze).unwrap();

        let mut gaze_count = 0;
        for _ in 0..20 {
            if session.wait_for_callbacks(Duration::from_millis(50)).is_ok() {
                session
                    .process_callbacks(&mut |event: DeviceEvent| {
                        if event.category() == EventCategory::Gaze {
                            gaze_count += 1;
                        }
                    })
                    .unwrap();
            }
        }
        assert!(gaze_count > 0);

        session.unsubscribe(EventCategory::Gaze).unwrap();
        session.destroy().unwrap();
        api.destroy().unwrap();
    }
}
