//! Scripted behaviour for the simulated driver.

use crate::clock::ClockMode;
use bridge_core::{DeviceEndpoint, DeviceEvent, DeviceInfo, DriverErrorKind, EventCategory};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// One scripted wait/dispatch cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Wait succeeds, dispatch delivers these events
    Events(Vec<DeviceEvent>),
    /// Wait times out immediately
    Timeout,
    /// Wait fails with this error
    WaitError(DriverErrorKind),
    /// Wait succeeds, dispatch fails with this error.
    /// `ConnectionFailed` also marks the session disconnected.
    DispatchError(DriverErrorKind),
}

/// Builder describing how a [`SimulatedDriver`](crate::SimulatedDriver) behaves.
///
/// Outcome queues are consumed front to back. Once a queue is empty the
/// matching fallback applies (success unless configured otherwise).
#[derive(Debug, Clone)]
pub struct Scenario {
    pub(crate) endpoints: Vec<DeviceEndpoint>,
    pub(crate) device_info: DeviceInfo,
    pub(crate) create_api_error: Option<DriverErrorKind>,
    pub(crate) enumerate_error: Option<DriverErrorKind>,
    pub(crate) connect_script: VecDeque<DriverErrorKind>,
    pub(crate) connect_fallback: Option<DriverErrorKind>,
    pub(crate) reconnect_script: VecDeque<DriverErrorKind>,
    pub(crate) reconnect_fallback: Option<DriverErrorKind>,
    pub(crate) subscribe_errors: HashMap<EventCategory, DriverErrorKind>,
    pub(crate) timesync_error: Option<DriverErrorKind>,
    pub(crate) steps: VecDeque<Step>,
    pub(crate) clock: ClockMode,
    pub(crate) free_run_period: Option<Duration>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            device_info: DeviceInfo {
                manufacturer: "Tobii".to_string(),
                model: "Simulated Tracker".to_string(),
                serial_number: "SIM-0001".to_string(),
                generation: "SIM".to_string(),
                firmware_version: "0.0.0".to_string(),
            },
            create_api_error: None,
            enumerate_error: None,
            connect_script: VecDeque::new(),
            connect_fallback: None,
            reconnect_script: VecDeque::new(),
            reconnect_fallback: None,
            subscribe_errors: HashMap::new(),
            timesync_error: None,
            steps: VecDeque::new(),
            clock: ClockMode::default(),
            free_run_period: None,
        }
    }
}

impl Scenario {
    /// No reachable devices.
    pub fn no_devices() -> Self {
        Self::default()
    }

    /// Exactly one reachable device at `url`.
    pub fn single_device(url: &str) -> Self {
        Self::default().with_endpoints(vec![DeviceEndpoint::new(url)])
    }

    /// Synthetic gaze stream at `rate_hz` on one device, with a host clock.
    pub fn free_running(url: &str, rate_hz: f64) -> Self {
        let period = Duration::from_secs_f64(1.0 / rate_hz.max(1.0));
        Self {
            free_run_period: Some(period),
            clock: ClockMode::Host,
            ..Self::single_device(url)
        }
    }

    /// Replace the reachable endpoints.
    pub fn with_endpoints(mut self, endpoints: Vec<DeviceEndpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Replace what `device_info` reports.
    pub fn with_device_info(mut self, info: DeviceInfo) -> Self {
        self.device_info = info;
        self
    }

    /// Replace the system clock behaviour.
    pub fn with_clock(mut self, clock: ClockMode) -> Self {
        self.clock = clock;
        self
    }

    /// Creating the API context fails.
    pub fn failing_api(mut self, kind: DriverErrorKind) -> Self {
        self.create_api_error = Some(kind);
        self
    }

    /// Endpoint enumeration fails.
    pub fn failing_enumeration(mut self, kind: DriverErrorKind) -> Self {
        self.enumerate_error = Some(kind);
        self
    }

    /// The next `count` connect attempts fail with `kind`, later ones succeed.
    pub fn connect_failures(mut self, kind: DriverErrorKind, count: usize) -> Self {
        self.connect_script.extend(std::iter::repeat(kind).take(count));
        self
    }

    /// Every connect attempt fails with `kind`.
    pub fn always_fail_connect(mut self, kind: DriverErrorKind) -> Self {
        self.connect_fallback = Some(kind);
        self
    }

    /// The next `count` reconnect attempts fail with `kind`, later ones succeed.
    pub fn reconnect_failures(mut self, kind: DriverErrorKind, count: usize) -> Self {
        self.reconnect_script.extend(std::iter::repeat(kind).take(count));
        self
    }

    /// Every reconnect attempt fails with `kind`.
    pub fn always_fail_reconnect(mut self, kind: DriverErrorKind) -> Self {
        self.reconnect_fallback = Some(kind);
        self
    }

    /// Subscribing to `category` fails with `kind`.
    pub fn failing_subscribe(mut self, category: EventCategory, kind: DriverErrorKind) -> Self {
        self.subscribe_errors.insert(category, kind);
        self
    }

    /// Every timesync request fails with `kind`.
    pub fn failing_timesync(mut self, kind: DriverErrorKind) -> Self {
        self.timesync_error = Some(kind);
        self
    }

    /// Queue one wait/dispatch step.
    pub fn then(mut self, step: Step) -> Self {
        self.steps.push_back(step);
        self
    }

    /// Queue a dispatch delivering `events`.
    pub fn then_events(self, events: Vec<DeviceEvent>) -> Self {
        self.then(Step::Events(events))
    }

    /// Queue a wait that times out.
    pub fn then_timeout(self) -> Self {
        self.then(Step::Timeout)
    }

    /// Queue a dispatch failing with `kind`.
    pub fn then_dispatch_error(self, kind: DriverErrorKind) -> Self {
        self.then(Step::DispatchError(kind))
    }

    /// Queue a wait failing with `kind`.
    pub fn then_wait_error(self, kind: DriverErrorKind) -> Self {
        self.then(Step::WaitError(kind))
    }
}
