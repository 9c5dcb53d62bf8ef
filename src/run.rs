//! One recording run, from API creation to teardown.
//!
//! Resources are acquired in the order API context, session, subscriptions
//! (outlets live inside the subscription handlers) and released in exactly
//! the reverse order by [`RunResources`], whatever ends the run.

use crate::acquisition::{AcquisitionLoop, AcquisitionSettings, LoopExit, ShutdownSignal};
use crate::connection::ConnectionManager;
use crate::directory::{list_endpoints, select_endpoint};
use crate::publisher::{StreamDeclaration, StreamPublisher};
use crate::status::StatusSender;
use crate::subscription::{handler_for, SubscriptionSet};
use bridge_core::{DeviceApi, DeviceDriver, DeviceEndpoint, DeviceSession, EventCategory};
use tracing::{error, info, warn};

/// What the controller asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRequest {
    /// Prefix of every outbound stream name
    pub stream_base_name: String,
    /// Device to record from; empty selects the first enumerated device
    pub endpoint: DeviceEndpoint,
}

/// How a recording run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingOutcome {
    /// Shutdown was requested and everything was released
    StoppedNormally,
    /// Setup failed before acquisition began
    FailedToStart(String),
    /// Acquisition ended on an unrecoverable error
    FailedWhileRunning(String),
}

impl RecordingOutcome {
    /// Anything other than a normal stop.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::StoppedNormally)
    }
}

/// Connection and loop settings for a run.
#[derive(Clone)]
pub struct RunSettings {
    /// Connect and reconnect retry behavior
    pub connection: ConnectionManager,
    /// Acquisition loop tuning
    pub acquisition: AcquisitionSettings,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            connection: ConnectionManager::new(Default::default()),
            acquisition: AcquisitionSettings::default(),
        }
    }
}

/// Owner of every driver resource of one run.
///
/// [`teardown`](RunResources::teardown) unsubscribes in reverse order,
/// destroys the session, then the API context. Each resource is taken out
/// as it is released, so teardown is idempotent and `Drop` repeats it only
/// if nothing ran it before.
pub struct RunResources<A: DeviceApi> {
    api: Option<A>,
    session: Option<A::Session>,
    subscriptions: SubscriptionSet,
}

impl<A: DeviceApi> RunResources<A> {
    /// Take ownership of a freshly created API context.
    pub fn new(api: A) -> Self {
        Self {
            api: Some(api),
            session: None,
            subscriptions: SubscriptionSet::new(),
        }
    }

    /// API context, unless already released.
    pub fn api(&self) -> Option<&A> {
        self.api.as_ref()
    }

    /// Hold `session` until teardown.
    pub fn attach_session(&mut self, session: A::Session) {
        self.session = Some(session);
    }

    /// Borrow everything the loop needs at once.
    pub fn parts(&mut self) -> Option<(&A, &mut A::Session, &mut SubscriptionSet)> {
        match (self.api.as_ref(), self.session.as_mut()) {
            (Some(api), Some(session)) => Some((api, session, &mut self.subscriptions)),
            _ => None,
        }
    }

    /// Release everything still held. Returns the number of release calls
    /// the driver refused.
    pub fn teardown(&mut self) -> usize {
        let mut failures = 0;
        if let Some(session) = self.session.as_mut() {
            failures += self.subscriptions.unsubscribe_all(session).len();
        }
        if let Some(session) = self.session.take() {
            if let Err(e) = session.destroy() {
                warn!(error = %e, "Session destroy failed");
                failures += 1;
            }
        }
        if let Some(api) = self.api.take() {
            if let Err(e) = api.destroy() {
                warn!(error = %e, "API destroy failed");
                failures += 1;
            }
        }
        failures
    }
}

impl<A: DeviceApi> Drop for RunResources<A> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Execute one complete run on the calling thread.
pub fn run_recording<D: DeviceDriver>(
    driver: &D,
    publisher: &dyn StreamPublisher,
    request: &RecordingRequest,
    settings: &RunSettings,
    shutdown: &ShutdownSignal,
    status: &StatusSender,
) -> RecordingOutcome {
    let api = match driver.create_api() {
        Ok(api) => api,
        Err(e) => {
            error!(driver = driver.name(), error = %e, "API creation failed");
            status.send("Failed to initialize the device API.");
            return RecordingOutcome::FailedToStart(e.to_string());
        }
    };
    let mut resources = RunResources::new(api);

    let outcome = match start(&mut resources, publisher, request, settings, status) {
        Err(reason) => {
            status.send(format!("Failed to start: {}", reason));
            RecordingOutcome::FailedToStart(reason)
        }
        Ok(()) => match resources.parts() {
            None => RecordingOutcome::FailedToStart("session missing after start".to_string()),
            Some((api, session, subscriptions)) => {
                let mut acquisition = AcquisitionLoop::new(
                    &settings.connection,
                    settings.acquisition,
                    shutdown,
                    status,
                );
                match acquisition.run(api, session, subscriptions) {
                    LoopExit::Stopped => RecordingOutcome::StoppedNormally,
                    LoopExit::Failed(failure) => {
                        status.send(format!("Recording stopped: {}", failure));
                        RecordingOutcome::FailedWhileRunning(failure.to_string())
                    }
                }
            }
        },
    };

    let failures = resources.teardown();
    if failures > 0 {
        warn!(failures, "Teardown finished with driver errors");
    }
    if outcome.is_failure() {
        warn!(outcome = ?outcome, "Recording run failed");
    } else {
        info!(outcome = ?outcome, "Recording run finished");
    }
    status.send("Recording stopped.");
    outcome
}

fn start<A: DeviceApi>(
    resources: &mut RunResources<A>,
    publisher: &dyn StreamPublisher,
    request: &RecordingRequest,
    settings: &RunSettings,
    status: &StatusSender,
) -> Result<(), String> {
    let api = resources.api().ok_or("API context already released")?;

    let available = list_endpoints(api).unwrap_or_else(|e| {
        warn!(error = %e, "Enumeration failed");
        status.send("Failed to enumerate devices.");
        Vec::new()
    });
    if available.is_empty() {
        status.send("No compatible device found.");
    }
    let endpoint = select_endpoint(&available, &request.endpoint).map_err(|e| e.to_string())?;

    let policy = settings.connection.policy();
    info!(
        endpoint = %endpoint,
        attempts = policy.attempts(),
        interval_ms = policy.interval.as_millis() as u64,
        "Connecting"
    );
    status.send(format!("Connecting to {}.", endpoint));
    let session = settings
        .connection
        .connect(api, &endpoint)
        .map_err(|e| e.to_string())?;
    resources.attach_session(session);

    let (_, session, subscriptions) = resources
        .parts()
        .ok_or("session missing after connect")?;
    let device = session.device_info().map_err(|e| e.to_string())?;
    info!(
        endpoint = %endpoint,
        model = %device.model,
        serial = %device.serial_number,
        firmware = %device.firmware_version,
        "Connected"
    );

    for category in EventCategory::ALL {
        let declaration =
            StreamDeclaration::for_category(&request.stream_base_name, category, &device);
        let outlet = publisher.declare(declaration).map_err(|e| e.to_string())?;
        let handler = handler_for(category, outlet, settings.acquisition.invalid_gaze);
        subscriptions
            .subscribe(session, handler)
            .map_err(|e| e.to_string())?;
    }

    status.send(format!(
        "Recording from {} ({}).",
        device.model, device.serial_number
    ));
    Ok(())
}
