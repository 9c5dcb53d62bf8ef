//! Connection manager.
//!
//! Opens and re-opens device sessions under a bounded [`RetryPolicy`].
//! Transient driver errors (connection failed, firmware upgrade in progress)
//! are retried; anything else aborts after that one attempt. The delay runs
//! only between attempts, so the worst-case blocking time is
//! `(attempts - 1) * interval` plus the time spent inside the driver calls.
//!
//! Both operations block the calling thread and cannot be interrupted.

use bridge_core::{
    ConnectOperation, ConnectionError, ConnectionErrorKind, DeviceApi, DeviceEndpoint,
    DeviceSession, DriverError, RetryPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Blocking delay between attempts.
///
/// Swappable so retry timing can be asserted without real sleeps.
pub trait Sleeper: Send + Sync {
    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Connect and reconnect with one shared retry policy.
#[derive(Clone)]
pub struct ConnectionManager {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ConnectionManager {
    /// Manager that really sleeps between attempts.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(ThreadSleeper))
    }

    /// Manager with a custom delay source.
    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Retry budget shared by connect and reconnect.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Open a session to `endpoint`.
    pub fn connect<A: DeviceApi>(
        &self,
        api: &A,
        endpoint: &DeviceEndpoint,
    ) -> Result<A::Session, ConnectionError> {
        info!(
            endpoint = %endpoint,
            attempts = self.policy.attempts(),
            interval_ms = self.policy.interval.as_millis() as u64,
            "Connecting"
        );
        self.retry(ConnectOperation::Connect, endpoint.as_str(), || {
            api.create_session(endpoint)
        })
    }

    /// Re-establish a dropped connection on an existing session.
    pub fn reconnect<S: DeviceSession>(&self, session: &mut S) -> Result<(), ConnectionError> {
        let endpoint = session.endpoint().to_string();
        info!(
            endpoint = %endpoint,
            attempts = self.policy.attempts(),
            interval_ms = self.policy.interval.as_millis() as u64,
            "Reconnecting"
        );
        self.retry(ConnectOperation::Reconnect, &endpoint, || session.reconnect())
    }

    fn retry<T>(
        &self,
        operation: ConnectOperation,
        endpoint: &str,
        mut attempt_once: impl FnMut() -> Result<T, DriverError>,
    ) -> Result<T, ConnectionError> {
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            match attempt_once() {
                Ok(value) => {
                    if attempt > 1 {
                        info!(%operation, endpoint, attempt, "Succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    debug!(
                        %operation,
                        endpoint,
                        attempt,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    self.sleeper.sleep(self.policy.interval);
                    attempt += 1;
                }
                Err(err) => {
                    let kind = if err.is_transient() {
                        ConnectionErrorKind::Transient
                    } else {
                        ConnectionErrorKind::Permanent
                    };
                    warn!(
                        %operation,
                        endpoint,
                        attempts = attempt,
                        interval_ms = self.policy.interval.as_millis() as u64,
                        error = %err,
                        "Giving up"
                    );
                    return Err(ConnectionError {
                        operation,
                        endpoint: endpoint.to_string(),
                        kind,
                        attempts: attempt,
                        interval: self.policy.interval,
                        source: err,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{DeviceDriver, DriverErrorKind};
    use bridge_driver_mock::{Scenario, SimulatedDriver};
    use parking_lot::Mutex;

    const URL: &str = "tobii-ttp://conn-test";

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().push(duration);
        }
    }

    fn manager(attempts: u32, sleeper: &Arc<RecordingSleeper>) -> ConnectionManager {
        ConnectionManager::with_sleeper(
            RetryPolicy::new(attempts, Duration::from_millis(10)),
            sleeper.clone(),
        )
    }

    #[test]
    fn test_connect_succeeds_on_third_attempt() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let driver = SimulatedDriver::new(
            Scenario::single_device(URL).connect_failures(DriverErrorKind::ConnectionFailed, 2),
        );
        let api = driver.create_api().unwrap();

        let session = manager(5, &sleeper)
            .connect(&api, &DeviceEndpoint::new(URL))
            .unwrap();
        assert_eq!(driver.journal().connect_attempts(), 3);
        assert_eq!(sleeper.sleeps.lock().len(), 2);

        session.destroy().unwrap();
        api.destroy().unwrap();
    }

    #[test]
    fn test_permanent_error_aborts_immediately() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let driver = SimulatedDriver::new(
            Scenario::single_device(URL).always_fail_connect(DriverErrorKind::Unauthorized),
        );
        let api = driver.create_api().unwrap();

        let err = manager(5, &sleeper)
            .connect(&api, &DeviceEndpoint::new(URL))
            .unwrap_err();
        assert_eq!(err.kind, ConnectionErrorKind::Permanent);
        assert_eq!(err.attempts, 1);
        assert!(sleeper.sleeps.lock().is_empty());
        api.destroy().unwrap();
    }

    #[test]
    fn test_firmware_upgrade_is_retried() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let driver = SimulatedDriver::new(
            Scenario::single_device(URL)
                .always_fail_connect(DriverErrorKind::FirmwareUpgradeInProgress),
        );
        let api = driver.create_api().unwrap();

        let err = manager(4, &sleeper)
            .connect(&api, &DeviceEndpoint::new(URL))
            .unwrap_err();
        assert_eq!(err.kind, ConnectionErrorKind::Transient);
        assert_eq!(err.attempts, 4);
        assert_eq!(sleeper.sleeps.lock().len(), 3);
        api.destroy().unwrap();
    }

    #[test]
    fn test_reconnect_uses_same_policy() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let driver = SimulatedDriver::new(
            Scenario::single_device(URL).reconnect_failures(DriverErrorKind::ConnectionFailed, 1),
        );
        let api = driver.create_api().unwrap();
        let manager = manager(3, &sleeper);
        let mut session = manager.connect(&api, &DeviceEndpoint::new(URL)).unwrap();

        manager.reconnect(&mut session).unwrap();
        assert_eq!(*sleeper.sleeps.lock(), vec![Duration::from_millis(10)]);

        session.destroy().unwrap();
        api.destroy().unwrap();
    }
}
