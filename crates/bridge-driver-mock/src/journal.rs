//! Record of driver calls for test assertions.

use bridge_core::EventCategory;
use parking_lot::Mutex;
use std::sync::Arc;

/// One resource-affecting driver call.
///
/// Wait and dispatch calls are deliberately not journaled: a free-running
/// session makes thousands of them per minute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    /// `DeviceDriver::create_api`
    CreateApi,
    /// `DeviceApi::enumerate_endpoints`
    Enumerate,
    /// `DeviceApi::create_session` with the endpoint URL
    CreateSession(String),
    /// `DeviceSession::reconnect`
    Reconnect,
    /// `DeviceSession::device_info`
    DeviceInfo,
    /// `DeviceSession::subscribe`
    Subscribe(EventCategory),
    /// `DeviceSession::unsubscribe`
    Unsubscribe(EventCategory),
    /// `DeviceSession::update_timesync`
    UpdateTimesync,
    /// `DeviceSession::destroy`
    DestroySession,
    /// `DeviceApi::destroy`
    DestroyApi,
    /// A session was dropped without `destroy`
    LeakedSession,
    /// An API context was dropped without `destroy`
    LeakedApi,
}

/// Shared, append-only list of [`DriverCall`]s.
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    calls: Arc<Mutex<Vec<DriverCall>>>,
}

impl CallJournal {
    /// Empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, call: DriverCall) {
        tracing::trace!(?call, "simulated driver call");
        self.calls.lock().push(call);
    }

    /// Snapshot of every call so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls equal to `call`.
    pub fn count(&self, call: &DriverCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// Number of `CreateSession` calls, i.e. connect attempts.
    pub fn connect_attempts(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, DriverCall::CreateSession(_)))
            .count()
    }

    /// Calls recorded after the last `CreateSession`, which is where
    /// subscription and teardown activity lives.
    pub fn calls_after_connect(&self) -> Vec<DriverCall> {
        let calls = self.calls.lock();
        let start = calls
            .iter()
            .rposition(|c| matches!(c, DriverCall::CreateSession(_)))
            .map_or(0, |i| i + 1);
        calls[start..].to_vec()
    }
}
