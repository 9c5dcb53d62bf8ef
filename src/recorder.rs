//! Recording controller.
//!
//! [`start_recording`] spawns the single worker thread that owns the whole
//! pipeline and returns a [`RecordingHandle`]. [`Recorder`] wraps that with
//! the toggle semantics a front-end needs: at most one live recording, a
//! status channel, and device refresh.

use crate::acquisition::ShutdownSignal;
use crate::directory;
use crate::publisher::StreamPublisher;
use crate::run::{run_recording, RecordingOutcome, RecordingRequest, RunSettings};
use crate::status::{status_channel, StatusMessage, StatusSender};
use bridge_core::{DeviceDriver, DeviceEndpoint};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Errors from the recording controller.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Start was requested while a recording is live
    #[error("a recording is already running")]
    AlreadyRecording,

    /// The worker thread could not be created
    #[error("failed to spawn recording thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Handle to a running recording worker.
#[must_use = "dropping the handle detaches the worker; call stop()"]
pub struct RecordingHandle {
    shutdown: ShutdownSignal,
    worker: JoinHandle<RecordingOutcome>,
}

impl RecordingHandle {
    /// Ask the worker to stop and wait for it to finish.
    ///
    /// While the acquisition loop runs, the worker notices the request within
    /// one wait timeout. Connect and reconnect retries are not interruptible,
    /// so the worst case is `(attempts - 1) * interval` of retry sleep plus
    /// one wait timeout (about 30.1 s with default settings).
    pub fn stop(self) -> RecordingOutcome {
        self.shutdown.trigger();
        self.join()
    }

    /// Wait for the worker to finish on its own.
    pub fn join(self) -> RecordingOutcome {
        match self.worker.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                RecordingOutcome::FailedWhileRunning("recording thread panicked".to_string())
            }
        }
    }

    /// Whether the worker has already exited (failure or stop).
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

/// Spawn a worker thread running one recording.
pub fn start_recording<D: DeviceDriver>(
    driver: Arc<D>,
    publisher: Arc<dyn StreamPublisher>,
    request: RecordingRequest,
    settings: RunSettings,
    status: StatusSender,
) -> Result<RecordingHandle, RecorderError> {
    let shutdown = ShutdownSignal::new();
    let worker_shutdown = shutdown.clone();

    let worker = thread::Builder::new()
        .name("gaze-recorder".to_string())
        .spawn(move || {
            run_recording(
                driver.as_ref(),
                publisher.as_ref(),
                &request,
                &settings,
                &worker_shutdown,
                &status,
            )
        })?;

    Ok(RecordingHandle { shutdown, worker })
}

/// Start/stop controller holding at most one live recording.
pub struct Recorder<D: DeviceDriver> {
    driver: Arc<D>,
    publisher: Arc<dyn StreamPublisher>,
    settings: RunSettings,
    status: StatusSender,
    status_rx: Option<mpsc::UnboundedReceiver<StatusMessage>>,
    active: Option<RecordingHandle>,
}

impl<D: DeviceDriver> Recorder<D> {
    /// Idle controller with a fresh status channel.
    pub fn new(driver: Arc<D>, publisher: Arc<dyn StreamPublisher>, settings: RunSettings) -> Self {
        let (status, status_rx) = status_channel();
        Self {
            driver,
            publisher,
            settings,
            status,
            status_rx: Some(status_rx),
            active: None,
        }
    }

    /// Take the status receiver. Only the first call returns it.
    pub fn status_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<StatusMessage>> {
        self.status_rx.take()
    }

    /// Enumerate devices with a short-lived API context.
    pub fn refresh_devices(&self) -> Vec<DeviceEndpoint> {
        directory::refresh_devices(self.driver.as_ref(), &self.status)
    }

    /// Start recording `endpoint` under `stream_base_name`.
    ///
    /// Rejected while a previous recording is still live. A previous worker
    /// that already exited on its own is reaped first.
    pub fn start(
        &mut self,
        stream_base_name: &str,
        endpoint: impl Into<DeviceEndpoint>,
    ) -> Result<(), RecorderError> {
        if let Some(handle) = self.active.take() {
            if !handle.is_finished() {
                self.active = Some(handle);
                return Err(RecorderError::AlreadyRecording);
            }
            let outcome = handle.join();
            info!(?outcome, "Reaped finished recording");
        }

        let request = RecordingRequest {
            stream_base_name: stream_base_name.to_string(),
            endpoint: endpoint.into(),
        };
        info!(name = %request.stream_base_name, endpoint = %request.endpoint, "Starting recording");
        let handle = start_recording(
            Arc::clone(&self.driver),
            Arc::clone(&self.publisher),
            request,
            self.settings.clone(),
            self.status.clone(),
        )?;
        self.active = Some(handle);
        Ok(())
    }

    /// Stop the live recording and wait for its worker. See
    /// [`RecordingHandle::stop`] for the latency ceiling.
    pub fn stop(&mut self) -> Option<RecordingOutcome> {
        let outcome = self.active.take()?.stop();
        info!(?outcome, "Recording stopped");
        Some(outcome)
    }

    /// Whether the live recording's worker already exited on its own.
    pub fn has_finished(&self) -> bool {
        self.active.as_ref().is_some_and(RecordingHandle::is_finished)
    }

    /// Whether a recording was started and not stopped yet. The worker may
    /// have exited on its own in the meantime.
    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }
}

impl<D: DeviceDriver> Drop for Recorder<D> {
    fn drop(&mut self) {
        if let Some(handle) = self.active.take() {
            warn!("Recorder dropped while recording, stopping");
            handle.stop();
        }
    }
}
