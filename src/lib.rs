//! # gaze-bridge
//!
//! Background acquisition bridge between an eye-tracking device and
//! real-time outbound data streams. One worker thread per recording
//! connects to the device, keeps the connection alive across transient
//! failures, subscribes to gaze, presence and notification events, and
//! republishes each event as a timestamped sample.
//!
//! ## Crate Structure
//!
//! - **`directory`**: enumerate endpoints and pick the one to record from.
//! - **`connection`**: connect and reconnect under a bounded retry policy.
//! - **`subscription`**: per-category handlers bound to outbound streams,
//!   with exact teardown of what was subscribed.
//! - **`translate`**: pure event to sample conversion.
//! - **`acquisition`**: the wait-then-dispatch loop with clock resync and
//!   in-place reconnect.
//! - **`publisher`**: stream declarations, metadata and outlet backends.
//! - **`run`**: one recording run and the guard that releases its resources.
//! - **`recorder`**: controller API (start, stop, status, device refresh).
//! - **`config`** / **`logging`**: Figment configuration and tracing setup.
//!
//! Driver traits and the error taxonomy live in `bridge-core`; a simulated
//! driver for tests and demos lives in `bridge-driver-mock`.

pub mod acquisition;
pub mod config;
pub mod connection;
pub mod directory;
pub mod logging;
pub mod publisher;
pub mod recorder;
pub mod run;
pub mod status;
pub mod subscription;
pub mod translate;

pub use acquisition::{AcquisitionSettings, ShutdownSignal};
pub use config::BridgeConfig;
pub use recorder::{start_recording, Recorder, RecorderError, RecordingHandle};
pub use run::{RecordingOutcome, RecordingRequest, RunSettings};
pub use status::StatusMessage;
