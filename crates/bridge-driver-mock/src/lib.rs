//! Simulated Eye-Tracker Driver for gaze-bridge
//!
//! This crate implements the `bridge-core` driver traits without hardware.
//! It serves two purposes:
//!
//! - **Scripted mode** for tests: connect/reconnect outcomes, wait/dispatch
//!   steps and subscription failures are queued up front in a [`Scenario`],
//!   and every driver call is recorded in a [`CallJournal`].
//! - **Free-running mode** for demos: a synthetic gaze stream at a fixed rate
//!   with occasional tracking loss and presence changes.
//!
//! # Example
//!
//! ```rust
//! use bridge_core::{DeviceApi, DeviceDriver, DeviceEvent, GazePoint};
//! use bridge_driver_mock::{Scenario, SimulatedDriver};
//!
//! let scenario = Scenario::single_device("tobii-ttp://sim-1")
//!     .then_events(vec![DeviceEvent::Gaze(GazePoint::valid(1_000_000, 0.5, 0.5))]);
//! let driver = SimulatedDriver::new(scenario);
//!
//! let api = driver.create_api().unwrap();
//! assert_eq!(api.enumerate_endpoints().unwrap().len(), 1);
//! api.destroy().unwrap();
//! ```

mod clock;
mod driver;
mod journal;
mod scenario;

pub use clock::ClockMode;
pub use driver::{SimulatedApi, SimulatedDriver, SimulatedSession};
pub use journal::{CallJournal, DriverCall};
pub use scenario::{Scenario, Step};
