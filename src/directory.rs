//! Device directory: enumerate and select endpoints.

use crate::status::StatusSender;
use bridge_core::{DeviceApi, DeviceDriver, DeviceEndpoint, EnumerationError};
use thiserror::Error;
use tracing::{info, warn};

/// No endpoint could be selected for a recording.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// Enumeration returned nothing
    #[error("no compatible device found")]
    NoDevices,

    /// The requested endpoint is not among the enumerated ones
    #[error("device '{requested}' not found among {available} enumerated device(s)")]
    EndpointNotFound {
        /// Endpoint that was asked for
        requested: String,
        /// How many endpoints were enumerated
        available: usize,
    },
}

/// List reachable endpoints. Zero devices is `Ok(vec![])`.
pub fn list_endpoints<A: DeviceApi>(api: &A) -> Result<Vec<DeviceEndpoint>, EnumerationError> {
    let endpoints = api
        .enumerate_endpoints()
        .map_err(|source| EnumerationError { source })?;
    info!(count = endpoints.len(), "Enumerated devices");
    Ok(endpoints)
}

/// Pick the endpoint to record from.
///
/// An empty request selects the first enumerated endpoint. A non-empty
/// request must match an enumerated endpoint exactly.
pub fn select_endpoint(
    available: &[DeviceEndpoint],
    requested: &DeviceEndpoint,
) -> Result<DeviceEndpoint, SelectionError> {
    if requested.is_empty() {
        return available.first().cloned().ok_or(SelectionError::NoDevices);
    }
    if available.contains(requested) {
        Ok(requested.clone())
    } else {
        Err(SelectionError::EndpointNotFound {
            requested: requested.to_string(),
            available: available.len(),
        })
    }
}

/// Create a short-lived API context, enumerate, and destroy it again.
///
/// Failures never propagate: they are reported on `status` and the list
/// degrades to whatever could be read (possibly empty).
pub fn refresh_devices<D: DeviceDriver>(driver: &D, status: &StatusSender) -> Vec<DeviceEndpoint> {
    let api = match driver.create_api() {
        Ok(api) => api,
        Err(e) => {
            warn!(driver = driver.name(), error = %e, "API creation failed");
            status.send("Failed to initialize the device API.");
            return Vec::new();
        }
    };

    let endpoints = match list_endpoints(&api) {
        Ok(endpoints) => endpoints,
        Err(e) => {
            warn!(error = %e, "Enumeration failed");
            status.send("Failed to enumerate devices.");
            Vec::new()
        }
    };
    if endpoints.is_empty() {
        status.send("No compatible device found.");
    }

    if let Err(e) = api.destroy() {
        warn!(error = %e, "API destroy failed after enumeration");
        status.send("Failed to destroy API after enumerating devices.");
    }
    endpoints
}
