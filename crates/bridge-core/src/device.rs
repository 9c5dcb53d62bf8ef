//! Device identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, URL-like identifier of a reachable device.
///
/// Produced by enumeration and handed back to the driver when creating a
/// session. Two enumerations may return different sets in different order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceEndpoint(String);

impl DeviceEndpoint {
    /// Wrap a raw endpoint string.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The raw endpoint string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty endpoint, which selects "first available device".
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceEndpoint {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for DeviceEndpoint {
    fn from(url: String) -> Self {
        Self(url)
    }
}

/// Descriptive information reported by a connected device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Manufacturer name (e.g., "Tobii")
    pub manufacturer: String,
    /// Model designation
    pub model: String,
    /// Serial number, used to derive stream source identifiers
    pub serial_number: String,
    /// Hardware generation
    pub generation: String,
    /// Firmware version string
    pub firmware_version: String,
}

impl DeviceInfo {
    /// Stable source identifier for one event category of this device.
    ///
    /// The same device always yields the same identifier, so consumers can
    /// re-attach to the stream after a restart.
    pub fn source_id(&self, suffix: &str) -> String {
        format!("{}_{}", self.serial_number, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display_and_empty() {
        let endpoint = DeviceEndpoint::from("tobii-ttp://IS404-100107417574");
        assert_eq!(endpoint.to_string(), "tobii-ttp://IS404-100107417574");
        assert!(!endpoint.is_empty());
        assert!(DeviceEndpoint::new("").is_empty());
    }

    #[test]
    fn test_source_id_is_serial_plus_suffix() {
        let info = DeviceInfo {
            manufacturer: "Tobii".to_string(),
            model: "IS4_Large_Peripheral".to_string(),
            serial_number: "IS404-100107417574".to_string(),
            generation: "IS4".to_string(),
            firmware_version: "2.27.0".to_string(),
        };
        assert_eq!(info.source_id("gaze"), "IS404-100107417574_gaze");
        assert_eq!(info.source_id("gaze"), info.source_id("gaze"));
    }
}
