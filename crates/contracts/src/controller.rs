//! ControllerConfig - Config Loader output
//!
//! Describes the remote OSC endpoint, whether dispatching is enabled, and the
//! controls whose values are transmitted.

use serde::{Deserialize, Serialize};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Remote endpoint and dispatch settings
    #[serde(default)]
    pub osc: OscConfig,

    /// Controls whose values are sent to the remote listener
    #[serde(default)]
    pub controls: Vec<ControlConfig>,
}

impl ControllerConfig {
    /// Controls whose values go on the wire (numeric data types only)
    pub fn transmittable_controls(&self) -> impl Iterator<Item = &ControlConfig> {
        self.controls
            .iter()
            .filter(|control| control.data_type.is_numeric())
    }

    /// Look up a control by its OSC address
    pub fn control(&self, address: &str) -> Option<&ControlConfig> {
        self.controls
            .iter()
            .find(|control| control.address == address)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            version: ConfigVersion::V1,
            osc: OscConfig::default(),
            controls: Vec::new(),
        }
    }
}

/// Remote OSC endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscConfig {
    /// Dispatch enabled (false disables every network operation)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Remote host name or address
    #[serde(default = "default_host")]
    pub host: String,

    /// Remote UDP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Ceiling for a single writability wait, in seconds
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_host(),
            port: default_port(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    7777
}

fn default_write_timeout_secs() -> u64 {
    30
}

/// A single control bound to an OSC address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// OSC address pattern (e.g. "/tab1/slider1")
    pub address: String,

    /// Declared value type
    #[serde(default)]
    pub data_type: OscDataType,

    /// Initial value, sent once when dispatching starts
    #[serde(default)]
    pub value: f64,
}

/// Declared data type of a control
///
/// Numeric kinds are all transmitted as a single float argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OscDataType {
    Int,
    #[default]
    Float,
    Double,
    String,
    Bool,
}

impl OscDataType {
    /// Whether values of this type are sent as a float argument
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::String)
    }
}
