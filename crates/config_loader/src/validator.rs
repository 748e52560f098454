//! Configuration validation
//!
//! Rules:
//! - host non-empty and port non-zero while dispatching is enabled
//! - write_timeout_secs > 0
//! - control address non-empty, starts with '/', contains no NUL
//! - control address unique
//! - control value finite

use std::collections::HashSet;

use contracts::{ContractError, ControllerConfig};

/// Validate a ControllerConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ControllerConfig) -> Result<(), ContractError> {
    validate_osc(config)?;
    validate_control_addresses(config)?;
    validate_control_values(config)?;
    Ok(())
}

/// Validate the remote endpoint settings
fn validate_osc(config: &ControllerConfig) -> Result<(), ContractError> {
    let osc = &config.osc;

    if osc.write_timeout_secs == 0 {
        return Err(ContractError::config_validation(
            "osc.write_timeout_secs",
            "write_timeout_secs must be > 0",
        ));
    }

    // A disabled endpoint is never resolved
    if !osc.enabled {
        return Ok(());
    }

    if osc.host.trim().is_empty() {
        return Err(ContractError::config_validation(
            "osc.host",
            "host cannot be empty while dispatching is enabled",
        ));
    }
    if osc.port == 0 {
        return Err(ContractError::config_validation(
            "osc.port",
            "port must be non-zero while dispatching is enabled",
        ));
    }
    Ok(())
}

/// Validate address syntax and uniqueness
fn validate_control_addresses(config: &ControllerConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, control) in config.controls.iter().enumerate() {
        let field = format!("controls[{}].address", idx);

        if control.address.is_empty() {
            return Err(ContractError::config_validation(
                field,
                "address cannot be empty",
            ));
        }
        if !control.address.starts_with('/') {
            return Err(ContractError::config_validation(
                field,
                format!("address '{}' must start with '/'", control.address),
            ));
        }
        if control.address.contains('\0') {
            return Err(ContractError::config_validation(
                field,
                "address cannot contain NUL bytes",
            ));
        }
        if !seen.insert(control.address.as_str()) {
            return Err(ContractError::config_validation(
                format!("controls[address={}]", control.address),
                "duplicate address",
            ));
        }
    }
    Ok(())
}

fn validate_control_values(config: &ControllerConfig) -> Result<(), ContractError> {
    for control in &config.controls {
        if !control.value.is_finite() {
            return Err(ContractError::config_validation(
                format!("controls[address={}].value", control.address),
                format!("value must be finite, got {}", control.value),
            ));
        }
    }
    Ok(())
}
