//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::ControllerConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    enabled: bool,
    host: String,
    port: u16,
    write_timeout_secs: u64,
    control_count: usize,
    transmitted_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    enabled: config.osc.enabled,
                    host: config.osc.host.clone(),
                    port: config.osc.port,
                    write_timeout_secs: config.osc.write_timeout_secs,
                    control_count: config.controls.len(),
                    transmitted_count: config.transmittable_controls().count(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ControllerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.osc.enabled {
        warnings.push("osc.enabled is false - no values will be sent".to_string());
    }

    if config.controls.is_empty() {
        warnings.push("No controls configured - nothing is sent on start-up".to_string());
    }

    for control in &config.controls {
        if !control.data_type.is_numeric() {
            warnings.push(format!(
                "Control '{}' is a string control and will not be transmitted",
                control.address
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Target: {}:{} ({})",
                summary.host,
                summary.port,
                if summary.enabled { "enabled" } else { "disabled" }
            );
            println!("  Write timeout: {}s", summary.write_timeout_secs);
            println!(
                "  Controls: {} ({} transmitted)",
                summary.control_count, summary.transmitted_count
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
