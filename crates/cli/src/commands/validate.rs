//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{OpenSearchAuth, PipelineBlueprint, SinkKind, SourceConfig};
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
    source: String,
    batch_size: usize,
    max_workers: usize,
    sink_count: usize,
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

    match super::load_blueprint(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

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
                    version: format!("{:?}", blueprint.version),
                    source: blueprint.source.kind().to_string(),
                    batch_size: blueprint.batch.batch_size,
                    max_workers: blueprint.batch.max_workers,
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("{e:#}")),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.batch.max_workers < blueprint.sinks.len() {
        warnings.push(format!(
            "max_workers ({}) is below the sink count ({}) - sinks will take turns per batch",
            blueprint.batch.max_workers,
            blueprint.sinks.len()
        ));
    }

    for sink in &blueprint.sinks {
        match &sink.kind {
            SinkKind::OpenSearch(search) => match search.auth {
                OpenSearchAuth::Basic if search.username.is_some() != search.password.is_some() => {
                    warnings.push(format!(
                        "Sink '{}' sets only one of username/password - auth is disabled",
                        sink.name
                    ));
                }
                OpenSearchAuth::Sigv4 if search.username.is_some() => {
                    warnings.push(format!(
                        "Sink '{}' uses sigv4 auth - username/password are ignored",
                        sink.name
                    ));
                }
                _ => {}
            },
            SinkKind::DynamoDb(dynamo) if dynamo.overwrite_by_pkeys.is_empty() => {
                warnings.push(format!(
                    "Sink '{}' has no overwrite_by_pkeys - duplicate keys in one batch are rejected by DynamoDB",
                    sink.name
                ));
            }
            _ => {}
        }
    }

    if let SourceConfig::Athena(_) = blueprint.source {
        if blueprint.aws.access_key_id.is_some() != blueprint.aws.secret_access_key.is_some() {
            warnings.push(
                "Only one of aws.access_key_id/aws.secret_access_key is set - using the default credential chain"
                    .to_string(),
            );
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Source: {}", summary.source);
            println!("  Batch size: {}", summary.batch_size);
            println!("  Workers: {}", summary.max_workers);
            println!("  Sinks: {}", summary.sink_count);
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
