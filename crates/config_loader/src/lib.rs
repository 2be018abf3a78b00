//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Apply environment variable overrides
//! - Validate configuration legality
//! - Resolve the query text
//! - Generate `PipelineBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("pipeline.toml")).unwrap();
//! println!("Sinks: {}", blueprint.sinks.len());
//! ```

mod env;
mod parser;
mod paths;
mod query;
mod validator;

pub use contracts::PipelineBlueprint;
pub use env::{apply_env_overrides, apply_overrides_with, ENV_KEYS};
pub use parser::ConfigFormat;
pub use paths::anchor_relative_paths;
pub use query::{resolve_query, with_limit};

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    /// Relative paths in the file are resolved against its directory.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<PipelineBlueprint, ContractError> {
        let blueprint = Self::read_blueprint(path)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Load from file, then layer process environment overrides on top.
    ///
    /// Validation runs once, after the overrides.
    pub fn load_with_env(path: &Path) -> Result<PipelineBlueprint, ContractError> {
        let mut blueprint = Self::read_blueprint(path)?;
        apply_env_overrides(&mut blueprint)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Load configuration from string
    ///
    /// Relative paths are kept as written and resolve against the working
    /// directory.
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Re-run validation, e.g. after CLI overrides
    pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Serialize PipelineBlueprint to TOML string
    pub fn to_toml(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize PipelineBlueprint to JSON string
    pub fn to_json(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Read and parse a config file, anchoring relative paths to its directory
    fn read_blueprint(path: &Path) -> Result<PipelineBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        let mut blueprint = format.parse(&content)?;
        if let Some(dir) = path.parent() {
            anchor_relative_paths(&mut blueprint, dir);
        }
        Ok(blueprint)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, ContractError> {
        let blueprint = format.parse(content)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkKind, SourceConfig};

    const MINIMAL_TOML: &str = r#"
[aws]
region = "eu-north-1"

[source]
kind = "athena"
database = "vehicle_data"
s3_output_location = "s3://results/athena/"

[batch]
batch_size = 100
max_workers = 2

[query]
sql = "SELECT orgno, vehicles_meta FROM companies"
limit = 10

[[sinks]]
name = "kv"
sink_type = "dynamodb"
table_name = "companies"
overwrite_by_pkeys = ["orgno"]

[[sinks]]
name = "search"
sink_type = "opensearch"
endpoint = "https://search.example.com"
index_name = "companies"
id_field = "orgno"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.aws.region, "eu-north-1");
        assert_eq!(bp.batch.batch_size, 100);
        assert_eq!(bp.sinks.len(), 2);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.batch, bp2.batch);
        assert_eq!(bp.sinks.len(), bp2.sinks.len());
        assert_eq!(bp.sinks[0].name, bp2.sinks[0].name);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert!(matches!(bp2.source, SourceConfig::Athena(_)));
        assert!(matches!(bp2.sinks[1].kind, SinkKind::OpenSearch(_)));
    }

    #[test]
    fn test_validation_runs_after_parse() {
        // Duplicate sink name should fail validation
        let content = r#"
[source]
kind = "file"
path = "records.ndjson"

[[sinks]]
name = "out"
sink_type = "log"

[[sinks]]
name = "out"
sink_type = "file"
path = "out.ndjson"
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, MINIMAL_TOML).unwrap();
        assert!(ConfigLoader::load_from_path(&path).is_ok());

        let yaml = dir.path().join("pipeline.yaml");
        std::fs::write(&yaml, "source: {}").unwrap();
        let err = ConfigLoader::load_from_path(&yaml).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
