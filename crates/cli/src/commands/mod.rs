//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;

/// Load the config file with environment overrides applied
fn load_blueprint(path: &Path) -> Result<PipelineBlueprint> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }

    config_loader::ConfigLoader::load_with_env(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
