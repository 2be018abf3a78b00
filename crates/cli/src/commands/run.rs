//! `run` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::PipelineBlueprint;
use observability::MetricsObserver;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::pipeline::{build_pipeline, log_report, print_json};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut blueprint = load_blueprint(&args.config)?;
    apply_cli_overrides(&mut blueprint, args);
    ConfigLoader::validate(&blueprint).context("Invalid configuration after CLI overrides")?;

    // the loader already anchored query.file to the config directory
    let query = config_loader::resolve_query(&blueprint.query, None)
        .context("Failed to resolve query")?;

    info!(
        source = blueprint.source.kind(),
        batch_size = blueprint.batch.batch_size,
        max_workers = blueprint.batch.max_workers,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint, &query);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let observer = Arc::new(MetricsObserver::new());
    let pipeline = build_pipeline(&blueprint)
        .await
        .context("Failed to build pipeline")?
        .with_observer(observer.clone());

    // Setup graceful shutdown handler
    let token = pipeline.cancellation_token();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping after the current batch...");
        token.cancel();
    });

    info!(query = %query, "Executing query");
    let outcome = pipeline.execute(&query).await;
    signal_task.abort();

    let report = outcome.context("Pipeline execution failed")?;
    log_report(&report);
    if args.json {
        print_json(&report)?;
    } else {
        println!("{}", observer.summary());
    }

    info!("Pipeline execution completed");
    Ok(())
}

fn apply_cli_overrides(blueprint: &mut PipelineBlueprint, args: &RunArgs) {
    if let Some(ref sql) = args.query {
        info!("Overriding query from CLI");
        blueprint.query.sql = Some(sql.clone());
        blueprint.query.file = None;
    }
    if let Some(ref file) = args.query_file {
        info!(file = %file.display(), "Overriding query file from CLI");
        // relative to the working directory, not the config file
        let file = std::env::current_dir()
            .map(|cwd| cwd.join(file))
            .unwrap_or_else(|_| file.clone());
        blueprint.query.sql = None;
        blueprint.query.file = Some(file);
    }
    if let Some(limit) = args.limit {
        blueprint.query.limit = Some(limit);
    }
    if let Some(batch_size) = args.batch_size {
        info!(batch_size, "Overriding batch size from CLI");
        blueprint.batch.batch_size = batch_size;
    }
    if let Some(max_workers) = args.max_workers {
        info!(max_workers, "Overriding worker count from CLI");
        blueprint.batch.max_workers = max_workers;
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint, query: &str) {
    println!("\n=== Configuration Summary ===\n");
    println!("Source: {}", blueprint.source.kind());
    println!("AWS region: {}", blueprint.aws.region);
    println!(
        "Batching: {} records/batch, {} workers",
        blueprint.batch.batch_size, blueprint.batch.max_workers
    );

    println!("\nSinks ({}):", blueprint.sinks.len());
    for sink in &blueprint.sinks {
        println!("  - {} ({})", sink.name, sink.kind.type_name());
    }

    if !query.is_empty() {
        println!("\nQuery:\n{}", query.trim());
    }

    println!();
}
