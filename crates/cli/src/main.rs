//! # Athena ETL CLI
//!
//! `athena-etl run | validate | info`
//!
//! Ctrl+C 在当前批次结束后停止运行，已写入的数据保留。

mod cli;
mod commands;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // .env 中的变量不覆盖已存在的进程环境
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    observability::init_with_config(cli.observability_config())?;

    match &dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => error!(error = %e, "Ignoring unreadable .env"),
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = cli.command.name(),
        "Athena ETL starting"
    );

    let outcome = match &cli.command {
        Commands::Run(args) => commands::run_pipeline(args).await,
        Commands::Validate(args) => commands::run_validate(args),
        Commands::Info(args) => commands::run_info(args),
    };
    if let Err(e) = &outcome {
        error!(command = cli.command.name(), error = %e, "Command failed");
    }
    outcome
}
