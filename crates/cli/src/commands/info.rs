//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{PipelineBlueprint, SinkKind, SourceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    region: String,
    source: SourceInfo,
    batch_size: usize,
    max_workers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_limit: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SourceInfo {
    kind: String,
    /// database for Athena, path for files
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    work_group: Option<String>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    target: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = super::load_blueprint(&args.config)?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn source_info(source: &SourceConfig) -> SourceInfo {
    match source {
        SourceConfig::Athena(athena) => SourceInfo {
            kind: source.kind().to_string(),
            target: athena.database.clone(),
            work_group: Some(athena.work_group.clone()),
        },
        SourceConfig::File(file) => SourceInfo {
            kind: source.kind().to_string(),
            target: file.path.display().to_string(),
            work_group: None,
        },
    }
}

fn sink_target(kind: &SinkKind) -> String {
    match kind {
        SinkKind::Log => "tracing".to_string(),
        SinkKind::File(file) => file.path.display().to_string(),
        SinkKind::OpenSearch(search) => format!(
            "{}/{}",
            search.endpoint.trim_end_matches('/'),
            search.index_name
        ),
        SinkKind::DynamoDb(dynamo) => dynamo.table_name.clone(),
    }
}

fn build_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: s.kind.type_name().to_string(),
                target: sink_target(&s.kind),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        region: blueprint.aws.region.clone(),
        source: source_info(&blueprint.source),
        batch_size: blueprint.batch.batch_size,
        max_workers: blueprint.batch.max_workers,
        query_limit: blueprint.query.limit,
        sinks,
    }
}

fn print_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Athena ETL Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let source = source_info(&blueprint.source);
    println!("📥 Source");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Kind: {}", source.kind);
    if let Some(ref work_group) = source.work_group {
        println!("   ├─ Work group: {}", work_group);
    }
    println!("   ├─ Region: {}", blueprint.aws.region);
    println!("   └─ Target: {}", source.target);

    println!("\n⚙️  Batching");
    println!("   ├─ Batch size: {}", blueprint.batch.batch_size);
    println!("   ├─ Workers: {}", blueprint.batch.max_workers);
    match blueprint.query.limit {
        Some(limit) => println!("   └─ Query limit: {}", limit),
        None => println!("   └─ Query limit: none"),
    }

    println!("\n📤 Sinks ({})", blueprint.sinks.len());
    for (i, sink) in blueprint.sinks.iter().enumerate() {
        let is_last = i == blueprint.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        if args.sinks {
            println!(
                "   {} {} ({}) → {}",
                prefix,
                sink.name,
                sink.kind.type_name(),
                sink_target(&sink.kind)
            );
        } else {
            println!("   {} {} ({})", prefix, sink.name, sink.kind.type_name());
        }
    }

    println!();
}
