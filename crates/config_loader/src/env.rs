//! 环境变量覆盖
//!
//! 部署环境常通过环境变量注入凭证与 Athena 参数，这里把它们叠加到文件配置之上。

use std::str::FromStr;

use contracts::{
    ContractError, DynamoDbConfig, OpenSearchAuth, OpenSearchConfig, PipelineBlueprint, SinkConfig,
    SinkKind, SourceConfig,
};

/// 识别的环境变量
pub const ENV_KEYS: &[&str] = &[
    "AWS_REGION",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "ATHENA_DATABASE",
    "ATHENA_S3_OUTPUT_LOCATION",
    "ATHENA_WORK_GROUP",
    "BATCH_SIZE",
    "MAX_WORKERS",
    "QUERY_LIMIT",
    "OPENSEARCH_ENDPOINT",
    "OPENSEARCH_INDEX",
    "DYNAMODB_TABLE_NAME",
    "DYNAMODB_OVERWRITE_BY_PKEYS",
];

/// 未指定 `OPENSEARCH_INDEX` 时新建 sink 使用的索引
pub const DEFAULT_OPENSEARCH_INDEX: &str = "data";

/// 环境变量新建 sink 时的主键字段
const ENV_SINK_KEY: &str = "orgno";

/// 从进程环境覆盖配置
pub fn apply_env_overrides(blueprint: &mut PipelineBlueprint) -> Result<(), ContractError> {
    apply_overrides_with(blueprint, |key| std::env::var(key).ok())
}

/// 用任意查找函数覆盖配置，返回 `None` 的键保持不变
///
/// Athena 相关变量只在数据源为 Athena 时生效。`OPENSEARCH_*` 与
/// `DYNAMODB_*` 修改第一个同类 sink，不存在时新建一个。
pub fn apply_overrides_with<F>(blueprint: &mut PipelineBlueprint, lookup: F) -> Result<(), ContractError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(region) = get("AWS_REGION") {
        blueprint.aws.region = region;
    }
    if let Some(key_id) = get("AWS_ACCESS_KEY_ID") {
        blueprint.aws.access_key_id = Some(key_id);
    }
    if let Some(secret) = get("AWS_SECRET_ACCESS_KEY") {
        blueprint.aws.secret_access_key = Some(secret);
    }

    if let SourceConfig::Athena(athena) = &mut blueprint.source {
        if let Some(database) = get("ATHENA_DATABASE") {
            athena.database = database;
        }
        if let Some(location) = get("ATHENA_S3_OUTPUT_LOCATION") {
            athena.s3_output_location = location;
        }
        if let Some(work_group) = get("ATHENA_WORK_GROUP") {
            athena.work_group = work_group;
        }
    }

    if let Some(value) = get("BATCH_SIZE") {
        blueprint.batch.batch_size = parse_number("BATCH_SIZE", &value)?;
    }
    if let Some(value) = get("MAX_WORKERS") {
        blueprint.batch.max_workers = parse_number("MAX_WORKERS", &value)?;
    }
    if let Some(value) = get("QUERY_LIMIT") {
        blueprint.query.limit = Some(parse_number("QUERY_LIMIT", &value)?);
    }

    apply_opensearch(blueprint, get("OPENSEARCH_ENDPOINT"), get("OPENSEARCH_INDEX"));
    apply_dynamodb(
        blueprint,
        get("DYNAMODB_TABLE_NAME"),
        get("DYNAMODB_OVERWRITE_BY_PKEYS"),
    );

    Ok(())
}

fn apply_opensearch(blueprint: &mut PipelineBlueprint, endpoint: Option<String>, index: Option<String>) {
    let existing = blueprint.sinks.iter_mut().find_map(|sink| match &mut sink.kind {
        SinkKind::OpenSearch(search) => Some(search),
        _ => None,
    });

    match (existing, endpoint) {
        (Some(search), endpoint) => {
            if let Some(endpoint) = endpoint {
                search.endpoint = with_scheme(&endpoint);
            }
            if let Some(index) = index {
                search.index_name = index;
            }
        }
        (None, Some(endpoint)) => {
            let index = index.unwrap_or_else(|| DEFAULT_OPENSEARCH_INDEX.to_string());
            blueprint.sinks.push(SinkConfig {
                name: unique_name(&blueprint.sinks, "opensearch"),
                kind: SinkKind::OpenSearch(OpenSearchConfig {
                    id_field: ENV_SINK_KEY.to_string(),
                    routing_field: Some(ENV_SINK_KEY.to_string()),
                    auth: OpenSearchAuth::Sigv4,
                    ..OpenSearchConfig::new(with_scheme(&endpoint), index)
                }),
            });
        }
        // 仅有索引名时没有可写入的目标
        (None, None) => {}
    }
}

fn apply_dynamodb(blueprint: &mut PipelineBlueprint, table: Option<String>, pkeys: Option<String>) {
    let pkeys = pkeys.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });

    let existing = blueprint.sinks.iter_mut().find_map(|sink| match &mut sink.kind {
        SinkKind::DynamoDb(dynamo) => Some(dynamo),
        _ => None,
    });

    match (existing, table) {
        (Some(dynamo), table) => {
            if let Some(table) = table {
                dynamo.table_name = table;
            }
            if let Some(pkeys) = pkeys {
                dynamo.overwrite_by_pkeys = pkeys;
            }
        }
        (None, Some(table_name)) => {
            blueprint.sinks.push(SinkConfig {
                name: unique_name(&blueprint.sinks, "dynamodb"),
                kind: SinkKind::DynamoDb(DynamoDbConfig {
                    table_name,
                    overwrite_by_pkeys: pkeys.unwrap_or_default(),
                }),
            });
        }
        (None, None) => {}
    }
}

/// 裸主机名按 HTTPS 处理
fn with_scheme(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}

fn unique_name(sinks: &[SinkConfig], base: &str) -> String {
    let taken = |name: &str| sinks.iter().any(|s| s.name == name);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ContractError> {
    value.trim().parse().map_err(|_| {
        ContractError::config_validation(key, format!("expected a positive integer, got '{value}'"))
    })
}
