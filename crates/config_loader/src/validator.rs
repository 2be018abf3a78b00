//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个 sink，sink 名称非空且唯一
//! - 数值范围与必填字段 (validator derive)
//! - Athena 输出位置必须是 s3:// 路径，轮询间隔不超过最长等待
//! - OpenSearch endpoint 必须是 http(s) URL
//! - Athena 查询必须给出 sql 或 file 之一

use std::collections::HashSet;

use contracts::{ContractError, PipelineBlueprint, SinkKind, SourceConfig};
use validator::{Validate, ValidationErrors};

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_batch(blueprint)?;
    validate_source(blueprint)?;
    validate_query(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn derive_errors(field: impl Into<String>, errors: ValidationErrors) -> ContractError {
    ContractError::config_validation(field, errors.to_string())
}

/// 校验批处理配置
fn validate_batch(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint
        .batch
        .validate()
        .map_err(|e| derive_errors("batch", e))
}

/// 校验数据源配置
fn validate_source(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    match &blueprint.source {
        SourceConfig::Athena(athena) => {
            athena.validate().map_err(|e| derive_errors("source", e))?;

            if !athena.s3_output_location.starts_with("s3://") {
                return Err(ContractError::config_validation(
                    "source.s3_output_location",
                    format!(
                        "must be an s3:// location, got '{}'",
                        athena.s3_output_location
                    ),
                ));
            }

            if athena.poll_interval_secs > athena.max_wait_secs {
                return Err(ContractError::config_validation(
                    "source.poll_interval_secs / source.max_wait_secs",
                    format!(
                        "poll_interval_secs ({}) must be <= max_wait_secs ({})",
                        athena.poll_interval_secs, athena.max_wait_secs
                    ),
                ));
            }
        }
        SourceConfig::File(file) => {
            if file.path.as_os_str().is_empty() {
                return Err(ContractError::config_validation(
                    "source.path",
                    "file source path cannot be empty",
                ));
            }
        }
    }
    Ok(())
}

/// 校验查询配置
fn validate_query(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let query = &blueprint.query;

    if query.sql.is_some() && query.file.is_some() {
        return Err(ContractError::config_validation(
            "query",
            "set either query.sql or query.file, not both",
        ));
    }

    if matches!(blueprint.source, SourceConfig::Athena(_))
        && query.sql.as_deref().map_or(true, |s| s.trim().is_empty())
        && query.file.is_none()
    {
        return Err(ContractError::config_validation(
            "query",
            "athena source requires query.sql or query.file",
        ));
    }

    if query.limit == Some(0) {
        return Err(ContractError::config_validation(
            "query.limit",
            "limit must be > 0",
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.sinks.is_empty() {
        return Err(ContractError::config_validation(
            "sinks",
            "at least one sink must be configured",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }

        let field = format!("sinks[{}]", sink.name);
        match &sink.kind {
            SinkKind::Log => {}
            SinkKind::File(file) => {
                if file.path.as_os_str().is_empty() {
                    return Err(ContractError::config_validation(
                        format!("{field}.path"),
                        "file sink path cannot be empty",
                    ));
                }
            }
            SinkKind::OpenSearch(search) => {
                search.validate().map_err(|e| derive_errors(&field, e))?;
                if !(search.endpoint.starts_with("http://")
                    || search.endpoint.starts_with("https://"))
                {
                    return Err(ContractError::config_validation(
                        format!("{field}.endpoint"),
                        format!("must be an http(s) URL, got '{}'", search.endpoint),
                    ));
                }
            }
            SinkKind::DynamoDb(dynamo) => {
                dynamo.validate().map_err(|e| derive_errors(&field, e))?;
                if dynamo.overwrite_by_pkeys.iter().any(|k| k.trim().is_empty()) {
                    return Err(ContractError::config_validation(
                        format!("{field}.overwrite_by_pkeys"),
                        "key names cannot be empty",
                    ));
                }
            }
        }
    }
    Ok(())
}
