//! 查询文本解析
//!
//! 内联 SQL 或查询文件二选一，`limit` 以 `LIMIT n` 追加在末尾。

use std::path::Path;

use contracts::{ContractError, QueryConfig};

/// 得到最终执行的查询文本
///
/// `base_dir` 是配置文件所在目录，相对的查询文件路径基于它解析。
/// 两者都未设置时返回空字符串 (文件数据源不需要查询)。
pub fn resolve_query(query: &QueryConfig, base_dir: Option<&Path>) -> Result<String, ContractError> {
    let text = match (&query.sql, &query.file) {
        (Some(sql), _) => sql.clone(),
        (None, Some(file)) => {
            let path = match base_dir {
                Some(dir) if file.is_relative() => dir.join(file),
                _ => file.clone(),
            };
            std::fs::read_to_string(&path).map_err(|e| {
                ContractError::config_validation(
                    "query.file",
                    format!("cannot read {}: {e}", path.display()),
                )
            })?
        }
        (None, None) => String::new(),
    };

    Ok(with_limit(text, query.limit))
}

/// 追加 `LIMIT n`
pub fn with_limit(query: String, limit: Option<u64>) -> String {
    match limit {
        Some(limit) => {
            let trimmed = query.trim_end().trim_end_matches(';');
            format!("{trimmed} LIMIT {limit}")
        }
        None => query,
    }
}
