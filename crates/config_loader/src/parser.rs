//! 配置文本 -> `PipelineBlueprint`
//!
//! 格式由文件扩展名决定；解析失败时错误信息带上行列号，便于定位。

use std::fmt;
use std::path::Path;

use contracts::{ContractError, PipelineBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 扩展名不区分大小写
    pub fn from_extension(ext: &str) -> Option<Self> {
        [Self::Toml, Self::Json]
            .into_iter()
            .find(|format| ext.eq_ignore_ascii_case(format.extension()))
    }

    /// 按文件扩展名选择格式
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Err(ContractError::config_parse(format!(
                "{}: no file extension, expected .toml or .json",
                path.display()
            )));
        };
        Self::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!(
                "{}: unsupported config format .{ext}, expected .toml or .json",
                path.display()
            ))
        })
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    /// 解析配置文本，不做校验
    pub fn parse(self, content: &str) -> Result<PipelineBlueprint, ContractError> {
        if content.trim().is_empty() {
            return Err(ContractError::config_parse(format!("{self} config is empty")));
        }
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| {
                let at = e.span().map(|span| Location::of(content, span.start));
                parse_error(self, at, e.message().to_string(), e)
            }),
            Self::Json => serde_json::from_str(content).map_err(|e| {
                let at = (e.line() > 0).then(|| Location {
                    line: e.line(),
                    column: e.column(),
                });
                // serde_json 的 Display 自带位置，这里去掉以免重复
                let message = e.to_string();
                let message = message
                    .rsplit_once(" at line ")
                    .map_or(message.as_str(), |(head, _)| head)
                    .to_string();
                parse_error(self, at, message, e)
            }),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        })
    }
}

/// 1 起始的行列号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Location {
    line: usize,
    column: usize,
}

impl Location {
    /// 字节偏移换算为行列号
    fn of(content: &str, offset: usize) -> Self {
        let before = content.get(..offset).unwrap_or(content);
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
        }
    }
}

fn parse_error<E>(format: ConfigFormat, at: Option<Location>, message: String, source: E) -> ContractError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = message.trim_end();
    let message = match at {
        Some(Location { line, column }) => {
            format!("{format} parse error at line {line}, column {column}: {message}")
        }
        None => format!("{format} parse error: {message}"),
    };
    ContractError::ConfigParse {
        message,
        source: Some(Box::new(source)),
    }
}
