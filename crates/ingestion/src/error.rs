//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// 批处理失败
///
/// 数据源在迭代中途报错时产生；当前未满的批次被丢弃，不会部分输出。
#[derive(Debug, Error)]
#[error(
    "batch processing failed at batch {batch_index} after {records_read} records \
     ({discarded} buffered records discarded): {cause}"
)]
pub struct BatchProcessingError {
    /// 中止时正在填充的批次序号
    pub batch_index: u64,
    /// 出错前成功读取的记录数
    pub records_read: u64,
    /// 被丢弃的缓冲记录数
    pub discarded: usize,
    /// 数据源原始错误
    #[source]
    pub cause: ContractError,
}

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 批大小非法
    #[error("batch size must be >= 1, got {size}")]
    InvalidBatchSize {
        /// 传入的批大小
        size: usize,
    },

    /// 当前构建不支持该数据源
    #[error("source kind '{kind}' is not available in this build (enable the `{feature}` feature)")]
    UnsupportedSource {
        /// 数据源类型
        kind: String,
        /// 需要启用的 feature
        feature: String,
    },

    /// 批处理失败
    #[error(transparent)]
    BatchProcessing(#[from] BatchProcessingError),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
