//! # Dispatcher
//!
//! 批次分发模块。
//!
//! 负责：
//! - 每个 sink 一个独立 worker，独占自身连接状态
//! - 将同一批次并发 fan-out 到所有 sinks（受 `max_workers` 限制）
//! - 等待所有 sinks 完成当前批次后再返回（批次屏障）
//! - 将 sink 的 panic / 计数错误转换为结构化 `SinkResult`

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{Batch, DataSink, SinkResult};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder};
pub use error::DispatcherError;
pub use handle::{SinkHandle, SinkOutcome};
pub use metrics::{MetricsSnapshot, SinkMetrics};
#[cfg(feature = "aws")]
pub use sinks::{DynamoDbSink, RequestSigner};
pub use sinks::{FileSink, LogSink, OpenSearchSink};
