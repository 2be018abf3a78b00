//! # ETL Engine
//!
//! 批处理编排核心。
//!
//! 负责：
//! - 从数据源拉取记录流并按批次切分
//! - 每个批次并发写入所有 sinks，全部完成后才拉取下一批次
//! - 汇总每个 sink 的结果为 `RunReport`
//! - 无论成功、失败或取消，数据源与 sinks 都只关闭一次
//!
//! ## 使用示例
//!
//! ```ignore
//! use etl_engine::Pipeline;
//!
//! let pipeline = Pipeline::new(source, dispatcher, blueprint.batch)?
//!     .with_observer(observer);
//! let report = pipeline.execute("SELECT * FROM companies").await?;
//! ```

mod aggregator;
mod engine;
mod error;
mod guard;
mod state;

pub use aggregator::Aggregator;
pub use engine::Pipeline;
pub use error::PipelineError;
pub use guard::ResourceGuard;
pub use state::RunStateMachine;

pub use contracts::{NoopObserver, PipelineObserver, RunReport, RunState, SinkTotals};
pub use tokio_util::sync::CancellationToken;
