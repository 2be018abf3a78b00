//! Mock 数据源
//!
//! 用于无 AWS 环境的测试，可注入拉取失败与中途失败。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use contracts::{ContractError, DataSource, Record, RecordStream};
use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::debug;

/// Mock 数据源的调用计数
///
/// 克隆后与数据源共享，测试在数据源被移入 pipeline 之后仍可读取。
#[derive(Debug, Clone, Default)]
pub struct MockSourceTracker {
    fetches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

impl MockSourceTracker {
    /// fetch 调用次数
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// close 调用次数
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// 已被消费者拉取的条目数（包括错误）
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

/// Mock 数据源
pub struct MockDataSource {
    name: String,
    records: Vec<Record>,
    fail_at: Option<(usize, String)>,
    fail_fetch: Option<String>,
    tracker: MockSourceTracker,
}

impl MockDataSource {
    /// 使用给定记录创建
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            name: "mock".to_string(),
            records,
            fail_at: None,
            fail_fetch: None,
            tracker: MockSourceTracker::default(),
        }
    }

    /// 生成 `n` 条带 `id` / `orgno` / `name` 字段的记录
    pub fn numbered(n: usize) -> Self {
        let records = (0..n)
            .map(|i| {
                Record::from_pairs([
                    ("id", json!(i)),
                    ("orgno", json!(format!("{:09}", 900_000_000 + i))),
                    ("name", json!(format!("record-{i}"))),
                ])
            })
            .collect();
        Self::new(records)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 在第 `index` 条记录（从 0 开始）处产生错误并结束流
    pub fn fail_at(mut self, index: usize, message: impl Into<String>) -> Self {
        self.fail_at = Some((index, message.into()));
        self
    }

    /// fetch 直接失败
    pub fn fail_fetch(mut self, message: impl Into<String>) -> Self {
        self.fail_fetch = Some(message.into());
        self
    }

    /// 获取共享计数器
    pub fn tracker(&self) -> MockSourceTracker {
        self.tracker.clone()
    }
}

impl DataSource for MockDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&mut self, query: &str) -> Result<RecordStream, ContractError> {
        self.tracker.fetches.fetch_add(1, Ordering::SeqCst);
        debug!(source = %self.name, query, "Mock fetch");

        if let Some(message) = &self.fail_fetch {
            return Err(ContractError::source(&self.name, message.clone()));
        }

        let mut items: Vec<Result<Record, ContractError>> = self.records.iter().cloned().map(Ok).collect();
        if let Some((index, message)) = &self.fail_at {
            items.truncate(*index);
            items.push(Err(ContractError::source(&self.name, message.clone())));
        }

        let pulled = self.tracker.pulled.clone();
        Ok(stream::iter(items)
            .map(move |item| {
                pulled.fetch_add(1, Ordering::SeqCst);
                item
            })
            .boxed())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.tracker.closes.fetch_add(1, Ordering::SeqCst);
        debug!(source = %self.name, "Mock source closed");
        Ok(())
    }
}
