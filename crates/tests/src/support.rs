//! 测试辅助：可编排行为的 sink、记录事件的 observer、单次 HTTP 服务

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{
    Batch, BatchConfig, ContractError, DataSink, PipelineObserver, RunReport, RunState, SinkResult,
};
use ingestion::MockSourceTracker;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub fn batch_config(batch_size: usize) -> BatchConfig {
    BatchConfig {
        batch_size,
        max_workers: 4,
    }
}

/// sink 对每个批次的行为
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    /// 每批第 2 条记录失败
    FailSecond,
    /// 每次调用都 panic
    Panic,
}

/// sink 的共享观测数据
#[derive(Debug, Clone, Default)]
pub struct SinkTracker {
    closes: Arc<AtomicUsize>,
    batch_sizes: Arc<Mutex<Vec<usize>>>,
    pulled_at_finish: Arc<Mutex<Vec<usize>>>,
}

impl SinkTracker {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    /// 每次写入结束时数据源已被拉取的记录数
    pub fn pulled_at_finish(&self) -> Vec<usize> {
        self.pulled_at_finish.lock().unwrap().clone()
    }
}

pub struct ScriptedSink {
    name: String,
    behavior: Behavior,
    tracker: SinkTracker,
    delay: Duration,
    source: Option<MockSourceTracker>,
    cancel: Option<(usize, CancellationToken)>,
    close_error: Option<String>,
    calls: usize,
}

impl ScriptedSink {
    pub fn new(name: &str, behavior: Behavior, tracker: SinkTracker) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            tracker,
            delay: Duration::ZERO,
            source: None,
            cancel: None,
            close_error: None,
            calls: 0,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 写入结束时记录数据源的拉取进度
    pub fn watching(mut self, source: MockSourceTracker) -> Self {
        self.source = Some(source);
        self
    }

    /// 第 `calls` 次写入时触发取消
    pub fn cancel_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel = Some((calls, token));
        self
    }

    /// `close()` 返回错误
    pub fn failing_close(mut self, message: &str) -> Self {
        self.close_error = Some(message.to_string());
        self
    }
}

impl DataSink for ScriptedSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert_batch(&mut self, batch: &Batch) -> SinkResult {
        self.calls += 1;
        self.tracker.batch_sizes.lock().unwrap().push(batch.len());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(source) = &self.source {
            self.tracker.pulled_at_finish.lock().unwrap().push(source.pulled());
        }
        if let Some((after, token)) = &self.cancel {
            if self.calls == *after {
                token.cancel();
            }
        }

        match self.behavior {
            Behavior::Succeed => SinkResult::success(batch.len()),
            Behavior::FailSecond if batch.len() >= 2 => SinkResult::partial(
                batch.len(),
                1,
                vec![format!("record 1 of batch {} rejected", batch.index())],
            ),
            Behavior::FailSecond => SinkResult::success(batch.len()),
            Behavior::Panic => panic!("{} write exploded", self.name),
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.tracker.closes.fetch_add(1, Ordering::SeqCst);
        match &self.close_error {
            Some(message) => Err(ContractError::sink_connection(&self.name, message.clone())),
            None => Ok(()),
        }
    }
}

/// 记录所有事件的 observer
#[derive(Debug, Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<RunState>>,
    dispatched: Mutex<Vec<(u64, usize)>>,
    sink_results: AtomicUsize,
    completed: Mutex<Option<RunReport>>,
    failures: Mutex<Vec<String>>,
    close_failures: Mutex<Vec<(String, String)>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<RunState> {
        self.states.lock().unwrap().clone()
    }

    pub fn dispatched(&self) -> Vec<(u64, usize)> {
        self.dispatched.lock().unwrap().clone()
    }

    pub fn sink_results(&self) -> usize {
        self.sink_results.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> Option<RunReport> {
        self.completed.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }

    /// `(resource, error)` for every failed close
    pub fn close_failures(&self) -> Vec<(String, String)> {
        self.close_failures.lock().unwrap().clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_state_change(&self, _from: RunState, to: RunState) {
        self.states.lock().unwrap().push(to);
    }

    fn on_batch_dispatched(&self, batch_index: u64, records: usize, _sinks: usize) {
        self.dispatched.lock().unwrap().push((batch_index, records));
    }

    fn on_sink_result(&self, _sink: &str, _batch_index: u64, _result: &SinkResult, _elapsed: Duration) {
        self.sink_results.fetch_add(1, Ordering::SeqCst);
    }

    fn on_run_completed(&self, report: &RunReport, _elapsed: Duration) {
        *self.completed.lock().unwrap() = Some(report.clone());
    }

    fn on_run_failed(&self, error: &str, _elapsed: Duration) {
        self.failures.lock().unwrap().push(error.to_string());
    }

    fn on_close_failed(&self, resource: &str, error: &str) {
        self.close_failures
            .lock()
            .unwrap()
            .push((resource.to_string(), error.to_string()));
    }
}

/// 收到的 HTTP 请求
#[derive(Debug)]
pub struct CapturedRequest {
    /// 请求行与头部
    pub head: String,
    pub body: String,
}

/// 启动只服务一个请求的 HTTP 服务，返回 base URL 与捕获到的请求
pub async fn serve_once(status: u16, body: String) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };

        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            raw.extend_from_slice(&chunk[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while raw.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);
        }
        let request_body = String::from_utf8_lossy(&raw[header_end..]).to_string();

        let response = format!(
            "HTTP/1.1 {status} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
        let _ = tx.send(CapturedRequest {
            head,
            body: request_body,
        });
    });

    (format!("http://{addr}"), rx)
}
