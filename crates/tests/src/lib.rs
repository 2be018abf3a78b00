//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（无需 AWS）：mock 数据源 → 引擎 → dispatcher → sinks
//! - OpenSearch bulk 协议测试（本地 HTTP 服务）

#[cfg(test)]
mod support;

#[cfg(test)]
mod contract_tests {
    use contracts::{SinkResult, SinkTotals};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_sink_result_identity() {
        let results = [
            SinkResult::success(0),
            SinkResult::success(7),
            SinkResult::partial(5, 2, vec!["e".into()]),
            SinkResult::partial(3, 9, Vec::new()),
            SinkResult::total_failure(4, "down"),
        ];
        for result in &results {
            assert!(result.is_consistent(), "{result:?}");
            assert_eq!(
                result.total_records,
                result.successful_records + result.failed_records
            );
        }
        assert_eq!(SinkResult::success(0).success_rate(), 0.0);
        assert_eq!(SinkResult::partial(4, 1, Vec::new()).success_rate(), 75.0);
    }

    #[test]
    fn test_totals_fold_equals_merge() {
        let batches = [
            SinkResult::success(2),
            SinkResult::partial(2, 1, vec!["x".into()]),
            SinkResult::total_failure(1, "y"),
        ];

        let mut folded = SinkTotals::default();
        for result in &batches {
            folded.fold(result);
        }

        let mut left = SinkTotals::default();
        left.fold(&batches[0]);
        let mut right = SinkTotals::default();
        right.fold(&batches[1]);
        right.fold(&batches[2]);
        left.merge(&right);

        assert_eq!(folded, left);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dispatcher::{Dispatcher, LogSink, SinkHandle};
    use etl_engine::{CancellationToken, Pipeline, RunState};
    use ingestion::MockDataSource;

    use crate::support::{batch_config, Behavior, RecordingObserver, ScriptedSink, SinkTracker};

    fn dispatcher(sinks: Vec<SinkHandle>, max_workers: usize) -> Dispatcher {
        Dispatcher::with_handles(sinks, max_workers).unwrap()
    }

    /// 3 个 sink：全部成功 / 每批第 2 条失败 / 每次调用都 panic
    #[tokio::test]
    async fn test_three_sink_scenario() {
        let source = MockDataSource::numbered(5);
        let tracker_a = SinkTracker::default();
        let tracker_b = SinkTracker::default();
        let tracker_c = SinkTracker::default();
        let sinks = vec![
            SinkHandle::spawn(ScriptedSink::new("A", Behavior::Succeed, tracker_a.clone())),
            SinkHandle::spawn(ScriptedSink::new("B", Behavior::FailSecond, tracker_b.clone())),
            SinkHandle::spawn(ScriptedSink::new("C", Behavior::Panic, tracker_c.clone())),
        ];

        let pipeline = Pipeline::new(source, dispatcher(sinks, 3), batch_config(2)).unwrap();
        let report = pipeline.execute("SELECT * FROM companies").await.unwrap();

        assert_eq!(report.total_batches, 3);
        assert_eq!(tracker_a.batch_sizes(), vec![2, 2, 1]);

        let a = report.sink("A").unwrap();
        assert_eq!((a.total_records, a.successful_records, a.failed_records), (5, 5, 0));
        let b = report.sink("B").unwrap();
        assert_eq!((b.total_records, b.successful_records, b.failed_records), (5, 3, 2));
        let c = report.sink("C").unwrap();
        assert_eq!((c.total_records, c.successful_records, c.failed_records), (5, 0, 5));
        assert_eq!(c.error_count, 3);
        assert!(c.error_samples[0].contains("panicked"));

        for tracker in [&tracker_a, &tracker_b, &tracker_c] {
            assert_eq!(tracker.closes(), 1);
        }
    }

    /// 第 2 个批次（共 3 个）中途源出错：source 与每个 sink 仍只关闭一次
    #[tokio::test]
    async fn test_close_once_on_mid_stream_failure() {
        let source = MockDataSource::numbered(5).fail_at(3, "connection reset");
        let source_tracker = source.tracker();
        let trackers = [SinkTracker::default(), SinkTracker::default()];
        let sinks = vec![
            SinkHandle::spawn(ScriptedSink::new("kv", Behavior::Succeed, trackers[0].clone())),
            SinkHandle::spawn(ScriptedSink::new("search", Behavior::Succeed, trackers[1].clone())),
        ];

        let pipeline = Pipeline::new(source, dispatcher(sinks, 2), batch_config(2)).unwrap();
        let err = pipeline.execute("").await.unwrap_err();

        assert_eq!(err.kind(), "batch_processing");
        assert_eq!(source_tracker.closes(), 1);
        for tracker in &trackers {
            assert_eq!(tracker.closes(), 1);
            // only the first batch was written; nothing is rolled back
            assert_eq!(tracker.batch_sizes(), vec![2]);
        }
    }

    /// sink 关闭失败只通知 observer，不改变运行结果
    #[tokio::test]
    async fn test_close_failure_keeps_report() {
        let observer = Arc::new(RecordingObserver::default());
        let kv = SinkTracker::default();
        let sinks = vec![
            SinkHandle::spawn(ScriptedSink::new("kv", Behavior::Succeed, kv.clone()).failing_close("flush lost")),
            SinkHandle::spawn(LogSink::new("log")),
        ];

        let pipeline = Pipeline::new(MockDataSource::numbered(3), dispatcher(sinks, 2), batch_config(2))
            .unwrap()
            .with_observer(observer.clone());
        let report = pipeline.execute("").await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.sink("kv").unwrap().successful_records, 3);
        assert_eq!(kv.closes(), 1);

        let close_failures = observer.close_failures();
        assert_eq!(close_failures.len(), 1);
        assert_eq!(close_failures[0].0, "kv");
        assert!(close_failures[0].1.contains("flush lost"));
        assert!(observer.failures().is_empty());
        assert_eq!(observer.states().last(), Some(&RunState::Closed));
    }

    /// 源出错时 sink 关闭失败不会覆盖原始错误
    #[tokio::test]
    async fn test_close_failure_keeps_batch_error() {
        let observer = Arc::new(RecordingObserver::default());
        let kv = SinkTracker::default();
        let sinks = vec![SinkHandle::spawn(
            ScriptedSink::new("kv", Behavior::Succeed, kv.clone()).failing_close("flush lost"),
        )];
        let source = MockDataSource::numbered(5).fail_at(3, "connection reset");

        let pipeline = Pipeline::new(source, dispatcher(sinks, 1), batch_config(2))
            .unwrap()
            .with_observer(observer.clone());
        let err = pipeline.execute("").await.unwrap_err();

        assert_eq!(err.kind(), "batch_processing");
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(kv.closes(), 1);
        assert_eq!(observer.close_failures().len(), 1);
        assert_eq!(observer.failures().len(), 1);
        assert!(observer.failures()[0].contains("connection reset"));
    }

    /// 下一个批次必须在最慢的 sink 返回之后才开始拉取
    #[tokio::test]
    async fn test_barrier_before_next_pull() {
        let source = MockDataSource::numbered(6);
        let pulled = source.tracker();
        let slow = SinkTracker::default();
        let fast = SinkTracker::default();
        let sinks = vec![
            SinkHandle::spawn(
                ScriptedSink::new("slow", Behavior::Succeed, slow.clone())
                    .with_delay(Duration::from_millis(40))
                    .watching(pulled.clone()),
            ),
            SinkHandle::spawn(
                ScriptedSink::new("fast", Behavior::Succeed, fast.clone()).watching(pulled.clone()),
            ),
        ];

        let pipeline = Pipeline::new(source, dispatcher(sinks, 2), batch_config(2)).unwrap();
        let report = pipeline.execute("").await.unwrap();
        assert_eq!(report.total_batches, 3);

        // records pulled when each write finished: never past the batch in flight
        for tracker in [&slow, &fast] {
            let seen = tracker.pulled_at_finish();
            assert_eq!(seen.len(), 3);
            for (index, pulled) in seen.iter().enumerate() {
                assert!(
                    *pulled <= (index + 1) * 2,
                    "batch {index} finished after {pulled} records were pulled"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_cancel_between_batches() {
        let token = CancellationToken::new();
        let source = MockDataSource::numbered(10);
        let source_tracker = source.tracker();
        let tracker = SinkTracker::default();
        let sinks = vec![SinkHandle::spawn(
            ScriptedSink::new("kv", Behavior::Succeed, tracker.clone()).cancel_after(2, token.clone()),
        )];

        let pipeline = Pipeline::new(source, dispatcher(sinks, 1), batch_config(2))
            .unwrap()
            .with_cancellation(token);
        let report = pipeline.execute("").await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.total_batches, 2);
        assert_eq!(report.sink("kv").unwrap().successful_records, 4);
        assert_eq!(source_tracker.closes(), 1);
        assert_eq!(tracker.closes(), 1);
    }

    #[tokio::test]
    async fn test_observer_sees_every_event() {
        let observer = Arc::new(RecordingObserver::default());
        let sinks = vec![
            SinkHandle::spawn(LogSink::new("log")),
            SinkHandle::spawn(ScriptedSink::new("kv", Behavior::FailSecond, SinkTracker::default())),
        ];

        let pipeline = Pipeline::new(MockDataSource::numbered(3), dispatcher(sinks, 2), batch_config(2))
            .unwrap()
            .with_observer(observer.clone());
        let report = pipeline.execute("").await.unwrap();

        assert_eq!(
            observer.states(),
            vec![
                RunState::Fetching,
                RunState::Dispatching { batch_index: 0 },
                RunState::Dispatching { batch_index: 1 },
                RunState::Aggregated,
                RunState::Closed,
            ]
        );
        assert_eq!(observer.dispatched(), vec![(0, 2), (1, 1)]);
        assert_eq!(observer.sink_results(), 4);
        assert_eq!(observer.completed(), Some(report));
        assert!(observer.failures().is_empty());
    }

    #[tokio::test]
    async fn test_observer_sees_fetch_failure() {
        let observer = Arc::new(RecordingObserver::default());
        let sinks = vec![SinkHandle::spawn(LogSink::new("log"))];
        let source = MockDataSource::numbered(3).fail_fetch("query FAILED: table not found");

        let pipeline = Pipeline::new(source, dispatcher(sinks, 1), batch_config(2))
            .unwrap()
            .with_observer(observer.clone());
        assert!(pipeline.execute("").await.is_err());

        assert_eq!(observer.failures().len(), 1);
        assert!(observer.failures()[0].contains("table not found"));
        assert_eq!(observer.states().last(), Some(&RunState::Closed));
        assert!(observer.completed().is_none());
    }

    #[tokio::test]
    async fn test_metrics_observer_summary() {
        let observer = Arc::new(observability::MetricsObserver::new());
        let sinks = vec![
            SinkHandle::spawn(LogSink::new("log")),
            SinkHandle::spawn(ScriptedSink::new("kv", Behavior::Succeed, SinkTracker::default())),
        ];

        let pipeline = Pipeline::new(MockDataSource::numbered(5), dispatcher(sinks, 2), batch_config(2))
            .unwrap()
            .with_observer(observer.clone());
        pipeline.execute("").await.unwrap();

        let summary = observer.summary();
        assert_eq!(summary.sinks["log"].count, 3);
        assert_eq!(summary.sinks["kv"].count, 3);
    }
}

#[cfg(test)]
mod file_pipeline_tests {
    use std::io::Write;

    use config_loader::{resolve_query, ConfigLoader};
    use contracts::SourceConfig;
    use dispatcher::DispatcherBuilder;
    use etl_engine::Pipeline;
    use ingestion::FileSource;

    /// 配置文件 → NDJSON 源 → 文件 sink，完整流程
    #[tokio::test]
    async fn test_file_to_file_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("companies.ndjson");
        let mut file = std::fs::File::create(&input).unwrap();
        for i in 0..7 {
            writeln!(
                file,
                r#"{{"orgno":"{:09}","vehicles_meta":"[{{\"count\":{i}}}]"}}"#,
                556_000_000 + i
            )
            .unwrap();
        }
        let output = dir.path().join("out.ndjson");

        let config = format!(
            r#"
[source]
kind = "file"
path = "{}"

[batch]
batch_size = 3
max_workers = 2

[[sinks]]
name = "archive"
sink_type = "file"
path = "{}"
append = false

[[sinks]]
name = "debug"
sink_type = "log"
"#,
            input.display(),
            output.display()
        );
        let config_path = dir.path().join("pipeline.toml");
        std::fs::write(&config_path, config).unwrap();

        let blueprint = ConfigLoader::load_from_path(&config_path).unwrap();
        let query = resolve_query(&blueprint.query, config_path.parent()).unwrap();
        let SourceConfig::File(source) = &blueprint.source else {
            panic!("expected file source");
        };

        let dispatcher = DispatcherBuilder::new(blueprint.sinks.clone(), blueprint.batch.max_workers)
            .build()
            .await
            .unwrap();
        let pipeline = Pipeline::new(FileSource::new(&source.path), dispatcher, blueprint.batch).unwrap();
        let report = pipeline.execute(&query).await.unwrap();

        assert_eq!(report.total_batches, 3);
        assert!(report.is_clean());
        assert_eq!(report.sink("archive").unwrap().successful_records, 7);

        let written: Vec<serde_json::Value> = std::fs::read_to_string(&output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(written.len(), 7);
        assert_eq!(written[0]["orgno"], "556000000");
        assert_eq!(written[6]["orgno"], "556000006");
    }

    #[tokio::test]
    async fn test_malformed_line_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.ndjson");
        std::fs::write(&input, "{\"id\":1}\n{\"id\":2}\nnot json\n{\"id\":4}\n").unwrap();

        let dispatcher = dispatcher::Dispatcher::with_handles(
            vec![dispatcher::SinkHandle::spawn(dispatcher::LogSink::new("log"))],
            1,
        )
        .unwrap();
        let pipeline = Pipeline::new(FileSource::new(&input), dispatcher, crate::support::batch_config(2)).unwrap();

        let err = pipeline.execute("").await.unwrap_err();
        assert_eq!(err.kind(), "batch_processing");
        assert!(err.to_string().contains("batch"));
    }
}

#[cfg(test)]
mod opensearch_tests {
    use contracts::{Batch, DataSink, OpenSearchConfig, Record};
    use dispatcher::OpenSearchSink;
    use serde_json::json;

    use crate::support::serve_once;

    fn config(endpoint: String) -> OpenSearchConfig {
        OpenSearchConfig {
            id_field: "orgno".into(),
            username: Some("etl".into()),
            password: Some("secret".into()),
            request_timeout_secs: 5,
            ..OpenSearchConfig::new(endpoint, "companies")
        }
    }

    #[tokio::test]
    async fn test_bulk_item_errors_are_counted() {
        let response = json!({
            "took": 3,
            "errors": true,
            "items": [
                { "update": { "_id": "556000001", "status": 200 } },
                { "update": { "_id": "556000002", "status": 400,
                    "error": { "type": "mapper_parsing_exception", "reason": "failed to parse" } } },
                { "update": { "_id": "556000003", "status": 201 } }
            ]
        });
        let (endpoint, request) = serve_once(200, response.to_string()).await;

        let mut sink = OpenSearchSink::new("search", config(endpoint)).unwrap();
        let batch = Batch::new(
            0,
            vec![
                Record::from_pairs([("orgno", json!("556000001")), ("name", json!("a"))]),
                Record::from_pairs([("orgno", json!("556000002")), ("name", json!("b"))]),
                Record::from_pairs([("orgno", json!("556000003")), ("name", json!("c"))]),
                Record::from_pairs([("name", json!("no id"))]),
            ],
        );

        let result = sink.upsert_batch(&batch).await;
        assert_eq!(result.total_records, 4);
        assert_eq!(result.successful_records, 2);
        assert_eq!(result.failed_records, 2);
        assert!(result.errors.iter().any(|e| e.contains("failed to parse")));

        let request = request.await.unwrap();
        assert!(request.head.starts_with("POST /companies/_bulk"));
        assert!(request.head.to_lowercase().contains("authorization: basic"));
        let lines: Vec<&str> = request.body.lines().collect();
        assert_eq!(lines.len(), 6);
        let action: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["update"]["_id"], "556000001");
        let doc: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(doc["doc"]["name"], "a");
        assert!(doc["doc"].get("orgno").is_none());
        assert_eq!(doc["doc_as_upsert"], true);

        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_http_error_is_total_failure() {
        let (endpoint, _request) = serve_once(503, "{\"error\":\"unavailable\"}".to_string()).await;

        let mut sink = OpenSearchSink::new("search", config(endpoint)).unwrap();
        let batch = Batch::new(
            1,
            vec![
                Record::from_pairs([("orgno", json!("1"))]),
                Record::from_pairs([("orgno", json!("2"))]),
            ],
        );

        let result = sink.upsert_batch(&batch).await;
        assert_eq!(result.failed_records, 2);
        assert_eq!(result.successful_records, 0);
        assert!(result.errors[0].contains("503"));
    }

    #[cfg(feature = "aws")]
    #[tokio::test]
    async fn test_sigv4_signed_bulk_request() {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;
        use contracts::OpenSearchAuth;
        use dispatcher::RequestSigner;

        let response = json!({ "errors": false, "items": [ { "update": { "status": 200 } } ] });
        let (endpoint, request) = serve_once(200, response.to_string()).await;

        let credentials = Credentials::new("AKIDEXAMPLE", "secret", Some("token".into()), None, "test");
        let signer = RequestSigner::new(SharedCredentialsProvider::new(credentials), "eu-north-1", "es");
        let cfg = OpenSearchConfig {
            auth: OpenSearchAuth::Sigv4,
            ..config(endpoint)
        };
        let mut sink = OpenSearchSink::new("search", cfg).unwrap().with_signer(signer);

        let batch = Batch::new(0, vec![Record::from_pairs([("orgno", json!("556000001"))])]);
        let result = sink.upsert_batch(&batch).await;
        assert_eq!(result.successful_records, 1);

        let head = request.await.unwrap().head.to_lowercase();
        assert!(head.contains("authorization: aws4-hmac-sha256 credential=akidexample/"));
        assert!(head.contains("/eu-north-1/es/aws4_request"));
        assert!(head.contains("signedheaders=content-type;host;x-amz-date"));
        assert!(head.contains("x-amz-date: "));
        assert!(head.contains("x-amz-security-token: token"));
        assert!(!head.contains("authorization: basic"));

        sink.close().await.unwrap();
    }
}
