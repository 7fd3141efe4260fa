//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（无需 Redis，使用 MockStore）

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(contracts::MESSAGE_ID_LEN, 16);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Arg, Command, Delivery, MessageId, RelayBlueprint};
    use dispatcher::{from_routes, Dispatcher, DispatcherConfig, DispatcherState};
    use ingestion::{Consumer, MockSource};
    use store_client::MockStore;
    use tokio::sync::watch;

    fn blueprint(extra: &str) -> RelayBlueprint {
        let toml = format!(
            r#"
[store]
url = "redis://127.0.0.1:6379"

[consumer]
concurrency = 1
max_attempts = 2
requeue_delay_ms = 1

{extra}
"#
        );
        ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap()
    }

    async fn relay(store: &MockStore, blueprint: &RelayBlueprint) -> Dispatcher<MockStore> {
        let mut dispatcher = Dispatcher::new(store.clone(), DispatcherConfig::from(blueprint))
            .await
            .unwrap();
        for handler in from_routes(&blueprint.routes).unwrap() {
            dispatcher.register(handler);
        }
        dispatcher
    }

    fn delivery(seq: u64, body: &'static str) -> Delivery {
        Delivery::new(MessageId::from_sequence(seq), Bytes::from_static(body.as_bytes()))
    }

    const RECENT: &str = r#"
[[routes]]
name = "recent"
kind = "list"
format = "recent:{projectId}"
size = 2
"#;

    const EVENTS: &str = r#"
[[routes]]
name = "events"
kind = "publish"
format = "events:{projectId}"
"#;

    /// Per-message 模式：一条消息 -> 一次 flush，key 由消息内容决定
    #[tokio::test]
    async fn test_per_message_list_route() {
        let store = MockStore::new();
        let bp = blueprint(RECENT);
        let dispatcher = relay(&store, &bp).await;

        let body = r#"{"projectId":"p1","n":1}"#;
        dispatcher.dispatch(&delivery(1, body)).await.unwrap();

        assert_eq!(store.flushes(), 1);
        assert_eq!(
            store.commands(),
            vec![
                Command::lpush("recent:p1", Bytes::from_static(body.as_bytes())),
                Command::ltrim("recent:p1", 0, 1),
            ]
        );

        dispatcher.stop().await.unwrap();
        // Per-message mode has nothing left to flush on stop.
        assert_eq!(store.flushes(), 1);
    }

    /// Batched 模式：两条消息在 tick 前不落库，tick 后一次性 flush
    #[tokio::test(start_paused = true)]
    async fn test_batched_publish_waits_for_tick() {
        let store = MockStore::new();
        let bp = blueprint(&format!("[dispatch]\nflush_interval_ms = 100\n{EVENTS}"));
        let dispatcher = relay(&store, &bp).await;

        dispatcher
            .dispatch(&delivery(1, r#"{"projectId":"a"}"#))
            .await
            .unwrap();
        dispatcher
            .dispatch(&delivery(2, r#"{"projectId":"b"}"#))
            .await
            .unwrap();
        assert_eq!(store.flushes(), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        let channels: Vec<&Arg> = batches[0].iter().map(|c| &c.args()[0]).collect();
        assert_eq!(
            channels,
            [&Arg::Str("events:a".into()), &Arg::Str("events:b".into())]
        );

        dispatcher.stop().await.unwrap();
        assert_eq!(store.flushes(), 1);
    }

    /// stop 在第一次 tick 之前：恰好一次最终 flush
    #[tokio::test(start_paused = true)]
    async fn test_stop_before_tick_flushes_once() {
        let store = MockStore::new();
        let bp = blueprint(&format!("[dispatch]\nflush_interval_ms = 60000\n{EVENTS}"));
        let dispatcher = relay(&store, &bp).await;

        dispatcher
            .dispatch(&delivery(1, r#"{"projectId":"a"}"#))
            .await
            .unwrap();
        dispatcher.stop().await.unwrap();

        assert_eq!(store.flushes(), 1);
        assert_eq!(store.commands().len(), 1);
        assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    }

    /// MockSource -> Consumer -> Dispatcher -> MockStore
    #[tokio::test]
    async fn test_consumer_drives_dispatcher() {
        let store = MockStore::new();
        let bp = blueprint(&format!("{RECENT}{EVENTS}"));
        let dispatcher = Arc::new(relay(&store, &bp).await);

        let source = MockSource::from_bodies(
            "mock",
            [
                r#"{"projectId":"p1"}"#,
                "not json",
                r#"{"projectId":"p2"}"#,
                r#"{"projectId":"p1"}"#,
            ],
        );
        let consumer = Consumer::new(bp.consumer.clone()).unwrap();
        let (_tx, rx) = watch::channel(false);

        let stats = consumer
            .run(source, Arc::clone(&dispatcher), rx)
            .await
            .unwrap();
        dispatcher.stop().await.unwrap();

        // Malformed bodies are acked and dropped, never requeued.
        assert_eq!(stats.received, 4);
        assert_eq!(stats.acked, 4);
        assert_eq!(stats.requeued, 0);

        let snapshot = dispatcher.metrics();
        assert_eq!(snapshot.dispatched, 3);
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(snapshot.flushes, 3);

        // LPUSH + LTRIM + PUBLISH per valid message.
        let commands = store.commands();
        assert_eq!(commands.len(), 9);
        let names: Vec<&str> = commands.iter().take(3).map(Command::name).collect();
        assert_eq!(names, ["LPUSH", "LTRIM", "PUBLISH"]);
    }

    /// 限流：同一 key 超出速率的消息被 ack 后丢弃
    #[tokio::test]
    async fn test_rate_limited_messages_are_acked_and_dropped() {
        let store = MockStore::new();
        let bp = blueprint(&format!(
            "[rate_limit]\nrate = 1\nsize = 16\nkey = \"projectId\"\n{EVENTS}"
        ));
        let dispatcher = Arc::new(relay(&store, &bp).await);

        let source = MockSource::from_bodies(
            "mock",
            [
                r#"{"projectId":"hot"}"#,
                r#"{"projectId":"hot"}"#,
                r#"{"projectId":"hot"}"#,
                r#"{"projectId":"cold"}"#,
            ],
        );
        let consumer = Consumer::new(bp.consumer.clone()).unwrap();
        let (_tx, rx) = watch::channel(false);

        let stats = consumer
            .run(source, Arc::clone(&dispatcher), rx)
            .await
            .unwrap();
        dispatcher.stop().await.unwrap();

        assert_eq!(stats.acked, 4);
        let snapshot = dispatcher.metrics();
        assert_eq!(snapshot.rate_limited, 2);
        assert_eq!(snapshot.dispatched, 2);
        assert_eq!(store.commands().len(), 2);
    }

    /// Batched 模式并发：多任务同时分发，定时 flush 与之竞争同一把锁
    ///
    /// 没有命令丢失，且每条消息的 LPUSH/LTRIM 在同一批次内相邻。
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_batched_dispatch_keeps_messages_whole() {
        const TASKS: usize = 50;
        const PER_TASK: usize = 40;

        let store = MockStore::new();
        let bp = blueprint(&format!("[dispatch]\nflush_interval_ms = 1\n{RECENT}"));
        let dispatcher = Arc::new(relay(&store, &bp).await);

        let mut tasks = tokio::task::JoinSet::new();
        for task in 0..TASKS {
            let dispatcher = Arc::clone(&dispatcher);
            tasks.spawn(async move {
                for n in 0..PER_TASK {
                    let body = format!(r#"{{"projectId":"t{task}","n":{n}}}"#);
                    let id = MessageId::from_sequence((task * PER_TASK + n) as u64);
                    dispatcher
                        .dispatch(&Delivery::new(id, Bytes::from(body)))
                        .await
                        .unwrap();
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }
        dispatcher.stop().await.unwrap();

        let batches = store.batches();
        let total: usize = batches.iter().map(Vec::len).sum();
        assert_eq!(total, TASKS * PER_TASK * 2);

        let mut pushes_per_key = std::collections::HashMap::new();
        for batch in &batches {
            assert_eq!(batch.len() % 2, 0, "a message was split across flushes");
            for pair in batch.chunks(2) {
                assert_eq!(pair[0].name(), "LPUSH");
                assert_eq!(pair[1].name(), "LTRIM");
                assert_eq!(pair[0].args()[0], pair[1].args()[0]);
                let Arg::Str(key) = &pair[0].args()[0] else {
                    panic!("list key is not text: {}", pair[0]);
                };
                *pushes_per_key.entry(key.clone()).or_insert(0usize) += 1;
            }
        }
        assert_eq!(pushes_per_key.len(), TASKS);
        assert!(pushes_per_key.values().all(|n| *n == PER_TASK));

        let snapshot = dispatcher.metrics();
        assert_eq!(snapshot.dispatched, (TASKS * PER_TASK) as u64);
        assert_eq!(snapshot.routed, (TASKS * PER_TASK) as u64);
        assert_eq!(snapshot.flush_errors, 0);
    }

    /// 存储失败：消息被重投直到 max_attempts
    #[tokio::test]
    async fn test_store_failure_requeues_until_exhausted() {
        let store = MockStore::with_config(store_client::MockConfig {
            fail_flush: true,
            ..Default::default()
        });
        let bp = blueprint(EVENTS);
        let dispatcher = Arc::new(relay(&store, &bp).await);

        let source = MockSource::from_bodies("mock", [r#"{"projectId":"a"}"#]);
        let consumer = Consumer::new(bp.consumer.clone()).unwrap();
        let (_tx, rx) = watch::channel(false);

        let stats = consumer
            .run(source, Arc::clone(&dispatcher), rx)
            .await
            .unwrap();

        assert_eq!(stats.requeued, 1);
        assert_eq!(stats.exhausted, 1);
        assert_eq!(stats.acked, 0);
        assert_eq!(dispatcher.metrics().flush_errors, 2);
        assert!(store.commands().is_empty());
    }
}
