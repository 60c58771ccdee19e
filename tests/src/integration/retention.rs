//! # Retention Flows
//!
//! Expiry driven by the node's own timer, and on-demand passes against an
//! archive fed through the hub.

#[cfg(test)]
mod tests {
    use crate::integration::support::{memory_config, wait_for_results};
    use log_archive::adapters::{BincodeMessageSerializer, InMemoryKVStore, ManualTimeSource};
    use log_archive::{
        ArchiveApi, ArchiveConfig, ArchiveDependencies, ArchiveEngine, ArchiveQuery,
        RetentionPolicy,
    };
    use logagg_node::{NodeConfig, NodeRuntime};
    use shared_bus::{BroadcastHub, MessagePublisher};
    use shared_types::Message;
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_expiry(keep: &[(&str, &str)]) -> NodeConfig {
        NodeConfig {
            clean_frequency_secs: 1,
            ..memory_config(keep)
        }
    }

    async fn ingest_all(runtime: &NodeRuntime, log_type: &str, count: usize) {
        for i in 0..count {
            let body = format!(r#"{{"type":"{log_type}","message":"{i}"}}"#);
            runtime.ingest().ingest(body.as_bytes()).await.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_immediate_rule_empties_bucket_on_timer() {
        let runtime = NodeRuntime::start(fast_expiry(&[("deploy", "0")])).await.unwrap();

        ingest_all(&runtime, "deploy", 3).await;
        ingest_all(&runtime, "app", 1).await;
        wait_for_results(&runtime, &[("type", "app")], 1).await;

        wait_for_results(&runtime, &[("type", "deploy")], 0).await;
        // Types without a rule are left alone.
        wait_for_results(&runtime, &[("type", "app")], 1).await;

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_count_rule_keeps_newest_on_timer() {
        let runtime = NodeRuntime::start(fast_expiry(&[("app", "5")])).await.unwrap();

        ingest_all(&runtime, "app", 10).await;
        wait_for_results(&runtime, &[("limit", "100")], 10).await;
        wait_for_results(&runtime, &[("limit", "100")], 5).await;

        let contents: Vec<String> = runtime
            .query()
            .query([("limit", "100")])
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["5", "6", "7", "8", "9"]);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_duration_rule_on_timer() {
        let runtime = NodeRuntime::start(fast_expiry(&[("app", "1s")])).await.unwrap();

        ingest_all(&runtime, "app", 2).await;
        wait_for_results(&runtime, &[], 2).await;
        wait_for_results(&runtime, &[], 0).await;

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_on_demand_expiry_after_hub_writes() {
        let hub = Arc::new(BroadcastHub::new());
        let clock = Arc::new(ManualTimeSource::new(0));
        let config = ArchiveConfig {
            retention: RetentionPolicy::parse([("app", "1s")]).unwrap(),
            ..ArchiveConfig::default()
        };
        let archive = Arc::new(
            ArchiveEngine::open(
                config,
                ArchiveDependencies {
                    store: Box::new(InMemoryKVStore::new()),
                    time_source: clock.clone(),
                    serializer: Arc::new(BincodeMessageSerializer),
                },
            )
            .unwrap(),
        );
        archive.start(Arc::clone(&hub)).await.unwrap();

        let now = Message::new("app", "").utime;
        clock.set(now);
        hub.publish(Message::new("app", "first")).await;
        hub.publish(Message::new("app", "second")).await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while archive.stats().unwrap().entries("app") < 2 {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Nothing is a full second old yet.
        assert_eq!(archive.expire().unwrap().entries_removed, 0);

        clock.advance(Duration::from_secs(2));
        let report = archive.expire().unwrap();
        assert_eq!(report.entries_removed, 2);
        assert!(archive.query(&ArchiveQuery::new("app")).unwrap().is_empty());

        archive.close().await.unwrap();
        hub.close().await;
    }
}
