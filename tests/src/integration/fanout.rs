//! # Fan-out Alongside the Archive
//!
//! Extra outputs on the node's hub must not disturb the archive's write
//! path, whatever they do.

#[cfg(test)]
mod tests {
    use crate::integration::support::{memory_config, wait_for_results, WAIT};
    use logagg_node::NodeRuntime;
    use log_archive::ARCHIVE_TAG;
    use parking_lot::Mutex;
    use shared_types::Message;
    use std::sync::Arc;
    use std::time::Duration;

    fn contents(runtime: &NodeRuntime) -> Vec<String> {
        runtime
            .query()
            .query([("limit", "1000")])
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_extra_output_sees_same_order_as_archive() {
        let runtime = NodeRuntime::start(memory_config(&[])).await.unwrap();
        let hub = Arc::clone(&runtime.container().hub);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hub.subscribe("collector", move |m: Message| sink.lock().push(m.content))
            .await
            .unwrap();
        assert_eq!(hub.tags(), vec![ARCHIVE_TAG.to_string(), "collector".to_string()]);

        for i in 0..50 {
            let body = format!(r#"{{"message":"{i}"}}"#);
            assert_eq!(runtime.ingest().ingest(body.as_bytes()).await.unwrap(), 2);
        }
        wait_for_results(&runtime, &[("limit", "1000")], 50).await;

        let deadline = tokio::time::Instant::now() + WAIT;
        while seen.lock().len() < 50 {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(*seen.lock(), contents(&runtime));
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unsubscribe_during_ingest_leaves_archive_whole() {
        let runtime = Arc::new(NodeRuntime::start(memory_config(&[])).await.unwrap());
        let hub = Arc::clone(&runtime.container().hub);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hub.subscribe("flaky", move |m: Message| sink.lock().push(m.content))
            .await
            .unwrap();

        let producer = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move {
                for i in 0..200 {
                    let body = format!(r#"{{"message":"{i}"}}"#);
                    runtime.ingest().ingest(body.as_bytes()).await.unwrap();
                }
            })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(hub.unsubscribe("flaky").await);
        tokio::time::timeout(WAIT, producer).await.unwrap().unwrap();

        wait_for_results(&runtime, &[("limit", "1000")], 200).await;
        let archived = contents(&runtime);
        let expected: Vec<String> = (0..200).map(|i| i.to_string()).collect();
        assert_eq!(archived, expected);

        // The removed output saw a gap-free prefix, each message at most once.
        let seen = seen.lock().clone();
        assert_eq!(seen[..], expected[..seen.len()]);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_output_does_not_stop_archive() {
        let runtime = NodeRuntime::start(memory_config(&[])).await.unwrap();
        let hub = Arc::clone(&runtime.container().hub);
        hub.subscribe("broken", |m: Message| {
            if m.content.starts_with("boom") {
                panic!("output failure");
            }
        })
        .await
        .unwrap();

        for body in [r#"{"message":"boom 1"}"#, r#"{"message":"fine"}"#, r#"{"message":"boom 2"}"#] {
            runtime.ingest().ingest(body.as_bytes()).await.unwrap();
        }
        wait_for_results(&runtime, &[], 3).await;

        let deadline = tokio::time::Instant::now() + WAIT;
        while hub.handler_panics() < 2 {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(contents(&runtime), vec!["boom 1", "fine", "boom 2"]);
        assert_eq!(runtime.container().archive.write_failures(), 0);

        runtime.shutdown().await.unwrap();
    }
}
