//! # Ingest to Query
//!
//! Bodies go in through the ingest boundary, cross the hub into the archive,
//! and come back out through the query boundary.

#[cfg(test)]
mod tests {
    use crate::integration::support::{file_config, memory_config, wait_for_results};
    use logagg_node::handlers::{QueryError, QueryParamError, RAW_TAG};
    use logagg_node::NodeRuntime;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_published_log_is_queryable_by_host() {
        let runtime = NodeRuntime::start(memory_config(&[])).await.unwrap();

        runtime
            .ingest()
            .ingest(br#"{"type":"app","id":"log-test","message":"test log"}"#)
            .await
            .unwrap();
        wait_for_results(&runtime, &[("id", "log-test")], 1).await;

        let found = runtime
            .query()
            .query([
                ("type", "app"),
                ("id", "log-test"),
                ("start", "0"),
                ("end", "0"),
                ("limit", "1"),
                ("level", "TRACE"),
            ])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "test log");

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_arrival_order_is_query_order() {
        let runtime = NodeRuntime::start(memory_config(&[])).await.unwrap();

        for i in 0..100 {
            let body = format!(r#"{{"message":"{i}"}}"#);
            runtime.ingest().ingest(body.as_bytes()).await.unwrap();
        }
        wait_for_results(&runtime, &[("limit", "1000")], 100).await;

        let contents: Vec<String> = runtime
            .query()
            .query([("limit", "1000")])
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        assert_eq!(contents, expected);

        // Tail of the same bucket.
        let tail = runtime.query().query([("limit", "3")]).unwrap();
        let tail: Vec<&str> = tail.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(tail, vec!["97", "98", "99"]);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_filters_through_query_params() {
        let runtime = NodeRuntime::start(memory_config(&[])).await.unwrap();
        let bodies: [&[u8]; 4] = [
            br#"{"id":"h1","priority":1,"tag":["db"],"message":"h1 error"}"#,
            br#"{"id":"h1","priority":5,"tag":["web"],"message":"h1 trace"}"#,
            br#"{"id":"h2","priority":0,"message":"h2 fatal"}"#,
            b"plain text line",
        ];
        for body in bodies {
            runtime.ingest().ingest(body).await.unwrap();
        }
        wait_for_results(&runtime, &[], 4).await;

        let contents = |pairs: &[(&str, &str)]| -> Vec<String> {
            runtime
                .query()
                .query(pairs.iter().copied())
                .unwrap()
                .into_iter()
                .map(|m| m.content)
                .collect()
        };

        assert_eq!(contents(&[("id", "h1")]), vec!["h1 error", "h1 trace"]);
        assert_eq!(contents(&[("level", "error")]), vec!["h1 error", "h2 fatal"]);
        assert_eq!(contents(&[("tag", "web"), ("tag", "db")]), vec!["h1 error", "h1 trace"]);
        assert_eq!(contents(&[("tag", RAW_TAG)]), vec!["plain text line"]);
        assert_eq!(contents(&[("level", "warn"), ("tag", RAW_TAG)]), vec!["plain text line"]);
        assert!(contents(&[("type", "deploy")]).is_empty());
        assert!(contents(&[("limit", "0")]).is_empty());

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_query_wire_format_matches_ingest_format() {
        let runtime = NodeRuntime::start(memory_config(&[])).await.unwrap();

        let body = r#"{"type":"app","id":"web-1","tag":["nginx"],"priority":2,"message":"upstream slow"}"#;
        runtime.ingest().ingest(body.as_bytes()).await.unwrap();
        wait_for_results(&runtime, &[], 1).await;

        let encoded = runtime.query().query_json([("id", "web-1")]).unwrap();
        assert_eq!(encoded.last(), Some(&b'\n'));

        let decoded: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        let entries = decoded.as_array().unwrap();
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        let sent: serde_json::Value = serde_json::from_str(body).unwrap();
        for field in ["type", "id", "tag", "priority", "message"] {
            assert_eq!(entry[field], sent[field], "field {field}");
        }
        assert!(entry["utime"].as_i64().unwrap() > 0);

        // What comes out can be fed straight back in.
        let resent = serde_json::to_vec(entry).unwrap();
        runtime.ingest().ingest(&resent).await.unwrap();
        wait_for_results(&runtime, &[("id", "web-1")], 2).await;

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_params_never_reach_archive() {
        let runtime = NodeRuntime::start(memory_config(&[])).await.unwrap();

        assert_eq!(
            runtime.query().query([("limit", "ten")]),
            Err(QueryError::Params(QueryParamError::BadLimit))
        );
        assert_eq!(
            runtime.query().query([("start", "yesterday")]),
            Err(QueryError::Params(QueryParamError::BadStart))
        );

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_archive_survives_restart() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("log_agg.db");

        let runtime = NodeRuntime::start(file_config(&path, &[])).await.unwrap();
        for content in ["before-1", "before-2"] {
            let body = format!(r#"{{"type":"deploy","message":"{content}"}}"#);
            runtime.ingest().ingest(body.as_bytes()).await.unwrap();
        }
        // Shutdown drains what the archive already accepted.
        runtime.shutdown().await.unwrap();

        let runtime = NodeRuntime::start(file_config(&path, &[])).await.unwrap();
        runtime
            .ingest()
            .ingest(br#"{"type":"deploy","message":"after"}"#)
            .await
            .unwrap();
        wait_for_results(&runtime, &[("type", "deploy")], 3).await;

        let contents: Vec<String> = runtime
            .query()
            .query([("type", "deploy")])
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["before-1", "before-2", "after"]);

        runtime.shutdown().await.unwrap();
    }
}
