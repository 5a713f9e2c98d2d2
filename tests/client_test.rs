//! HTTP-level tests for SearchClient against a mock engine

use kumquat_search::config::{Config, EngineConfig};
use kumquat_search::search::{
    MetadataProfile, ReindexMode, SearchClient, SearchError, SearchService, SearchTransport,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;

fn client_for(server: &Server) -> SearchClient {
    let config = EngineConfig {
        endpoint: server.url(),
        reindex_poll_interval_ms: 10,
        ..Default::default()
    };
    SearchClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_search_posts_query_and_returns_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/kumquat_items/_search")
        .match_body(Matcher::PartialJson(json!({ "from": 0, "size": 25 })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "hits": {
                    "total": { "value": 1, "relation": "eq" },
                    "hits": [{ "_id": "i1", "_score": 1.0, "_source": { "sys_k_repository_id": "i1", "sys_k_class": "Item" } }]
                },
                "aggregations": {
                    "sys_k_subject": { "buckets": [{ "key": "Cats", "doc_count": 1 }] },
                    "total_byte_size": { "value": 512.0 }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let mut config = Config::default();
    config.engine.endpoint = server.url();
    let service = SearchService::from_config(&config)
        .unwrap()
        .with_profile(MetadataProfile::new("default").with_facet("Subject", "sys_k_subject"));

    let mut items = service.items();
    assert_eq!(items.count().await.unwrap(), 1);
    assert_eq!(items.ids().await.unwrap(), vec!["i1"]);
    assert_eq!(items.facets().await.unwrap()[0].terms[0].count, 1);
    assert_eq!(items.total_byte_size().await.unwrap(), Some(512));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_search_error_body_is_raised_by_builder() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/kumquat_items/_search")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "error": {
                    "type": "parse_exception",
                    "root_cause": [{ "type": "parse_exception", "reason": "bad syntax" }]
                },
                "status": 400
            })
            .to_string(),
        )
        .create_async()
        .await;

    let mut config = Config::default();
    config.engine.endpoint = server.url();
    let mut items = SearchService::from_config(&config).unwrap().items();

    let message = items.count().await.unwrap_err().to_string();
    assert!(message.contains("parse_exception"));
    assert!(message.contains("bad syntax"));
}

#[tokio::test]
async fn test_non_json_failure_is_http_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/items/_search")
        .with_status(502)
        .with_body("Bad Gateway")
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.search("items", &json!({})).await.unwrap_err();
    match err {
        SearchError::Http { status, body } => {
            assert_eq!(status, 502);
            assert_eq!(body, "Bad Gateway");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_engine_is_network_error() {
    let config = EngineConfig {
        endpoint: "http://127.0.0.1:1".to_string(),
        request_timeout_secs: 2,
        ..Default::default()
    };
    let client = SearchClient::new(&config).unwrap();

    let err = client.search("items", &json!({})).await.unwrap_err();
    assert!(matches!(err, SearchError::Network(_)));
    assert!(err.is_io());
}

#[tokio::test]
async fn test_index_administration() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("PUT", "/items_v2")
        .match_body(Matcher::PartialJson(json!({ "settings": { "number_of_shards": 1 } })))
        .with_status(200)
        .with_body(r#"{"acknowledged":true}"#)
        .create_async()
        .await;
    let alias = server
        .mock("POST", "/_aliases")
        .match_body(Matcher::Json(json!({
            "actions": [{ "add": { "index": "items_v2", "alias": "items" } }]
        })))
        .with_status(200)
        .with_body(r#"{"acknowledged":true}"#)
        .create_async()
        .await;
    let exists = server
        .mock("HEAD", "/items_v2")
        .with_status(200)
        .create_async()
        .await;
    let missing = server
        .mock("HEAD", "/nope")
        .with_status(404)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/items_v1")
        .with_status(200)
        .with_body(r#"{"acknowledged":true}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    client
        .create_index("items_v2", &json!({ "settings": { "number_of_shards": 1 } }))
        .await
        .unwrap();
    client.create_index_alias("items_v2", "items").await.unwrap();
    assert!(client.index_exists("items_v2").await);
    assert!(!client.index_exists("nope").await);
    client.delete_index("items_v1").await.unwrap();

    create.assert_async().await;
    alias.assert_async().await;
    exists.assert_async().await;
    missing.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_failed_administration_is_http_error() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/items")
        .with_status(400)
        .with_body(r#"{"error":{"type":"resource_already_exists_exception"}}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.create_index("items", &json!({})).await.unwrap_err();
    assert!(matches!(err, SearchError::Http { status: 400, .. }));
}

#[tokio::test]
async fn test_get_document() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/items/_doc/i1")
        .with_status(200)
        .with_body(
            json!({ "_id": "i1", "found": true, "_source": { "sys_k_title": "River map" } })
                .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/items/_doc/gone")
        .with_status(404)
        .with_body(json!({ "_id": "gone", "found": false }).to_string())
        .create_async()
        .await;

    let client = client_for(&server);
    assert_eq!(
        client.get_document("items", "i1").await.unwrap(),
        Some(json!({ "sys_k_title": "River map" }))
    );
    assert_eq!(client.get_document("items", "gone").await.unwrap(), None);
}

#[tokio::test]
async fn test_purge_deletes_all_documents() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/items/_delete_by_query")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("conflicts".into(), "proceed".into()),
            Matcher::UrlEncoded("refresh".into(), "true".into()),
        ]))
        .match_body(Matcher::Json(json!({ "query": { "match_all": {} } })))
        .with_status(200)
        .with_body(r#"{"deleted":42}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    assert_eq!(client.purge("items").await.unwrap(), 42);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_blocking_reindex() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/_reindex")
        .match_query(Matcher::UrlEncoded("wait_for_completion".into(), "true".into()))
        .match_body(Matcher::Json(json!({
            "source": { "index": "items_v1" },
            "dest": { "index": "items_v2" }
        })))
        .with_status(200)
        .with_body(r#"{"total":10,"created":10,"updated":0,"failures":[]}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let outcome = client
        .reindex("items_v1", "items_v2", ReindexMode::Blocking)
        .await
        .unwrap();
    assert_eq!(outcome.total, 10);
    assert_eq!(outcome.created, 10);
    assert_eq!(outcome.failures, 0);
}

#[tokio::test]
async fn test_task_reindex_polls_until_complete() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/_reindex")
        .match_query(Matcher::UrlEncoded("wait_for_completion".into(), "false".into()))
        .with_status(200)
        .with_body(r#"{"task":"node:1"}"#)
        .create_async()
        .await;
    let task = server
        .mock("GET", "/_tasks/node:1")
        .with_status(200)
        .with_body(
            json!({
                "completed": true,
                "response": { "total": 3, "created": 2, "updated": 1, "failures": [] }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let outcome = client
        .reindex("items_v1", "items_v2", ReindexMode::Task)
        .await
        .unwrap();
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.updated, 1);
    task.assert_async().await;
}

#[tokio::test]
async fn test_task_reindex_gives_up_after_max_polls() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/_reindex")
        .match_query(Matcher::UrlEncoded("wait_for_completion".into(), "false".into()))
        .with_status(200)
        .with_body(r#"{"task":"node:2"}"#)
        .create_async()
        .await;
    let task = server
        .mock("GET", "/_tasks/node:2")
        .with_status(200)
        .with_body(r#"{"completed":false}"#)
        .expect(3)
        .create_async()
        .await;

    let config = EngineConfig {
        endpoint: server.url(),
        reindex_poll_interval_ms: 1,
        reindex_max_polls: 3,
        ..Default::default()
    };
    let client = SearchClient::new(&config).unwrap();
    let err = client
        .reindex("items_v1", "items_v2", ReindexMode::Task)
        .await
        .unwrap_err();

    match err {
        SearchError::Engine { error_type, reason } => {
            assert_eq!(error_type, "task_timeout");
            assert!(reason.contains("node:2"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    task.assert_async().await;
}

#[tokio::test]
async fn test_builders_share_client_through_transport() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/kumquat_collections/_search")
        .with_status(200)
        .with_body(r#"{"hits":{"total":0,"hits":[]}}"#)
        .expect(1)
        .create_async()
        .await;

    let transport: Arc<dyn SearchTransport> = Arc::new(client_for(&server));
    let service = SearchService::new(transport, &Config::default());
    let mut collections = service.collections();
    assert_eq!(collections.count().await.unwrap(), 0);
    assert_eq!(collections.count().await.unwrap(), 0);

    mock.assert_async().await;
}
