//! Engine tests
//!
//! Each test stands up a wiremock server serving a small OpenAPI document
//! plus canned record pages, then drives the engine to completion and
//! inspects the emitted messages.

use super::*;
use futures::StreamExt;
use serde_json::{json, Value};
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn item_schema(extra: Value) -> Value {
    let mut properties = json!({"id": {"type": "string"}});
    if let (Some(base), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }
    json!({"type": "object", "properties": properties})
}

fn collection_path(name: &str, template: &str, items: Value) -> (String, Value) {
    (
        template.to_string(),
        json!({
            "get": {
                "responses": {
                    "200": {
                        "schema": {
                            "type": "object",
                            "properties": {
                                name: {"type": "array", "items": items},
                                "total_items": {"type": "integer"}
                            }
                        }
                    }
                }
            }
        }),
    )
}

fn full_spec() -> Value {
    let mut paths = serde_json::Map::new();
    for (name, template, extra) in [
        ("lists", "/lists", json!({"name": {"type": "string"}})),
        (
            "members",
            "/lists/{list_id}/members",
            json!({"email_address": {"type": "string"}}),
        ),
        ("merge_fields", "/lists/{list_id}/merge-fields", json!({})),
        ("campaigns", "/campaigns", json!({})),
        ("conversations", "/conversations", json!({})),
        ("templates", "/templates", json!({})),
    ] {
        let (key, value) = collection_path(name, template, item_schema(extra));
        paths.insert(key, value);
    }
    json!({"swagger": "2.0", "paths": Value::Object(paths)})
}

async fn mount_spec(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/swagger.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_spec()))
        .mount(server)
        .await;
}

fn engine_for(server: &MockServer, page_size: u32) -> SyncEngine {
    let config = TapConfig::from_json(&format!(
        r#"{{
            "server": "us1",
            "api_key": "test-key",
            "page_size": {page_size},
            "base_url": "{uri}",
            "spec_url": "{uri}/swagger.json",
            "http": {{ "max_retries": 0, "requests_per_second": 0 }}
        }}"#,
        uri = server.uri()
    ))
    .unwrap();
    SyncEngine::new(&config).unwrap()
}

fn page(name: &str, records: Value) -> Value {
    json!({ name: records })
}

/// Respond with record pages sliced by the request's offset parameter
fn paged_response(name: &'static str, records: Vec<Value>) -> impl Fn(&Request) -> ResponseTemplate {
    move |request: &Request| {
        let query: std::collections::HashMap<_, _> = request
            .url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let offset: usize = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
        let count: usize = query
            .get("count")
            .and_then(|v| v.parse().ok())
            .unwrap_or(records.len());
        let slice: Vec<Value> = records.iter().skip(offset).take(count).cloned().collect();
        ResponseTemplate::new(200).set_body_json(json!({ name: slice }))
    }
}

async fn collect(engine: SyncEngine) -> Vec<Message> {
    engine
        .run()
        .map(|item| item.expect("sync should succeed"))
        .collect()
        .await
}

fn records_for<'a>(messages: &'a [Message], name: &str) -> Vec<&'a crate::types::JsonObject> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Record { stream, record, .. } if *stream == name => Some(record),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_root_stream_paginates_to_exhaustion() {
    let server = MockServer::start().await;
    mount_spec(&server).await;

    let campaigns: Vec<Value> = (0..24).map(|i| json!({"id": format!("c{i}")})).collect();
    Mock::given(method("GET"))
        .and(path("/campaigns"))
        .respond_with(paged_response("campaigns", campaigns))
        .mount(&server)
        .await;
    for name in ["lists", "conversations", "templates"] {
        Mock::given(method("GET"))
            .and(path(format!("/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(name, json!([]))))
            .mount(&server)
            .await;
    }

    let engine = engine_for(&server, 10).with_stream_filter(vec!["campaigns".to_string()]);
    let messages = collect(engine).await;

    // 24 records over pages of 10, 10, 4
    assert_eq!(records_for(&messages, "campaigns").len(), 24);
    let summary = messages.last().unwrap();
    let Message::Summary(stats) = summary else {
        panic!("expected summary, got {summary:?}");
    };
    assert_eq!(stats.pages.get("campaigns"), Some(&3));
    assert_eq!(stats.total_records(), 24);
}

#[tokio::test]
async fn test_schema_emitted_before_first_record() {
    let server = MockServer::start().await;
    mount_spec(&server).await;
    Mock::given(method("GET"))
        .and(path("/templates"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page("templates", json!([{"id": "t1"}]))),
        )
        .mount(&server)
        .await;

    let engine = engine_for(&server, 10).with_stream_filter(vec!["templates".to_string()]);
    let messages = collect(engine).await;

    let schema_pos = messages
        .iter()
        .position(|m| matches!(m, Message::Schema { stream: "templates", .. }))
        .unwrap();
    let record_pos = messages
        .iter()
        .position(|m| matches!(m, Message::Record { stream: "templates", .. }))
        .unwrap();
    assert!(schema_pos < record_pos);

    // Schema is normalized: non-key properties nullable, keys untouched
    let Message::Schema { schema, key_properties, .. } = &messages[schema_pos] else {
        unreachable!();
    };
    assert_eq!(key_properties, &["id".to_string()]);
    assert_eq!(schema["properties"]["id"]["type"], "string");
}

#[tokio::test]
async fn test_parent_fans_out_one_child_run_per_record() {
    let server = MockServer::start().await;
    mount_spec(&server).await;

    // Three lists over pages of 2 and 1 at page_size 2
    let lists: Vec<Value> = (0..3).map(|i| json!({"id": format!("l{i}")})).collect();
    Mock::given(method("GET"))
        .and(path("/lists"))
        .respond_with(paged_response("lists", lists))
        .mount(&server)
        .await;

    for list in ["l0", "l1", "l2"] {
        Mock::given(method("GET"))
            .and(path(format!("/lists/{list}/members")))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(
                "members",
                json!([{"id": format!("{list}-m0")}]),
            )))
            .expect(1)
            .mount(&server)
            .await;
    }

    let engine = engine_for(&server, 2)
        .with_stream_filter(vec!["lists".to_string(), "members".to_string()]);
    let messages = collect(engine).await;

    assert_eq!(records_for(&messages, "lists").len(), 3);
    let members = records_for(&messages, "members");
    assert_eq!(members.len(), 3);

    // All parent records precede any member record: parents are fully
    // paged before fan-out starts.
    let last_list = messages
        .iter()
        .rposition(|m| matches!(m, Message::Record { stream: "lists", .. }))
        .unwrap();
    let first_member = messages
        .iter()
        .position(|m| matches!(m, Message::Record { stream: "members", .. }))
        .unwrap();
    assert!(last_list < first_member);
}

#[tokio::test]
async fn test_record_without_id_skips_only_its_fan_out() {
    let server = MockServer::start().await;
    mount_spec(&server).await;

    Mock::given(method("GET"))
        .and(path("/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "lists",
            json!([{"id": "l0"}, {"name": "no id"}, {"id": "l2"}]),
        )))
        .mount(&server)
        .await;
    for list in ["l0", "l2"] {
        Mock::given(method("GET"))
            .and(path(format!("/lists/{list}/members")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page("members", json!([]))),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let engine = engine_for(&server, 10)
        .with_stream_filter(vec!["lists".to_string(), "members".to_string()]);
    let messages = collect(engine).await;

    assert_eq!(records_for(&messages, "lists").len(), 3);
    let Message::Summary(stats) = messages.last().unwrap() else {
        panic!("expected summary");
    };
    assert_eq!(stats.skipped_records, 1);
}

#[tokio::test]
async fn test_failed_stream_does_not_abort_siblings() {
    let server = MockServer::start().await;
    mount_spec(&server).await;

    Mock::given(method("GET"))
        .and(path("/conversations"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/templates"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page("templates", json!([{"id": "t1"}]))),
        )
        .mount(&server)
        .await;

    let engine = engine_for(&server, 10)
        .with_stream_filter(vec!["conversations".to_string(), "templates".to_string()]);
    let messages = collect(engine).await;

    assert_eq!(records_for(&messages, "templates").len(), 1);
    let Message::Summary(stats) = messages.last().unwrap() else {
        panic!("expected summary");
    };
    assert_eq!(stats.failed_contexts, 1);
}

#[tokio::test]
async fn test_spec_fetch_failure_aborts_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/swagger.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = engine_for(&server, 10);
    let items: Vec<_> = engine.run().collect().await;

    assert_eq!(items.len(), 1);
    assert!(items[0].as_ref().unwrap_err().is_run_fatal());
}

#[tokio::test]
async fn test_requests_carry_basic_auth_and_page_params() {
    let server = MockServer::start().await;
    mount_spec(&server).await;

    Mock::given(method("GET"))
        .and(path("/templates"))
        .and(basic_auth("anystring", "test-key"))
        .and(query_param("count", "10"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("templates", json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server, 10).with_stream_filter(vec!["templates".to_string()]);
    collect(engine).await;
}

#[tokio::test]
async fn test_catalog_selection_drives_fields_param() {
    let server = MockServer::start().await;
    mount_spec(&server).await;

    Mock::given(method("GET"))
        .and(path("/lists"))
        .and(query_param("fields", "id,name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("lists", json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let catalog: Catalog = serde_json::from_value(json!({
        "streams": [{
            "tap_stream_id": "lists",
            "schema": {"type": "object"},
            "key_properties": ["id"],
            "metadata": [
                {"breadcrumb": [], "metadata": {"selected": true}},
                {"breadcrumb": ["properties", "id"], "metadata": {"selected": true}},
                {"breadcrumb": ["properties", "name"], "metadata": {"selected": true}}
            ]
        }]
    }))
    .unwrap();

    let engine = engine_for(&server, 10)
        .with_catalog(catalog)
        .with_stream_filter(vec!["lists".to_string()]);
    collect(engine).await;
}

#[tokio::test]
async fn test_deselected_parent_still_traversed_for_children() {
    let server = MockServer::start().await;
    mount_spec(&server).await;

    Mock::given(method("GET"))
        .and(path("/lists"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page("lists", json!([{"id": "l0"}]))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lists/l0/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "members",
            json!([{"id": "m0"}]),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let catalog: Catalog = serde_json::from_value(json!({
        "streams": [
            {
                "tap_stream_id": "lists",
                "schema": {"type": "object"},
                "metadata": [{"breadcrumb": [], "metadata": {"selected": false}}]
            },
            {
                "tap_stream_id": "members",
                "schema": {"type": "object"},
                "metadata": [{"breadcrumb": [], "metadata": {"selected": true}}]
            }
        ]
    }))
    .unwrap();

    let engine = engine_for(&server, 10).with_catalog(catalog);
    let messages = collect(engine).await;

    // Parent records are paged for context but not emitted
    assert!(records_for(&messages, "lists").is_empty());
    assert_eq!(records_for(&messages, "members").len(), 1);
}

#[tokio::test]
async fn test_discover_builds_catalog_with_resolved_schemas() {
    let server = MockServer::start().await;
    mount_spec(&server).await;

    let engine = engine_for(&server, 10);
    let catalog = engine.discover().await.unwrap();

    assert_eq!(catalog.streams.len(), STREAMS.len());
    let lists = catalog.get_stream("lists").unwrap();
    assert_eq!(lists.key_properties, vec!["id".to_string()]);
    assert_eq!(lists.schema["properties"]["name"]["type"], json!(["string", "null"]));

    // Metadata marks keys automatic and the rest available
    let id_entry = lists
        .metadata
        .iter()
        .find(|m| m.breadcrumb == vec!["properties".to_string(), "id".to_string()])
        .unwrap();
    assert_eq!(id_entry.metadata.inclusion.as_deref(), Some("automatic"));
}
