//! Schema resolution tests

use super::resolver::{make_nullable, unresolved_schema};
use super::*;
use crate::types::HttpMethod;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn sample_spec() -> Value {
    json!({
        "swagger": "2.0",
        "paths": {
            "/lists": {
                "get": {
                    "responses": {
                        "200": {
                            "schema": {
                                "type": "object",
                                "properties": {
                                    "lists": {
                                        "type": "array",
                                        "items": {
                                            "type": "object",
                                            "properties": {
                                                "id": {"type": "string"},
                                                "name": {"type": "string"},
                                                "stats": {"type": "object"}
                                            }
                                        }
                                    },
                                    "total_items": {"type": "integer"}
                                }
                            }
                        }
                    }
                }
            },
            "/lists/{list_id}/members": {
                "get": {
                    "responses": {
                        "200": {
                            "schema": {
                                "properties": {
                                    "members": {
                                        "items": {
                                            "type": "object",
                                            "properties": {
                                                "id": {"type": "string"},
                                                "sms_subscription_status": {
                                                    "type": "string",
                                                    "enum": ["subscribed", "unsubscribed"]
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

#[test]
fn test_navigation_finds_item_schema() {
    let spec = sample_spec();
    let key = ResourceKey::new("/lists", "lists");
    let schema = unresolved_schema(&spec, &key).unwrap();
    assert_eq!(schema["properties"]["id"]["type"], "string");
}

#[test]
fn test_navigation_uses_lowercase_method() {
    let spec = sample_spec();
    let key = ResourceKey::new("/lists", "lists").with_method(HttpMethod::Get);
    assert!(unresolved_schema(&spec, &key).is_ok());

    let key = ResourceKey::new("/lists", "lists").with_method(HttpMethod::Post);
    assert!(unresolved_schema(&spec, &key).is_err());
}

#[test]
fn test_missing_fragment_is_an_error() {
    let spec = sample_spec();
    let key = ResourceKey::new("/campaigns", "campaigns");
    let err = unresolved_schema(&spec, &key).unwrap_err();
    assert!(err.to_string().contains("campaigns"));
}

#[test]
fn test_wrong_status_is_an_error() {
    let spec = sample_spec();
    let key = ResourceKey::new("/lists", "lists").with_status(404);
    assert!(unresolved_schema(&spec, &key).is_err());
}

#[test]
fn test_make_nullable_widens_non_key_properties() {
    let mut schema = json!({
        "type": "object",
        "properties": {
            "id": {"type": "string"},
            "name": {"type": "string"}
        }
    });
    make_nullable(&mut schema, &["id".to_string()]);

    assert_eq!(schema["properties"]["id"]["type"], "string");
    assert_eq!(schema["properties"]["name"]["type"], json!(["string", "null"]));
}

#[test]
fn test_make_nullable_skips_untyped_properties() {
    let mut schema = json!({
        "properties": {
            "link": {"$ref": "#/definitions/link"}
        }
    });
    make_nullable(&mut schema, &[]);
    assert!(schema["properties"]["link"].get("type").is_none());
}

#[test]
fn test_make_nullable_extends_existing_type_list() {
    let mut schema = json!({
        "properties": {
            "value": {"type": ["string", "integer"]},
            "note": {"type": ["string", "null"]}
        }
    });
    make_nullable(&mut schema, &[]);
    assert_eq!(
        schema["properties"]["value"]["type"],
        json!(["string", "integer", "null"])
    );
    assert_eq!(schema["properties"]["note"]["type"], json!(["string", "null"]));
}

#[test]
fn test_members_patch_extends_enum() {
    let patches = builtin_patches();
    let patch = patches.get("members").unwrap();

    let mut schema = json!({
        "properties": {
            "sms_subscription_status": {
                "type": "string",
                "enum": ["subscribed", "unsubscribed"]
            }
        }
    });
    patch(&mut schema);
    assert_eq!(
        schema["properties"]["sms_subscription_status"]["enum"],
        json!(["subscribed", "unsubscribed", ""])
    );

    // Applying twice must not duplicate the empty string
    patch(&mut schema);
    assert_eq!(
        schema["properties"]["sms_subscription_status"]["enum"]
            .as_array()
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn test_members_patch_tolerates_missing_field() {
    let patches = builtin_patches();
    let patch = patches.get("members").unwrap();
    let mut schema = json!({"properties": {"id": {"type": "string"}}});
    patch(&mut schema);
    assert_eq!(schema, json!({"properties": {"id": {"type": "string"}}}));
}

mod resolver_integration {
    use super::*;
    use crate::config::TapConfig;
    use pretty_assertions::assert_eq;
    use crate::http::HttpClient;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn resolver_for(server: &MockServer) -> SchemaResolver {
        let config =
            TapConfig::from_json(r#"{"server": "us14", "api_key": "key"}"#).unwrap();
        let client = Arc::new(HttpClient::new(&config).unwrap());
        let source = OpenApiSource::new(client, format!("{}/swagger.json", server.uri()));
        SchemaResolver::new(source)
    }

    #[tokio::test]
    async fn test_spec_fetched_once_and_schema_memoized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/swagger.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_spec()))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver_for(&server).await;
        let key = ResourceKey::new("/lists", "lists");
        let keys = vec!["id".to_string()];

        let first = resolver.resolve(&key, &keys).await.unwrap();
        let second = resolver.resolve(&key, &keys).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first["properties"]["name"]["type"], json!(["string", "null"]));
        assert_eq!(first["properties"]["id"]["type"], "string");
    }

    #[tokio::test]
    async fn test_members_resolution_applies_patch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/swagger.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_spec()))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server).await;
        let key = ResourceKey::new("/lists/{list_id}/members", "members");
        let schema = resolver.resolve(&key, &["id".to_string()]).await.unwrap();

        let enum_values = schema["properties"]["sms_subscription_status"]["enum"]
            .as_array()
            .unwrap();
        assert!(enum_values.contains(&json!("")));
    }

    #[tokio::test]
    async fn test_spec_fetch_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/swagger.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server).await;
        let key = ResourceKey::new("/lists", "lists");
        let err = resolver.resolve(&key, &[]).await.unwrap_err();
        assert!(err.is_run_fatal());
    }
}
