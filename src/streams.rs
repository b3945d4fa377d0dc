//! Stream definitions
//!
//! The static catalog of Mailchimp resources this tap extracts. Streams form
//! a forest: `lists` parents `members` and `merge_fields`, which scope their
//! requests to one list through the `{list_id}` placeholder; the remaining
//! streams are roots.

use crate::error::{Error, Result};
use crate::schema::ResourceKey;
use crate::template::Context;
use crate::types::{HttpMethod, JsonObject, JsonValue};

/// One extractable Mailchimp resource
#[derive(Debug, Clone)]
pub struct StreamDefinition {
    /// Stream name; also the response property holding the record array
    pub name: &'static str,
    /// Endpoint path template, placeholders filled from a parent context
    pub path: &'static str,
    /// HTTP method for page fetches
    pub method: HttpMethod,
    /// Primary key property names
    pub primary_keys: &'static [&'static str],
    /// Parent stream name, if any
    pub parent: Option<&'static str>,
}

impl StreamDefinition {
    /// Schema cache key for this stream
    pub fn resource_key(&self) -> ResourceKey {
        ResourceKey::new(self.path, self.name).with_method(self.method)
    }

    /// Primary key names as owned strings
    pub fn key_properties(&self) -> Vec<String> {
        self.primary_keys.iter().map(|k| (*k).to_string()).collect()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Context a child stream inherits from one of this stream's records
    ///
    /// A pure projection of the record: `{list_id: record["id"]}`. A record
    /// missing its id cannot scope children; the caller skips that record's
    /// children rather than failing the stream.
    pub fn derive_context(&self, record: &JsonObject) -> Result<Context> {
        let id = record
            .get("id")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::context_derivation(self.name, "id"))?;

        let mut ctx = Context::new();
        ctx.insert("list_id".to_string(), id.to_string());
        Ok(ctx)
    }
}

/// Every stream the tap knows about
pub const STREAMS: &[StreamDefinition] = &[
    StreamDefinition {
        name: "lists",
        path: "/lists",
        method: HttpMethod::Get,
        primary_keys: &["id"],
        parent: None,
    },
    StreamDefinition {
        name: "members",
        path: "/lists/{list_id}/members",
        method: HttpMethod::Get,
        primary_keys: &["id"],
        parent: Some("lists"),
    },
    StreamDefinition {
        name: "merge_fields",
        path: "/lists/{list_id}/merge-fields",
        method: HttpMethod::Get,
        primary_keys: &["merge_id"],
        parent: Some("lists"),
    },
    StreamDefinition {
        name: "campaigns",
        path: "/campaigns",
        method: HttpMethod::Get,
        primary_keys: &["id"],
        parent: None,
    },
    StreamDefinition {
        name: "conversations",
        path: "/conversations",
        method: HttpMethod::Get,
        primary_keys: &["id"],
        parent: None,
    },
    StreamDefinition {
        name: "templates",
        path: "/templates",
        method: HttpMethod::Get,
        primary_keys: &["id"],
        parent: None,
    },
];

/// Look up a stream by name
pub fn stream(name: &str) -> Result<&'static StreamDefinition> {
    STREAMS
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| Error::stream_not_found(name))
}

/// All root streams, in definition order
pub fn root_streams() -> impl Iterator<Item = &'static StreamDefinition> {
    STREAMS.iter().filter(|s| s.is_root())
}

/// Children of the named stream, in definition order
pub fn children_of(parent: &str) -> impl Iterator<Item = &'static StreamDefinition> + '_ {
    STREAMS.iter().filter(move |s| s.parent == Some(parent))
}

/// Pull the record array out of a page response body
///
/// Collection endpoints return an object whose `{name}` property is the
/// record array; anything else is a malformed page.
pub fn extract_records(stream: &StreamDefinition, body: &JsonValue) -> Result<Vec<JsonObject>> {
    let records = body
        .get(stream.name)
        .and_then(JsonValue::as_array)
        .ok_or_else(|| {
            Error::record_extraction(
                stream.name,
                format!("response body has no \"{}\" array", stream.name),
            )
        })?;

    records
        .iter()
        .map(|record| {
            record.as_object().cloned().ok_or_else(|| {
                Error::record_extraction(stream.name, "record is not an object")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stream_lookup() {
        assert_eq!(stream("lists").unwrap().path, "/lists");
        assert!(stream("unknown").is_err());
    }

    #[test]
    fn test_forest_shape() {
        let roots: Vec<_> = root_streams().map(|s| s.name).collect();
        assert_eq!(roots, vec!["lists", "campaigns", "conversations", "templates"]);

        let children: Vec<_> = children_of("lists").map(|s| s.name).collect();
        assert_eq!(children, vec!["members", "merge_fields"]);

        assert_eq!(children_of("campaigns").count(), 0);
    }

    #[test]
    fn test_every_parent_reference_resolves() {
        for def in STREAMS {
            if let Some(parent) = def.parent {
                assert!(stream(parent).is_ok(), "{} has unknown parent", def.name);
            }
        }
    }

    #[test]
    fn test_merge_fields_primary_key() {
        assert_eq!(stream("merge_fields").unwrap().primary_keys, &["merge_id"]);
    }

    #[test]
    fn test_derive_context_projects_id() {
        let lists = stream("lists").unwrap();
        let record = json!({"id": "abc123", "name": "Newsletter"});
        let ctx = lists.derive_context(record.as_object().unwrap()).unwrap();
        assert_eq!(ctx.get("list_id"), Some(&"abc123".to_string()));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_derive_context_missing_id() {
        let lists = stream("lists").unwrap();
        let record = json!({"name": "Newsletter"});
        let err = lists.derive_context(record.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn test_extract_records() {
        let lists = stream("lists").unwrap();
        let body = json!({
            "lists": [{"id": "a"}, {"id": "b"}],
            "total_items": 2
        });
        let records = extract_records(lists, &body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], "a");
    }

    #[test]
    fn test_extract_records_missing_array() {
        let lists = stream("lists").unwrap();
        let body = json!({"total_items": 0});
        assert!(extract_records(lists, &body).is_err());
    }

    #[test]
    fn test_resource_key_round_trip() {
        let members = stream("members").unwrap();
        let key = members.resource_key();
        assert_eq!(key.path, "/lists/{list_id}/members");
        assert_eq!(key.name, "members");
        assert_eq!(key.expected_status, 200);
    }
}
