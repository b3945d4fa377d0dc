//! OpenAPI schema resolution

use super::patches::{builtin_patches, PatchRegistry, SchemaPatch};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::types::{HttpMethod, JsonValue};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Identifies one resource's schema fragment inside the OpenAPI document
///
/// The full tuple is the cache key: the same path can carry different
/// schemas per method or status code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    /// Endpoint path template, e.g. `/lists/{list_id}/members`
    pub path: String,
    /// Resource name; also the response property holding the record array
    pub name: String,
    /// HTTP method for the endpoint
    pub method: HttpMethod,
    /// Response status code whose schema is wanted
    pub expected_status: u16,
}

impl ResourceKey {
    /// Key for the usual GET-returning-200 endpoint shape
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            method: HttpMethod::Get,
            expected_status: 200,
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }
}

/// Fetches and caches the OpenAPI specification document
///
/// The document is fetched at most once per run; concurrent callers share
/// the cached copy through an `Arc`.
pub struct OpenApiSource {
    client: Arc<HttpClient>,
    spec_url: String,
    cache: RwLock<Option<Arc<JsonValue>>>,
}

impl OpenApiSource {
    pub fn new(client: Arc<HttpClient>, spec_url: impl Into<String>) -> Self {
        Self {
            client,
            spec_url: spec_url.into(),
            cache: RwLock::new(None),
        }
    }

    /// The cached specification document, fetching it on first use
    pub async fn spec(&self) -> Result<Arc<JsonValue>> {
        if let Some(spec) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(spec));
        }

        let mut guard = self.cache.write().await;
        // Another task may have fetched while we waited for the write lock
        if let Some(spec) = guard.as_ref() {
            return Ok(Arc::clone(spec));
        }

        info!("Fetching OpenAPI specification from {}", self.spec_url);
        let document = self.client.fetch_spec(&self.spec_url).await?;
        let spec = Arc::new(document);
        *guard = Some(Arc::clone(&spec));
        Ok(spec)
    }
}

impl std::fmt::Debug for OpenApiSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenApiSource")
            .field("spec_url", &self.spec_url)
            .finish_non_exhaustive()
    }
}

/// Resolves, normalizes, and memoizes per-resource record schemas
pub struct SchemaResolver {
    source: OpenApiSource,
    patches: PatchRegistry,
    cache: RwLock<HashMap<ResourceKey, Arc<JsonValue>>>,
}

impl SchemaResolver {
    /// Resolver with the built-in patch registry
    pub fn new(source: OpenApiSource) -> Self {
        Self::with_patches(source, builtin_patches())
    }

    pub fn with_patches(source: OpenApiSource, patches: PatchRegistry) -> Self {
        Self {
            source,
            patches,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Register an additional corrective patch for a resource
    pub fn register_patch(&mut self, resource: impl Into<String>, patch: SchemaPatch) {
        self.patches.insert(resource.into(), patch);
    }

    /// Resolved record schema for the given key
    ///
    /// Memoized for the lifetime of the resolver; the returned `Arc` is
    /// shared, so callers must treat the schema as immutable.
    pub async fn resolve(
        &self,
        key: &ResourceKey,
        key_properties: &[String],
    ) -> Result<Arc<JsonValue>> {
        if let Some(schema) = self.cache.read().await.get(key) {
            return Ok(Arc::clone(schema));
        }

        let spec = self.source.spec().await?;
        let mut schema = unresolved_schema(&spec, key)?.clone();
        make_nullable(&mut schema, key_properties);
        if let Some(patch) = self.patches.get(&key.name) {
            debug!("Applying schema patch for resource {}", key.name);
            patch(&mut schema);
        }

        let schema = Arc::new(schema);
        self.cache
            .write()
            .await
            .insert(key.clone(), Arc::clone(&schema));
        Ok(schema)
    }
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver")
            .field("source", &self.source)
            .field("patches", &self.patches.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Navigate to the record-item schema fragment for a key
///
/// The collection endpoints all share one response shape: an object whose
/// `{name}` property is an array of records, so the fragment sits at
/// `paths → {path} → {method} → responses → {status} → schema →
/// properties → {name} → items`. A missing fragment fails the stream; an
/// empty schema must never be silently substituted.
pub(crate) fn unresolved_schema<'a>(spec: &'a JsonValue, key: &ResourceKey) -> Result<&'a JsonValue> {
    spec.get("paths")
        .and_then(|v| v.get(&key.path))
        .and_then(|v| v.get(key.method.as_spec_key()))
        .and_then(|v| v.get("responses"))
        .and_then(|v| v.get(key.expected_status.to_string()))
        .and_then(|v| v.get("schema"))
        .and_then(|v| v.get("properties"))
        .and_then(|v| v.get(&key.name))
        .and_then(|v| v.get("items"))
        .ok_or_else(|| Error::schema_not_found(&key.name, &key.path))
}

/// Widen non-key property types to also permit null
///
/// Key properties keep their declared type exactly: a key that can be null
/// breaks downstream deduplication. Properties without a declared `type`
/// are left alone.
pub(crate) fn make_nullable(schema: &mut JsonValue, key_properties: &[String]) {
    let Some(properties) = schema
        .get_mut("properties")
        .and_then(|v| v.as_object_mut())
    else {
        return;
    };

    for (name, property) in properties.iter_mut() {
        if key_properties.iter().any(|k| k == name) {
            continue;
        }
        let Some(declared) = property.get_mut("type") else {
            continue;
        };
        match declared {
            Value::String(_) => {
                let original = declared.take();
                *declared = Value::Array(vec![original, Value::String("null".to_string())]);
            }
            Value::Array(types) => {
                let null = Value::String("null".to_string());
                if !types.contains(&null) {
                    types.push(null);
                }
            }
            _ => {}
        }
    }
}
