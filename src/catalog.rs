//! Catalog types
//!
//! The catalog describes the streams a tap exposes: their schemas, key
//! properties, and (on input) which fields the user has selected. A
//! discovered catalog is emitted by the `discover` command; an input catalog
//! is passed to `read` via `--catalog` to narrow the sync.

use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A full catalog: one entry per stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogStream>,
}

/// A single stream's catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStream {
    /// Stream name, e.g. "members"
    #[serde(rename = "tap_stream_id")]
    pub stream_id: String,
    /// Resolved JSON schema for the stream's records
    pub schema: JsonValue,
    /// Primary key property names
    #[serde(default)]
    pub key_properties: Vec<String>,
    /// Selection metadata entries, one per field breadcrumb
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

/// Selection metadata attached to a field breadcrumb
///
/// Breadcrumbs follow the `["properties", "<name>", ...]` convention, so
/// field names sit at the odd positions. An empty breadcrumb addresses the
/// stream itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub breadcrumb: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion: Option<String>,
}

impl Catalog {
    /// Load a catalog from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let catalog: Catalog = serde_json::from_str(&contents)
            .map_err(|e| Error::config(format!("invalid catalog file: {e}")))?;
        Ok(catalog)
    }

    /// Find a stream entry by name
    pub fn get_stream(&self, stream_id: &str) -> Option<&CatalogStream> {
        self.streams.iter().find(|s| s.stream_id == stream_id)
    }
}

impl CatalogStream {
    /// Whether the stream itself is selected
    ///
    /// Governed by the empty-breadcrumb metadata entry; a stream with no
    /// such entry defaults to selected.
    pub fn is_selected(&self) -> bool {
        self.metadata
            .iter()
            .find(|m| m.breadcrumb.is_empty())
            .and_then(|m| m.metadata.selected)
            .unwrap_or(true)
    }
}
