//! Field selection
//!
//! Translates catalog selection metadata into the comma-separated `fields`
//! request parameter the Mailchimp API understands. A breadcrumb like
//! `["properties", "stats", "properties", "avg_open_rate"]` addresses the
//! dotted field path `stats.avg_open_rate`.

use crate::catalog::CatalogStream;

/// Per-stream field selection mask
///
/// An empty mask means "no filter": the request asks for every field rather
/// than none. Only an explicit selection narrows the response.
#[derive(Debug, Clone, Default)]
pub struct SelectionMask {
    paths: Vec<String>,
}

impl SelectionMask {
    /// Mask that selects everything (no `fields` parameter sent)
    pub fn all() -> Self {
        Self::default()
    }

    /// Build a mask from a stream's catalog metadata
    ///
    /// Only breadcrumbs whose metadata carries `selected: true` contribute.
    /// The empty breadcrumb governs the stream itself, not a field, so it
    /// is skipped here.
    pub fn from_catalog_stream(stream: &CatalogStream) -> Self {
        let paths = stream
            .metadata
            .iter()
            .filter(|entry| !entry.breadcrumb.is_empty())
            .filter(|entry| entry.metadata.selected == Some(true))
            .map(|entry| breadcrumb_to_path(&entry.breadcrumb))
            .collect();
        Self { paths }
    }

    /// Whether the mask narrows the response at all
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Dotted field paths, in catalog order
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Value for the `fields` request parameter
    ///
    /// Returns `None` when the mask is empty, meaning the parameter should
    /// be omitted entirely.
    pub fn fields_param(&self) -> Option<String> {
        if self.paths.is_empty() {
            None
        } else {
            Some(self.paths.join(","))
        }
    }
}

/// Convert a metadata breadcrumb into a dotted field path
///
/// Breadcrumbs alternate `"properties"` markers with field names, so the
/// names sit at the odd indices.
fn breadcrumb_to_path(breadcrumb: &[String]) -> String {
    breadcrumb
        .iter()
        .skip(1)
        .step_by(2)
        .cloned()
        .collect::<Vec<_>>()
        .join(".")
}
