//! Sync engine
//!
//! Drives extraction over the stream forest: for each root stream, page to
//! exhaustion, emit records, then fan out into child streams with a context
//! derived from each parent record. Parent records are fully fetched before
//! any child starts, since contexts come from emitted records, not in-flight
//! pages.
//!
//! Failures are scoped as narrowly as possible: a specification fetch
//! failure aborts the run; a missing schema or exhausted-retry page fetch
//! abandons only the affected stream context; a parent record that cannot
//! produce a context skips only that record's fan-out.

mod types;

pub use types::{Message, MessageStream, SyncStats};

use crate::catalog::{Catalog, CatalogStream, Metadata, MetadataEntry};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::OffsetPaginator;
use crate::schema::{OpenApiSource, SchemaResolver};
use crate::selection::SelectionMask;
use crate::streams::{children_of, extract_records, root_streams, StreamDefinition, STREAMS};
use crate::template::{self, Context};
use chrono::Utc;
use futures::channel::mpsc::{self, UnboundedSender};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Sender = UnboundedSender<Result<Message>>;

/// Orchestrates one tap run
pub struct SyncEngine {
    client: Arc<HttpClient>,
    resolver: Arc<SchemaResolver>,
    page_size: u32,
    catalog: Option<Catalog>,
    stream_filter: Option<Vec<String>>,
}

impl SyncEngine {
    /// Build an engine from tap configuration
    pub fn new(config: &TapConfig) -> Result<Self> {
        let client = Arc::new(HttpClient::new(config)?);
        let source = OpenApiSource::new(Arc::clone(&client), config.spec_url.clone());
        Ok(Self {
            client,
            resolver: Arc::new(SchemaResolver::new(source)),
            page_size: config.page_size,
            catalog: None,
            stream_filter: None,
        })
    }

    /// Narrow the run to streams and fields selected in an input catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Narrow the run to the named streams
    #[must_use]
    pub fn with_stream_filter(mut self, streams: Vec<String>) -> Self {
        self.stream_filter = Some(streams);
        self
    }

    /// Run extraction, producing a lazy message stream
    ///
    /// The returned stream ends with a [`Message::Summary`] on success or a
    /// single `Err` item on a run-fatal failure. Dropping the stream
    /// abandons any outstanding extraction.
    pub fn run(self) -> MessageStream {
        let (tx, rx) = mpsc::unbounded();

        tokio::spawn(async move {
            let mut stats = SyncStats::default();
            let mut announced = HashSet::new();

            let outcome = self.sync_roots(&tx, &mut stats, &mut announced).await;
            match outcome {
                Ok(()) => {
                    info!(
                        records = stats.total_records(),
                        pages = stats.total_pages(),
                        failed_contexts = stats.failed_contexts,
                        "Sync finished"
                    );
                    let _ = tx.unbounded_send(Ok(Message::Summary(stats)));
                }
                Err(e) => {
                    let _ = tx.unbounded_send(Err(e));
                }
            }
        });

        Box::pin(rx)
    }

    /// Discover all streams and their resolved schemas as a catalog
    ///
    /// Streams whose schema fragment is missing from the specification are
    /// reported and omitted rather than failing discovery outright.
    pub async fn discover(&self) -> Result<Catalog> {
        let mut streams = Vec::new();

        for def in STREAMS {
            let schema = match self
                .resolver
                .resolve(&def.resource_key(), &def.key_properties())
                .await
            {
                Ok(schema) => schema,
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => {
                    warn!(stream = def.name, error = %e, "Skipping stream in discovery");
                    continue;
                }
            };

            streams.push(CatalogStream {
                stream_id: def.name.to_string(),
                schema: (*schema).clone(),
                key_properties: def.key_properties(),
                metadata: discovery_metadata(def, &schema),
            });
        }

        Ok(Catalog { streams })
    }

    async fn sync_roots(
        &self,
        tx: &Sender,
        stats: &mut SyncStats,
        announced: &mut HashSet<&'static str>,
    ) -> Result<()> {
        for def in root_streams() {
            if !self.must_traverse(def) {
                debug!(stream = def.name, "Stream not selected, skipping");
                continue;
            }
            match self.sync_stream(def, None, tx, stats, announced).await {
                Ok(()) => {}
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => {
                    warn!(stream = def.name, error = %e, "Stream failed, continuing with siblings");
                    stats.failed_contexts += 1;
                }
            }
        }
        Ok(())
    }

    /// Extract one (stream, context) pair to exhaustion, then recurse into
    /// children per parent record
    fn sync_stream<'a>(
        &'a self,
        def: &'static StreamDefinition,
        ctx: Option<&'a Context>,
        tx: &'a Sender,
        stats: &'a mut SyncStats,
        announced: &'a mut HashSet<&'static str>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let schema = self
                .resolver
                .resolve(&def.resource_key(), &def.key_properties())
                .await?;

            let emit_records = self.is_selected(def);
            if emit_records && announced.insert(def.name) {
                send(
                    tx,
                    Message::Schema {
                        stream: def.name,
                        schema: Arc::clone(&schema),
                        key_properties: def.key_properties(),
                    },
                )?;
            }

            let empty = Context::new();
            let path = template::render(def.path, ctx.unwrap_or(&empty))?;
            let mask = self.mask_for(def);
            let has_children = children_of(def.name).any(|c| self.must_traverse(c));

            let mut paginator = OffsetPaginator::new(self.page_size);
            let mut parent_records = Vec::new();

            while let Some(params) = paginator.request_params() {
                debug!(stream = def.name, path = %path, offset = ?paginator.current_offset(), "Fetching page");

                let mut request = RequestConfig::new().queries(params);
                if let Some(fields) = mask.fields_param() {
                    request = request.query("fields", fields);
                }

                let response = self.client.request(def.method.into(), &path, request).await?;
                let body = response.json().await.map_err(Error::Http)?;
                stats.page_fetched(def.name);

                let records = extract_records(def, &body)?;
                paginator.observe_page(records.len());

                for record in records {
                    if emit_records {
                        send(
                            tx,
                            Message::Record {
                                stream: def.name,
                                record: record.clone(),
                                time_extracted: Utc::now(),
                            },
                        )?;
                        stats.record_emitted(def.name);
                    }
                    if has_children {
                        parent_records.push(record);
                    }
                }
            }

            for record in &parent_records {
                let child_ctx = match def.derive_context(record) {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        warn!(stream = def.name, error = %e, "Skipping record's child fan-out");
                        stats.skipped_records += 1;
                        continue;
                    }
                };

                for child in children_of(def.name) {
                    if !self.must_traverse(child) {
                        continue;
                    }
                    match self
                        .sync_stream(child, Some(&child_ctx), tx, stats, announced)
                        .await
                    {
                        Ok(()) => {}
                        Err(e) if e.is_run_fatal() => return Err(e),
                        Err(e) => {
                            warn!(
                                stream = child.name,
                                parent = def.name,
                                error = %e,
                                "Child context failed, continuing"
                            );
                            stats.failed_contexts += 1;
                        }
                    }
                }
            }

            Ok(())
        })
    }

    /// Whether the stream's own records should be emitted
    fn is_selected(&self, def: &StreamDefinition) -> bool {
        if let Some(filter) = &self.stream_filter {
            if !filter.iter().any(|s| s == def.name) {
                return false;
            }
        }
        match &self.catalog {
            Some(catalog) => catalog
                .get_stream(def.name)
                .is_some_and(CatalogStream::is_selected),
            None => true,
        }
    }

    /// Whether the stream must be paged at all
    ///
    /// A deselected parent is still traversed when a descendant is selected,
    /// since child contexts come from its records; its own records are just
    /// not emitted.
    fn must_traverse(&self, def: &'static StreamDefinition) -> bool {
        self.is_selected(def) || children_of(def.name).any(|c| self.must_traverse(c))
    }

    fn mask_for(&self, def: &StreamDefinition) -> SelectionMask {
        self.catalog
            .as_ref()
            .and_then(|c| c.get_stream(def.name))
            .map(SelectionMask::from_catalog_stream)
            .unwrap_or_else(SelectionMask::all)
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("page_size", &self.page_size)
            .field("has_catalog", &self.catalog.is_some())
            .field("stream_filter", &self.stream_filter)
            .finish_non_exhaustive()
    }
}

fn send(tx: &Sender, msg: Message) -> Result<()> {
    tx.unbounded_send(Ok(msg))
        .map_err(|_| Error::Other("output channel closed".to_string()))
}

/// Catalog metadata entries for a discovered stream
///
/// One entry per top-level property marked available, so downstream tools
/// can flip selection without rebuilding breadcrumbs.
fn discovery_metadata(
    def: &StreamDefinition,
    schema: &crate::types::JsonValue,
) -> Vec<MetadataEntry> {
    let mut entries = vec![MetadataEntry {
        breadcrumb: Vec::new(),
        metadata: Metadata {
            selected: None,
            inclusion: Some("available".to_string()),
        },
    }];

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for name in properties.keys() {
            let inclusion = if def.primary_keys.contains(&name.as_str()) {
                "automatic"
            } else {
                "available"
            };
            entries.push(MetadataEntry {
                breadcrumb: vec!["properties".to_string(), name.clone()],
                metadata: Metadata {
                    selected: None,
                    inclusion: Some(inclusion.to_string()),
                },
            });
        }
    }

    entries
}

#[cfg(test)]
mod tests;
