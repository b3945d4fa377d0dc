//! Engine output types

use crate::error::Result;
use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, Utc};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

/// Lazy sequence of messages produced by a sync run
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Message>> + Send>>;

/// One message emitted during a sync
#[derive(Debug, Clone)]
pub enum Message {
    /// A stream's resolved schema, emitted before its first record
    Schema {
        stream: &'static str,
        schema: Arc<JsonValue>,
        key_properties: Vec<String>,
    },
    /// One extracted record
    Record {
        stream: &'static str,
        record: JsonObject,
        time_extracted: DateTime<Utc>,
    },
    /// Run totals, emitted once at the end of a successful run
    Summary(SyncStats),
}

impl Message {
    pub fn stream_name(&self) -> Option<&'static str> {
        match self {
            Message::Schema { stream, .. } | Message::Record { stream, .. } => Some(stream),
            Message::Summary(_) => None,
        }
    }
}

/// Counters accumulated over one sync run
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Records emitted, per stream
    pub records: HashMap<&'static str, u64>,
    /// Pages fetched, per stream
    pub pages: HashMap<&'static str, u64>,
    /// Stream contexts abandoned because of fetch or schema failures
    pub failed_contexts: u64,
    /// Parent records whose child fan-out was skipped
    pub skipped_records: u64,
}

impl SyncStats {
    pub fn record_emitted(&mut self, stream: &'static str) {
        *self.records.entry(stream).or_default() += 1;
    }

    pub fn page_fetched(&mut self, stream: &'static str) {
        *self.pages.entry(stream).or_default() += 1;
    }

    /// Total records across all streams
    pub fn total_records(&self) -> u64 {
        self.records.values().sum()
    }

    /// Total pages across all streams
    pub fn total_pages(&self) -> u64 {
        self.pages.values().sum()
    }
}
