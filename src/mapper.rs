//! Record Mapper
//!
//! Turns parsed WARC records into store entries:
//!
//! ```text
//!   "data" + uuid  →  {"metadata": {...}, "payload": {"headers", "body", "encoding"}}
//!   "uri"  + uri   →  uuid          (only with a WARC-Target-URI)
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::Config;
use crate::counters::{Counter, CounterSink};
use crate::error::Result;
use crate::identity::RecordIdGenerator;
use crate::partition::OutputStream;
use crate::warc::{HeaderMap, PayloadEncoding, WarcRecord};

/// JSON document stored in the data stream
#[derive(Serialize)]
struct Document<'a> {
    metadata: &'a HeaderMap,
    payload: Payload<'a>,
}

#[derive(Serialize)]
struct Payload<'a> {
    headers: &'a HeaderMap,
    body: &'a str,
    encoding: PayloadEncoding,
}

/// Output of mapping one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRecord {
    pub uuid: Uuid,
    /// Serialized JSON document
    pub document: String,
    pub target_uri: Option<String>,
}

impl MappedRecord {
    /// Composite `(key, value)` pairs for the partitioned writer
    pub fn into_pairs(self) -> Vec<(String, String)> {
        let uuid = self.uuid.to_string();
        let mut pairs = Vec::with_capacity(2);
        if let Some(uri) = self.target_uri {
            pairs.push((OutputStream::Uri.key(&uri), uuid.clone()));
        }
        pairs.push((OutputStream::Data.key(&uuid), self.document));
        pairs
    }
}

/// Map stage: filter, identify and serialize records
pub struct RecordMapper {
    ids: RecordIdGenerator,
    min_record_bytes: u64,
    max_record_bytes: u64,
    counters: Arc<dyn CounterSink>,
}

impl RecordMapper {
    pub fn new(config: &Config, counters: Arc<dyn CounterSink>) -> Self {
        Self {
            ids: RecordIdGenerator::new(config.uuid_prefix.clone()),
            min_record_bytes: config.min_record_bytes as u64,
            max_record_bytes: config.max_record_bytes as u64,
            counters,
        }
    }

    /// Map one record; `Ok(None)` when it is skipped
    pub fn map(&self, record: &WarcRecord) -> Result<Option<MappedRecord>> {
        self.counters.increment(Counter::Records, 1);

        let record_type = record.record_type().unwrap_or_default();
        if record_type != "response" && record_type != "request" {
            trace!(record_type, "skipped record");
            self.counters.increment(Counter::SkippedRecords, 1);
            return Ok(None);
        }

        let size = record.content_length();
        if size < self.min_record_bytes {
            self.counters.increment(Counter::SkippedRecordsTooSmall, 1);
            return Ok(None);
        }
        if size > self.max_record_bytes {
            debug!(size, max = self.max_record_bytes, "skipped oversized record");
            self.counters.increment(Counter::SkippedRecordsTooLarge, 1);
            return Ok(None);
        }

        let natural_key = record.natural_key();
        if !natural_key.stable {
            debug!(
                field = record.record_id_field(),
                placeholder = %natural_key.value,
                "record without natural key"
            );
        }
        let uuid = self.ids.generate(&natural_key.value);

        if record.content_encoding().is_binary() {
            self.counters.increment(Counter::BinaryRecords, 1);
        }
        let payload = record.content();

        let document = serde_json::to_string(&Document {
            metadata: record.header().metadata(),
            payload: Payload {
                headers: record.content_headers(),
                body: &payload.text,
                encoding: payload.encoding,
            },
        })?;

        self.counters.increment(Counter::GeneratedDocs, 1);
        trace!(%uuid, key = %natural_key.value, "mapped record");

        Ok(Some(MappedRecord {
            uuid,
            document,
            target_uri: record.target_uri().map(str::to_string),
        }))
    }
}
