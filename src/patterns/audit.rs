//! Audit trail for pattern mutations.
//!
//! Every [`PatternStore::update`](super::PatternStore::update) appends one
//! [`ChangeRecord`] holding content hashes of the definition before and after
//! the change. Records are kept in memory and, when a sink is attached,
//! mirrored as one JSON line each to an append-only writer.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use super::PatternDefinition;

/// One audited mutation of a single pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Unique identifier for this change.
    pub change_id: Uuid,
    /// Group holding the pattern.
    pub group: String,
    /// Pattern name.
    pub name: String,
    /// SHA-256 of the definition before the change.
    pub before_hash: String,
    /// SHA-256 of the definition after the change.
    pub after_hash: String,
    /// Fields the update touched.
    pub fields: Vec<String>,
    /// Who made the change.
    pub user: String,
    /// Why the change was made.
    pub reason: String,
    /// When the change was applied.
    pub timestamp: DateTime<Utc>,
}

impl ChangeRecord {
    /// Whether the change left the definition byte-for-byte identical.
    pub fn is_noop(&self) -> bool {
        self.before_hash == self.after_hash
    }
}

/// Hex SHA-256 of a definition's canonical JSON encoding.
pub fn content_hash(definition: &PatternDefinition) -> String {
    // Serializing a plain data struct cannot fail; fall back to Debug output
    // rather than panicking if it ever does.
    let bytes = serde_json::to_vec(definition)
        .unwrap_or_else(|_| format!("{definition:?}").into_bytes());
    hex::encode(Sha256::digest(&bytes))
}

/// Append-only change history.
pub struct ChangeLog {
    records: Mutex<Vec<ChangeRecord>>,
    sink: Option<Mutex<Box<dyn Write + Send>>>,
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeLog {
    /// In-memory history only.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            sink: None,
        }
    }

    /// History that also writes one JSON line per record to `writer`.
    pub fn with_sink(writer: Box<dyn Write + Send>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            sink: Some(Mutex::new(writer)),
        }
    }

    /// Append a record. Sink failures are logged, never propagated: the
    /// in-memory history is authoritative.
    pub fn append(&self, record: ChangeRecord) {
        if let Some(sink) = &self.sink {
            if let Err(e) = write_line(sink, &record) {
                warn!(error = %e, change_id = %record.change_id, "failed to mirror change record");
            }
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// All records, oldest first.
    pub fn all(&self) -> Vec<ChangeRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records for one pattern, oldest first.
    pub fn for_pattern(&self, group: &str, name: &str) -> Vec<ChangeRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.group == group && r.name == name)
            .cloned()
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn write_line(sink: &Mutex<Box<dyn Write + Send>>, record: &ChangeRecord) -> anyhow::Result<()> {
    let line = serde_json::to_string(record)?;
    let mut writer = sink.lock().unwrap_or_else(PoisonError::into_inner);
    writeln!(writer, "{line}")?;
    writer.flush()?;
    Ok(())
}
