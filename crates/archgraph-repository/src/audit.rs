//! Append-only, hash-chained audit log
//!
//! Every committed change appends one [`AuditEvent`]. Each event carries
//! the SHA-256 of its predecessor, so rewriting or dropping an entry breaks
//! [`AuditLog::verify_integrity`].

use crate::events::ChangeSummary;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// What an audit event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    /// Node created
    #[serde(rename = "node.added")]
    NodeAdded,
    /// Node kind or attributes changed
    #[serde(rename = "node.modified")]
    NodeModified,
    /// Node deleted
    #[serde(rename = "node.removed")]
    NodeRemoved,
    /// Edge created
    #[serde(rename = "edge.added")]
    EdgeAdded,
    /// Edge kind, endpoints or attributes changed
    #[serde(rename = "edge.modified")]
    EdgeModified,
    /// Edge deleted (directly or by cascade)
    #[serde(rename = "edge.removed")]
    EdgeRemoved,
    /// Workspace commit summary
    #[serde(rename = "commit.applied")]
    CommitApplied,
    /// Batch import summary
    #[serde(rename = "batch.imported")]
    BatchImported,
    /// Undo step
    #[serde(rename = "history.undo")]
    Undo,
    /// Redo step
    #[serde(rename = "history.redo")]
    Redo,
}

impl AuditAction {
    /// Stable textual name (matches the serialized form)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NodeAdded => "node.added",
            Self::NodeModified => "node.modified",
            Self::NodeRemoved => "node.removed",
            Self::EdgeAdded => "edge.added",
            Self::EdgeModified => "edge.modified",
            Self::EdgeRemoved => "edge.removed",
            Self::CommitApplied => "commit.applied",
            Self::BatchImported => "batch.imported",
            Self::Undo => "history.undo",
            Self::Redo => "history.redo",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for one audit entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Acting user
    pub actor: String,
    /// Action
    pub action: AuditAction,
    /// Id of the node/edge, or workspace id for summaries
    pub subject: String,
    /// Free-text detail
    pub detail: Option<String>,
}

impl AuditRecord {
    /// Record without detail
    #[must_use]
    pub fn new(actor: impl Into<String>, action: AuditAction, subject: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            action,
            subject: subject.into(),
            detail: None,
        }
    }

    /// Attach detail text
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// One record per touched entity, in apply order
    #[must_use]
    pub fn for_changes(actor: &str, changes: &ChangeSummary) -> Vec<Self> {
        let edges = |ids: &[archgraph_model::EdgeId], action| {
            ids.iter()
                .map(move |id| Self::new(actor, action, id.as_str()))
                .collect::<Vec<_>>()
        };
        let nodes = |ids: &[archgraph_model::NodeId], action| {
            ids.iter()
                .map(move |id| Self::new(actor, action, id.as_str()))
                .collect::<Vec<_>>()
        };
        let mut records = Vec::with_capacity(changes.len());
        records.extend(edges(&changes.edges_removed, AuditAction::EdgeRemoved));
        records.extend(nodes(&changes.nodes_removed, AuditAction::NodeRemoved));
        records.extend(nodes(&changes.nodes_modified, AuditAction::NodeModified));
        records.extend(nodes(&changes.nodes_added, AuditAction::NodeAdded));
        records.extend(edges(&changes.edges_modified, AuditAction::EdgeModified));
        records.extend(edges(&changes.edges_added, AuditAction::EdgeAdded));
        records
    }
}

/// One sealed audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Position in the log, starting at 0
    pub sequence: u64,
    /// Acting user
    pub actor: String,
    /// Append time
    pub timestamp: DateTime<Utc>,
    /// Action
    pub action: AuditAction,
    /// Repository the change applied to
    pub repository_name: String,
    /// Node/edge id or workspace id
    pub subject: String,
    /// Free-text detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Hash of the preceding event (zeros for the first)
    pub prev_hash: [u8; 32],
    /// Hash of this event
    pub hash: [u8; 32],
}

impl AuditEvent {
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Audit chain broken
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// Event does not chain to its predecessor or its hash is stale
    #[error("audit chain broken at sequence {sequence}")]
    IntegrityViolation {
        /// First bad event
        sequence: u64,
    },
}

/// Append-only audit log
#[derive(Debug)]
pub struct AuditLog {
    repository_name: String,
    inner: Mutex<Vec<AuditEvent>>,
}

impl AuditLog {
    /// Empty log for `repository_name`
    #[must_use]
    pub fn new(repository_name: impl Into<String>) -> Self {
        Self {
            repository_name: repository_name.into(),
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Append one event; returns its sequence
    pub fn append(&self, record: AuditRecord, timestamp: DateTime<Utc>) -> u64 {
        let mut guard = self.inner.lock();
        self.seal(&mut guard, record, timestamp)
    }

    /// Append several events contiguously; returns their sequences
    pub fn append_all(
        &self,
        records: impl IntoIterator<Item = AuditRecord>,
        timestamp: DateTime<Utc>,
    ) -> Vec<u64> {
        let mut guard = self.inner.lock();
        records
            .into_iter()
            .map(|record| self.seal(&mut guard, record, timestamp))
            .collect()
    }

    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.inner.lock().clone()
    }

    /// Events from `sequence` onward
    #[must_use]
    pub fn events_since(&self, sequence: u64) -> Vec<AuditEvent> {
        self.inner
            .lock()
            .iter()
            .filter(|event| event.sequence >= sequence)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    #[must_use]
    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    /// Re-derive every hash and check the chain
    ///
    /// # Errors
    pub fn verify_integrity(&self) -> Result<(), AuditError> {
        verify_chain(&self.inner.lock())
    }

    fn seal(&self, log: &mut Vec<AuditEvent>, record: AuditRecord, timestamp: DateTime<Utc>) -> u64 {
        let prev_hash = log.last().map_or([0u8; 32], |e| e.hash);
        let sequence = log.len() as u64;
        let mut event = AuditEvent {
            sequence,
            actor: record.actor,
            timestamp,
            action: record.action,
            repository_name: self.repository_name.clone(),
            subject: record.subject,
            detail: record.detail,
            prev_hash,
            hash: [0u8; 32],
        };
        event.hash = compute_hash(&event);
        log.push(event);
        sequence
    }
}

/// Check a sequence of events exported from a log
///
/// # Errors
/// `IntegrityViolation` at the first event that fails.
pub fn verify_chain(events: &[AuditEvent]) -> Result<(), AuditError> {
    let mut prev = [0u8; 32];
    for (position, event) in events.iter().enumerate() {
        if event.sequence != position as u64
            || event.prev_hash != prev
            || event.hash != compute_hash(event)
        {
            return Err(AuditError::IntegrityViolation {
                sequence: position as u64,
            });
        }
        prev = event.hash;
    }
    Ok(())
}

fn compute_hash(event: &AuditEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.sequence.to_le_bytes());
    hasher.update(event.actor.as_bytes());
    hasher.update([0]);
    hasher.update(event.timestamp.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(event.action.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(event.repository_name.as_bytes());
    hasher.update([0]);
    hasher.update(event.subject.as_bytes());
    hasher.update([0]);
    if let Some(detail) = &event.detail {
        hasher.update(detail.as_bytes());
    }
    hasher.update([0]);
    hasher.update(event.prev_hash);
    hasher.finalize().into()
}
