//! Host-driven autosave
//!
//! The core never spawns timers. A host loop calls
//! [`ScheduledTask::is_due`] and [`ScheduledTask::run`] on its own cadence;
//! [`AutosaveTask`] writes the current snapshot through a [`SnapshotSink`]
//! when the revision moved and the interval elapsed.

use crate::config::AutosaveConfig;
use crate::error::RepositoryError;
use crate::handle::RepositoryHandle;
use crate::snapshot::{SnapshotDocument, SnapshotError};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Failure of a scheduled save
#[derive(Debug, thiserror::Error)]
pub enum AutosaveError {
    /// Writing the target failed
    #[error("autosave I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the snapshot failed
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The handle refused the read
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Work the host ticks periodically
pub trait ScheduledTask {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Whether [`run`](Self::run) has work to do at `now`
    fn is_due(&self, now: DateTime<Utc>) -> bool;

    /// Perform the work
    ///
    /// # Errors
    /// Task-specific failure; the task stays due and can be retried.
    fn run(&mut self, now: DateTime<Utc>) -> Result<(), AutosaveError>;
}

/// Destination for saved snapshots
pub trait SnapshotSink: Send + Sync {
    /// Persist `doc`
    ///
    /// # Errors
    /// Sink-specific failure.
    fn save(&self, doc: &SnapshotDocument) -> Result<(), AutosaveError>;
}

/// Writes snapshots to a JSON file via a temporary sibling and rename
#[derive(Debug, Clone)]
pub struct FileSnapshotSink {
    path: PathBuf,
}

impl FileSnapshotSink {
    /// Sink writing to `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for FileSnapshotSink {
    fn save(&self, doc: &SnapshotDocument) -> Result<(), AutosaveError> {
        let text = doc.to_json_pretty()?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Keeps saved snapshots in memory
#[derive(Debug, Default)]
pub struct MemorySnapshotSink {
    saved: Mutex<Vec<SnapshotDocument>>,
}

impl MemorySnapshotSink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn saved(&self) -> Vec<SnapshotDocument> {
        self.saved.lock().clone()
    }
}

impl SnapshotSink for MemorySnapshotSink {
    fn save(&self, doc: &SnapshotDocument) -> Result<(), AutosaveError> {
        self.saved.lock().push(doc.clone());
        Ok(())
    }
}

/// Saves the repository when it changed and the interval elapsed
pub struct AutosaveTask {
    handle: Arc<RepositoryHandle>,
    sink: Arc<dyn SnapshotSink>,
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
    saved_revision: Option<u64>,
}

impl std::fmt::Debug for AutosaveTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutosaveTask")
            .field("repository", &self.handle.name())
            .field("interval", &self.interval)
            .field("last_run", &self.last_run)
            .field("saved_revision", &self.saved_revision)
            .finish_non_exhaustive()
    }
}

impl AutosaveTask {
    /// Task saving `handle` to `sink` at most every `interval`
    #[must_use]
    pub fn new(handle: Arc<RepositoryHandle>, sink: Arc<dyn SnapshotSink>, interval: Duration) -> Self {
        Self {
            handle,
            sink,
            interval,
            last_run: None,
            saved_revision: None,
        }
    }

    /// Task built from configuration; `None` when no path is configured
    #[must_use]
    pub fn from_config(handle: Arc<RepositoryHandle>, config: &AutosaveConfig) -> Option<Self> {
        let path = config.path.as_ref()?;
        let secs = u32::try_from(config.interval_secs).unwrap_or(u32::MAX);
        let interval = Duration::seconds(i64::from(secs));
        Some(Self::new(
            handle,
            Arc::new(FileSnapshotSink::new(path.clone())),
            interval,
        ))
    }

    #[must_use]
    pub fn saved_revision(&self) -> Option<u64> {
        self.saved_revision
    }
}

impl ScheduledTask for AutosaveTask {
    fn name(&self) -> &str {
        "autosave"
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.handle.is_closed() {
            return false;
        }
        let dirty = self.saved_revision != Some(self.handle.revision());
        let elapsed = self
            .last_run
            .map_or(true, |last| now.signed_duration_since(last) >= self.interval);
        dirty && elapsed
    }

    fn run(&mut self, now: DateTime<Utc>) -> Result<(), AutosaveError> {
        let doc = self.handle.snapshot_document()?;
        let revision = doc.metadata.revision;
        if let Err(err) = self.sink.save(&doc) {
            tracing::warn!(repository = self.handle.name(), revision, error = %err, "autosave failed");
            return Err(err);
        }
        self.last_run = Some(now);
        self.saved_revision = Some(revision);
        tracing::debug!(repository = self.handle.name(), revision, "autosaved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;
    use archgraph_model::{Attributes, NodeKind, NodeSpec, SchemaRegistry};

    fn handle() -> Arc<RepositoryHandle> {
        Arc::new(RepositoryHandle::open(
            RepositoryConfig::default(),
            Arc::new(SchemaRegistry::standard()),
        ))
    }

    #[test]
    fn saves_only_when_dirty_and_elapsed() {
        let handle = handle();
        let sink = Arc::new(MemorySnapshotSink::new());
        let mut task = AutosaveTask::new(Arc::clone(&handle), sink.clone(), Duration::seconds(10));
        let t0 = Utc::now();

        assert!(task.is_due(t0));
        task.run(t0).unwrap();
        assert!(!task.is_due(t0 + Duration::seconds(60)));

        handle
            .add_node(NodeSpec::new(NodeKind::Enterprise, Attributes::new()), "alice")
            .unwrap();
        assert!(!task.is_due(t0 + Duration::seconds(5)));
        assert!(task.is_due(t0 + Duration::seconds(10)));

        task.run(t0 + Duration::seconds(10)).unwrap();
        assert_eq!(task.saved_revision(), Some(1));
        assert_eq!(sink.saved().len(), 2);
    }

    #[test]
    fn file_sink_writes_loadable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autosave.json");
        let handle = handle();
        handle
            .add_node(NodeSpec::new(NodeKind::Enterprise, Attributes::new()), "alice")
            .unwrap();

        let mut task = AutosaveTask::from_config(
            Arc::clone(&handle),
            &AutosaveConfig::default().with_path(&path),
        )
        .unwrap();
        task.run(Utc::now()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let doc = SnapshotDocument::from_json(&text).unwrap();
        assert_eq!(doc.objects.len(), 1);
    }

    #[test]
    fn closed_handle_is_never_due() {
        let handle = handle();
        let task = AutosaveTask::new(
            Arc::clone(&handle),
            Arc::new(MemorySnapshotSink::new()),
            Duration::zero(),
        );
        handle.close().unwrap();
        assert!(!task.is_due(Utc::now()));
    }
}
