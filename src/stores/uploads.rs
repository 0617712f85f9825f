use crate::messaging::{
    EventBus, EventKind, ServerEvent, UploadCompletedEvent, UploadErrorEvent, UploadProgressEvent,
    UploadStatus,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

/// Progress state of one upload, keyed by its id.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgressRecord {
    pub upload_id: String,
    pub progress: u8,
    pub status: UploadStatus,
    pub error: Option<String>,
    pub timestamp: SystemTime,
}

impl UploadProgressRecord {
    fn new(upload_id: String, progress: u8) -> Self {
        Self {
            upload_id,
            progress,
            status: UploadStatus::Uploading,
            error: None,
            timestamp: SystemTime::now(),
        }
    }
}

/// What a consumer sees when asking about an upload.
///
/// Unknown ids read as a zero-progress upload rather than an error, so
/// callers cannot distinguish "not yet started" from "just started at 0%".
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgressView {
    pub progress: u8,
    pub status: UploadStatus,
    pub error: Option<String>,
    pub is_active: bool,
}

impl Default for UploadProgressView {
    fn default() -> Self {
        Self {
            progress: 0,
            status: UploadStatus::Uploading,
            error: None,
            is_active: false,
        }
    }
}

/// Reducer over the three upload events.
///
/// Completed and errored records are terminal: progress events arriving for
/// them afterwards are logged and ignored.
pub struct UploadStore {
    records: RwLock<HashMap<String, UploadProgressRecord>>,
}

impl UploadStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Wire this store to the bus as the reducer for the upload events.
    pub fn attach(store: &Arc<Self>, bus: &Arc<EventBus>) {
        let progress = Arc::clone(store);
        bus.on(
            EventKind::UploadProgress,
            Arc::new(move |event| {
                if let ServerEvent::UploadProgress(ev) = event {
                    progress.apply_progress(ev);
                }
            }),
        );

        let completed = Arc::clone(store);
        bus.on(
            EventKind::UploadCompleted,
            Arc::new(move |event| {
                if let ServerEvent::UploadCompleted(ev) = event {
                    completed.apply_completed(ev);
                }
            }),
        );

        let errored = Arc::clone(store);
        bus.on(
            EventKind::UploadError,
            Arc::new(move |event| {
                if let ServerEvent::UploadError(ev) = event {
                    errored.apply_error(ev);
                }
            }),
        );
    }

    pub fn apply_progress(&self, event: &UploadProgressEvent) {
        let mut records = self.records.write();
        match records.get_mut(&event.upload_id) {
            Some(record) if record.status.is_terminal() => {
                tracing::warn!(
                    "ignoring progress event for finished upload {}",
                    event.upload_id
                );
            }
            Some(record) => {
                record.progress = event.progress.min(100);
                record.timestamp = SystemTime::now();
            }
            None => {
                records.insert(
                    event.upload_id.clone(),
                    UploadProgressRecord::new(event.upload_id.clone(), event.progress.min(100)),
                );
            }
        }
    }

    pub fn apply_completed(&self, event: &UploadCompletedEvent) {
        let mut records = self.records.write();
        let record = records
            .entry(event.upload_id.clone())
            .or_insert_with(|| UploadProgressRecord::new(event.upload_id.clone(), 0));
        if record.status.is_terminal() {
            tracing::warn!(
                "ignoring completion event for finished upload {}",
                event.upload_id
            );
            return;
        }
        record.progress = 100;
        record.status = UploadStatus::Completed;
        record.timestamp = SystemTime::now();
    }

    pub fn apply_error(&self, event: &UploadErrorEvent) {
        let mut records = self.records.write();
        let record = records
            .entry(event.upload_id.clone())
            .or_insert_with(|| UploadProgressRecord::new(event.upload_id.clone(), 0));
        if record.status.is_terminal() {
            tracing::warn!(
                "ignoring error event for finished upload {}",
                event.upload_id
            );
            return;
        }
        record.status = UploadStatus::Error;
        record.error = event.error.clone();
        record.timestamp = SystemTime::now();
    }

    /// Progress view for an upload; unknown ids read as defaults.
    pub fn progress(&self, upload_id: &str) -> UploadProgressView {
        match self.records.read().get(upload_id) {
            Some(record) => UploadProgressView {
                progress: record.progress,
                status: record.status,
                error: record.error.clone(),
                is_active: record.progress > 0 && !record.status.is_terminal(),
            },
            None => UploadProgressView::default(),
        }
    }

    pub fn record(&self, upload_id: &str) -> Option<UploadProgressRecord> {
        self.records.read().get(upload_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for UploadStore {
    fn default() -> Self {
        Self::new()
    }
}
