//! Upload queue state.
//!
//! The queue is an immutable snapshot held in a `watch` channel. Every
//! change is a [`QueueAction`] applied by [`UploadQueue::apply`] inside
//! `send_modify`, so concurrent upload tasks never interleave partial
//! updates and subscribers always see a whole snapshot.

use bytes::Bytes;
use mapas_core::naming::display_name;
use mapas_core::{MapId, UploadStatus};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Identifier of a queue entry, unique within one [`QueueHandle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One file selected for upload.
#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub id: EntryId,
    /// Original file name, used to build the object key.
    pub file_name: String,
    /// Display name of the map (editable).
    pub name: String,
    /// Farm label (editable).
    pub farm: String,
    pub data: Bytes,
    pub status: UploadStatus,
    /// Attempts made in the current run.
    pub attempts: u32,
    /// Last error message.
    pub error: Option<String>,
    /// Row created by a successful upload.
    pub map_id: Option<MapId>,
}

impl QueueEntry {
    fn new(id: EntryId, file_name: &str, farm: &str, data: Bytes) -> Self {
        Self {
            id,
            file_name: file_name.to_string(),
            name: display_name(file_name),
            farm: farm.trim().to_string(),
            data,
            status: UploadStatus::Pending,
            attempts: 0,
            error: None,
            map_id: None,
        }
    }

    /// Size of the file in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn is_editable(&self) -> bool {
        matches!(self.status, UploadStatus::Pending | UploadStatus::Error)
    }
}

/// A state transition of the queue.
#[derive(Clone, Debug)]
pub enum QueueAction {
    Add(QueueEntry),
    Remove(EntryId),
    Clear,
    /// Drop every successful entry.
    ClearCompleted,
    SetName { id: EntryId, name: String },
    SetFarm { id: EntryId, farm: String },
    /// Attempt `attempt` (1-based) is in flight.
    Started { id: EntryId, attempt: u32 },
    /// An attempt failed and another one will follow.
    AttemptFailed { id: EntryId, error: String },
    Succeeded { id: EntryId, map_id: MapId },
    /// The last attempt failed.
    Failed { id: EntryId, error: String },
    /// The run was cancelled while the entry was in flight.
    Interrupted { id: EntryId },
    /// Every errored entry back to pending with a fresh attempt count.
    ResetFailed,
}

/// Snapshot of the upload queue.
#[derive(Clone, Debug, Default)]
pub struct UploadQueue {
    entries: Vec<QueueEntry>,
}

impl UploadQueue {
    /// All entries, in insertion order.
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries waiting for the next run.
    pub fn pending(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == UploadStatus::Pending)
    }

    /// Number of entries in `status`.
    pub fn count(&self, status: UploadStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut QueueEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Apply one action. Returns whether the snapshot changed.
    ///
    /// Actions addressing a removed entry are ignored. Entries that are in
    /// flight can be neither removed nor edited.
    pub fn apply(&mut self, action: QueueAction) -> bool {
        match action {
            QueueAction::Add(entry) => {
                if self.get(entry.id).is_some() {
                    return false;
                }
                self.entries.push(entry);
                true
            }
            QueueAction::Remove(id) => {
                let before = self.entries.len();
                self.entries
                    .retain(|e| e.id != id || e.status == UploadStatus::Uploading);
                self.entries.len() != before
            }
            QueueAction::Clear => {
                let before = self.entries.len();
                self.entries.retain(|e| e.status == UploadStatus::Uploading);
                self.entries.len() != before
            }
            QueueAction::ClearCompleted => {
                let before = self.entries.len();
                self.entries.retain(|e| e.status != UploadStatus::Success);
                self.entries.len() != before
            }
            QueueAction::SetName { id, name } => match self.entry_mut(id) {
                Some(entry) if entry.is_editable() => {
                    let name = name.trim();
                    entry.name = if name.is_empty() {
                        display_name(&entry.file_name)
                    } else {
                        name.to_string()
                    };
                    true
                }
                _ => false,
            },
            QueueAction::SetFarm { id, farm } => match self.entry_mut(id) {
                Some(entry) if entry.is_editable() => {
                    entry.farm = farm.trim().to_string();
                    true
                }
                _ => false,
            },
            QueueAction::Started { id, attempt } => match self.entry_mut(id) {
                Some(entry) if !entry.status.is_terminal() => {
                    entry.status = UploadStatus::Uploading;
                    entry.attempts = attempt;
                    true
                }
                _ => false,
            },
            QueueAction::AttemptFailed { id, error } => match self.entry_mut(id) {
                Some(entry) if entry.status == UploadStatus::Uploading => {
                    entry.error = Some(error);
                    true
                }
                _ => false,
            },
            QueueAction::Succeeded { id, map_id } => match self.entry_mut(id) {
                Some(entry) => {
                    entry.status = UploadStatus::Success;
                    entry.error = None;
                    entry.map_id = Some(map_id);
                    true
                }
                None => false,
            },
            QueueAction::Failed { id, error } => match self.entry_mut(id) {
                Some(entry) => {
                    entry.status = UploadStatus::Error;
                    entry.error = Some(error);
                    true
                }
                None => false,
            },
            QueueAction::Interrupted { id } => match self.entry_mut(id) {
                Some(entry) if entry.status == UploadStatus::Uploading => {
                    entry.status = UploadStatus::Pending;
                    entry.error = Some("cancelled".to_string());
                    true
                }
                _ => false,
            },
            QueueAction::ResetFailed => {
                let mut changed = false;
                for entry in self
                    .entries
                    .iter_mut()
                    .filter(|e| e.status == UploadStatus::Error)
                {
                    entry.status = UploadStatus::Pending;
                    entry.attempts = 0;
                    entry.error = None;
                    changed = true;
                }
                changed
            }
        }
    }
}

/// Shared handle to the queue.
#[derive(Clone)]
pub struct QueueHandle {
    tx: Arc<watch::Sender<UploadQueue>>,
    next_id: Arc<AtomicU64>,
}

impl QueueHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(UploadQueue::default());
        Self {
            tx: Arc::new(tx),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Apply an action atomically. Subscribers are notified on change only.
    pub fn apply(&self, action: QueueAction) -> bool {
        self.tx.send_if_modified(|queue| queue.apply(action))
    }

    /// Queue a file. The display name defaults to the file name without
    /// its extension.
    pub fn add_file(&self, file_name: &str, farm: &str, data: Bytes) -> EntryId {
        let id = EntryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.apply(QueueAction::Add(QueueEntry::new(id, file_name, farm, data)));
        id
    }

    pub fn remove(&self, id: EntryId) -> bool {
        self.apply(QueueAction::Remove(id))
    }

    pub fn clear(&self) {
        self.apply(QueueAction::Clear);
    }

    pub fn clear_completed(&self) {
        self.apply(QueueAction::ClearCompleted);
    }

    pub fn set_name(&self, id: EntryId, name: &str) -> bool {
        self.apply(QueueAction::SetName {
            id,
            name: name.to_string(),
        })
    }

    pub fn set_farm(&self, id: EntryId, farm: &str) -> bool {
        self.apply(QueueAction::SetFarm {
            id,
            farm: farm.to_string(),
        })
    }

    /// Reset errored entries to pending. Returns how many were reset.
    pub fn reset_failed(&self) -> usize {
        let mut reset = 0;
        self.tx.send_if_modified(|queue| {
            reset = queue.count(UploadStatus::Error);
            queue.apply(QueueAction::ResetFailed)
        });
        reset
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> UploadQueue {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<UploadQueue> {
        self.tx.subscribe()
    }
}

impl Default for QueueHandle {
    fn default() -> Self {
        Self::new()
    }
}
