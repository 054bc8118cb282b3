//! Per-user conversation state and in-flight job tracking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use teloxide::types::{ChatId, MessageId};
use tokio::task::AbortHandle;

use crate::cache::{CacheConfig, TypedCache};
use crate::database::MetadataField;
use crate::media::IncomingFile;

/// Idle time after which a pending prompt is forgotten.
pub const SESSION_IDLE: Duration = Duration::from_secs(10 * 60);

/// What the bot expects the user's next message to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// A new name for the file that was just sent in manual mode.
    AwaitingFilename(IncomingFile),
    /// A new format template.
    AwaitingFormat,
    /// The template body for a `/savefmt <name>`.
    AwaitingTemplateSave(String),
    /// A photo to use as custom thumbnail.
    AwaitingThumbnail,
    /// A message to broadcast (admins only).
    AwaitingBroadcast,
    /// A value for one metadata field.
    AwaitingMetadata(MetadataField),
}

/// Pending actions keyed by user id, expiring after inactivity.
#[derive(Clone)]
pub struct SessionStore {
    pending: TypedCache<u64, PendingAction>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_idle(SESSION_IDLE)
    }

    pub fn with_idle(idle: Duration) -> Self {
        Self {
            pending: TypedCache::new("sessions", CacheConfig::session(idle)),
        }
    }

    /// Replace whatever the user was doing with `action`.
    pub fn set(&self, user_id: u64, action: PendingAction) {
        self.pending.insert(user_id, action);
    }

    pub fn get(&self, user_id: u64) -> Option<PendingAction> {
        self.pending.get(&user_id)
    }

    /// Remove and return the pending action.
    pub fn take(&self, user_id: u64) -> Option<PendingAction> {
        self.pending.remove(&user_id)
    }

    pub fn clear(&self, user_id: u64) {
        self.pending.invalidate(&user_id);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A claimed job slot for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSlot {
    pub user_id: u64,
    pub generation: u64,
}

/// Where a job reports its progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLocation {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

#[derive(Debug)]
struct RunningJob {
    generation: u64,
    handle: Option<AbortHandle>,
    status: Option<StatusLocation>,
}

/// Tracks at most one running job per user.
///
/// Each slot carries a generation so a finished task never clears the slot
/// of a newer job.
#[derive(Clone, Default)]
pub struct JobTracker {
    running: Arc<DashMap<u64, RunningJob>>,
    counter: Arc<AtomicU64>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the user's slot. `None` while another job is running.
    pub fn try_start(&self, user_id: u64) -> Option<JobSlot> {
        let generation = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        match self.running.entry(user_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(RunningJob {
                    generation,
                    handle: None,
                    status: None,
                });
                Some(JobSlot { user_id, generation })
            }
        }
    }

    /// Remember how to abort the task that owns `slot` and where it reports.
    pub fn attach(&self, slot: JobSlot, handle: AbortHandle, status: StatusLocation) {
        if let Some(mut entry) = self.running.get_mut(&slot.user_id) {
            if entry.generation == slot.generation {
                entry.handle = Some(handle);
                entry.status = Some(status);
            }
        }
    }

    /// Release the slot, if it still belongs to this job.
    pub fn finish(&self, slot: JobSlot) {
        self.running
            .remove_if(&slot.user_id, |_, job| job.generation == slot.generation);
    }

    /// Abort the user's running job.
    ///
    /// Returns `None` when nothing was running, otherwise the job's status
    /// message. The aborted task can no longer update it, so the caller must.
    pub fn cancel(&self, user_id: u64) -> Option<Option<StatusLocation>> {
        let (_, job) = self.running.remove(&user_id)?;
        if let Some(handle) = job.handle {
            handle.abort();
        }
        Some(job.status)
    }

    pub fn is_busy(&self, user_id: u64) -> bool {
        self.running.contains_key(&user_id)
    }

    pub fn active(&self) -> usize {
        self.running.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{FileKind, sample_file};

    #[test]
    fn test_session_set_take() {
        let sessions = SessionStore::new();
        assert_eq!(sessions.get(1), None);

        sessions.set(1, PendingAction::AwaitingFormat);
        sessions.set(1, PendingAction::AwaitingThumbnail);
        assert_eq!(sessions.get(1), Some(PendingAction::AwaitingThumbnail));

        assert_eq!(sessions.take(1), Some(PendingAction::AwaitingThumbnail));
        assert_eq!(sessions.take(1), None);
    }

    #[test]
    fn test_session_holds_file() {
        let sessions = SessionStore::new();
        let file = sample_file("a.mkv", FileKind::Document, 10);
        sessions.set(7, PendingAction::AwaitingFilename(file.clone()));
        sessions.set(8, PendingAction::AwaitingBroadcast);

        sessions.clear(8);
        assert_eq!(sessions.get(8), None);
        assert_eq!(sessions.take(7), Some(PendingAction::AwaitingFilename(file)));
    }

    #[test]
    fn test_one_job_per_user() {
        let jobs = JobTracker::new();
        let slot = jobs.try_start(1).unwrap();
        assert!(jobs.is_busy(1));
        assert!(jobs.try_start(1).is_none());
        assert!(jobs.try_start(2).is_some());
        assert_eq!(jobs.active(), 2);

        jobs.finish(slot);
        assert!(!jobs.is_busy(1));
    }

    #[test]
    fn test_stale_finish_keeps_newer_job() {
        let jobs = JobTracker::new();
        let old = jobs.try_start(1).unwrap();
        assert_eq!(jobs.cancel(1), Some(None));

        let new = jobs.try_start(1).unwrap();
        jobs.finish(old);
        assert!(jobs.is_busy(1));

        jobs.finish(new);
        assert!(!jobs.is_busy(1));
        assert_eq!(jobs.cancel(1), None);
    }

    #[tokio::test]
    async fn test_cancel_aborts_task() {
        let jobs = JobTracker::new();
        let slot = jobs.try_start(5).unwrap();
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let status = StatusLocation {
            chat_id: ChatId(5),
            message_id: MessageId(77),
        };
        jobs.attach(slot, task.abort_handle(), status);

        assert_eq!(jobs.cancel(5), Some(Some(status)));
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(jobs.cancel(5), None);
    }

    #[tokio::test]
    async fn test_stale_attach_is_ignored() {
        let jobs = JobTracker::new();
        let old = jobs.try_start(5).unwrap();
        jobs.cancel(5);
        let _new = jobs.try_start(5).unwrap();

        let task = tokio::spawn(async {});
        let status = StatusLocation {
            chat_id: ChatId(5),
            message_id: MessageId(1),
        };
        jobs.attach(old, task.abort_handle(), status);
        assert_eq!(jobs.cancel(5), Some(None));
    }
}
