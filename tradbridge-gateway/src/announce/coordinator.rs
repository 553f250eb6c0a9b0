//! Per-thread bookkeeping for the announcement engine.
//!
//! Each thread id owns an async lock serializing "scan, decide, send", at
//! most one pending (debounced) announcement and an optional creation
//! marker. Entries are evicted as soon as none of the three is in use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tradbridge_core::TagSet;

#[derive(Default)]
struct ThreadEntry {
    lock: Arc<tokio::sync::Mutex<()>>,
    pending: Option<Pending>,
    created_at: Option<Instant>,
}

struct Pending {
    generation: u64,
    cancel: watch::Sender<bool>,
    tags: TagSet,
}

/// Handle given to a scheduled announcement task.
pub struct PendingTicket {
    pub generation: u64,
    /// Flips to `true` when a newer event supersedes this task.
    pub cancelled: watch::Receiver<bool>,
    /// Whether an earlier pending task was cancelled to make room.
    pub superseded: bool,
}

/// Result of checking the recent-creation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationGuard {
    /// Thread was created `elapsed` ago, still inside the window.
    Recent { elapsed: Duration },
    /// No live creation marker.
    Clear,
}

pub struct ThreadCoordinator {
    entries: Mutex<HashMap<u64, ThreadEntry>>,
    recent_window: Duration,
    next_generation: Mutex<u64>,
}

impl ThreadCoordinator {
    pub fn new(recent_window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            recent_window,
            next_generation: Mutex::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u64, ThreadEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The lock serializing announcement work for one thread.
    pub fn lock_for(&self, thread_id: u64) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.entries().entry(thread_id).or_default().lock)
    }

    /// Register a new pending announcement, cancelling the previous one.
    pub fn schedule(&self, thread_id: u64, tags: TagSet) -> PendingTicket {
        let generation = {
            let mut next = self
                .next_generation
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *next += 1;
            *next
        };
        let (cancel, cancelled) = watch::channel(false);

        let mut entries = self.entries();
        let entry = entries.entry(thread_id).or_default();
        let previous = entry.pending.replace(Pending {
            generation,
            cancel,
            tags,
        });
        let superseded = match previous {
            Some(old) => {
                let _ = old.cancel.send(true);
                true
            }
            None => false,
        };

        PendingTicket {
            generation,
            cancelled,
            superseded,
        }
    }

    /// Tags recorded when the current pending announcement was scheduled.
    pub fn pending_tags(&self, thread_id: u64) -> Option<TagSet> {
        self.entries()
            .get(&thread_id)
            .and_then(|entry| entry.pending.as_ref())
            .map(|pending| pending.tags.clone())
    }

    /// Drop the pending entry of a finished or cancelled task.
    ///
    /// A newer generation is left untouched.
    pub fn finish(&self, thread_id: u64, generation: u64) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(&thread_id)
            && entry
                .pending
                .as_ref()
                .is_some_and(|pending| pending.generation == generation)
        {
            entry.pending = None;
        }
        Self::evict_if_idle(&mut entries, thread_id, self.recent_window);
    }

    /// Record the creation instant of a thread.
    pub fn mark_created(&self, thread_id: u64) {
        self.entries().entry(thread_id).or_default().created_at = Some(Instant::now());
    }

    /// Check the recent-creation window. An expired marker is forgotten.
    pub fn creation_guard(&self, thread_id: u64) -> CreationGuard {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(&thread_id) else {
            return CreationGuard::Clear;
        };
        let guard = match entry.created_at {
            Some(created) if created.elapsed() < self.recent_window => CreationGuard::Recent {
                elapsed: created.elapsed(),
            },
            Some(_) => {
                entry.created_at = None;
                CreationGuard::Clear
            }
            None => CreationGuard::Clear,
        };
        Self::evict_if_idle(&mut entries, thread_id, self.recent_window);
        guard
    }

    /// Release bookkeeping for a thread once its lock is no longer held.
    pub fn release(&self, thread_id: u64) {
        Self::evict_if_idle(&mut self.entries(), thread_id, self.recent_window);
    }

    /// Number of threads currently tracked.
    pub fn tracked(&self) -> usize {
        self.entries().len()
    }

    fn evict_if_idle(entries: &mut HashMap<u64, ThreadEntry>, thread_id: u64, window: Duration) {
        let idle = entries.get(&thread_id).is_some_and(|entry| {
            entry.pending.is_none()
                && entry
                    .created_at
                    .is_none_or(|created| created.elapsed() >= window)
                && Arc::strong_count(&entry.lock) == 1
        });
        if idle {
            entries.remove(&thread_id);
        }
    }
}
