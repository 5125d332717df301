//! Bookkeeping for mutations that have been dispatched but not yet settled.

use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use shared::domain::TodoId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Toggle,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::Create => "create",
            MutationKind::Toggle => "toggle",
            MutationKind::Delete => "delete",
        })
    }
}

/// Ids with a delete request sent and not yet settled.
#[derive(Default)]
pub struct InFlightDeletes {
    ids: Mutex<HashSet<TodoId>>,
}

impl InFlightDeletes {
    /// Marks `id` as being deleted. Returns `None` when a delete for the same
    /// id is already in flight; the check and the insert happen under one lock.
    pub fn try_begin(&self, id: &TodoId) -> Option<DeleteGuard<'_>> {
        if !lock(&self.ids).insert(id.clone()) {
            return None;
        }
        Some(DeleteGuard {
            deletes: self,
            id: id.clone(),
            released: false,
        })
    }

    pub fn contains(&self, id: &TodoId) -> bool {
        lock(&self.ids).contains(id)
    }

    pub fn ids(&self) -> HashSet<TodoId> {
        lock(&self.ids).clone()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.ids).is_empty()
    }

    fn remove(&self, id: &TodoId) {
        lock(&self.ids).remove(id);
    }
}

/// Membership of one id in [`InFlightDeletes`]. Released explicitly once the
/// delete settles; dropping it unreleased also clears the marker.
pub struct DeleteGuard<'a> {
    deletes: &'a InFlightDeletes,
    id: TodoId,
    released: bool,
}

impl DeleteGuard<'_> {
    pub fn release(mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        if !self.released {
            self.deletes.remove(&self.id);
            self.released = true;
        }
    }
}

impl Drop for DeleteGuard<'_> {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Count of in-flight mutations per kind, backing the "pending" indicators.
#[derive(Default)]
pub struct PendingFlags {
    create: AtomicUsize,
    toggle: AtomicUsize,
    delete: AtomicUsize,
}

impl PendingFlags {
    pub fn begin(&self, kind: MutationKind) -> PendingGuard<'_> {
        let counter = self.counter(kind);
        counter.fetch_add(1, Ordering::SeqCst);
        PendingGuard { counter }
    }

    pub fn is_pending(&self, kind: MutationKind) -> bool {
        self.count(kind) > 0
    }

    pub fn count(&self, kind: MutationKind) -> usize {
        self.counter(kind).load(Ordering::SeqCst)
    }

    fn counter(&self, kind: MutationKind) -> &AtomicUsize {
        match kind {
            MutationKind::Create => &self.create,
            MutationKind::Toggle => &self.toggle,
            MutationKind::Delete => &self.delete,
        }
    }
}

pub struct PendingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
