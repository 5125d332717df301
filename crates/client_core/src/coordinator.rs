//! Optimistic mutation coordinator.
//!
//! Every user intent runs snapshot -> speculate -> dispatch -> settle:
//! the cache changes before the remote call is made, the remote call runs to
//! completion, and the settle step either keeps the speculation or restores
//! the snapshot. Both outcomes end with a full refresh from the store, which
//! is what finally orders concurrent mutations.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use shared::domain::{Todo, TodoId};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    api::TodoApi,
    cache::{LocalCache, Snapshot},
    error::{MutationError, PersistenceError},
    inflight::{lock, InFlightDeletes, MutationKind, PendingFlags},
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    /// The cache contents changed; re-read the view.
    CacheChanged,
    /// A pending indicator or the in-flight delete set changed.
    PendingChanged,
    MutationFailed {
        kind: MutationKind,
        todo_id: Option<TodoId>,
        message: String,
    },
    RefreshFailed {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Idle,
    Speculated,
    Dispatched,
    Confirmed,
    RolledBack,
}

/// One mutation's rollback point and position in its lifecycle.
///
/// Settling is idempotent: the snapshot is consumed by the first
/// [`confirm`](Self::confirm) or [`roll_back`](Self::roll_back), so a second
/// settle never re-applies it.
#[derive(Debug)]
pub struct PendingMutation {
    kind: MutationKind,
    target: Option<TodoId>,
    phase: MutationPhase,
    rollback: Option<Snapshot>,
}

impl PendingMutation {
    pub fn new(kind: MutationKind, target: Option<TodoId>, rollback: Snapshot) -> Self {
        Self {
            kind,
            target,
            phase: MutationPhase::Idle,
            rollback: Some(rollback),
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn target(&self) -> Option<&TodoId> {
        self.target.as_ref()
    }

    pub fn phase(&self) -> MutationPhase {
        self.phase
    }

    pub fn is_settled(&self) -> bool {
        self.rollback.is_none()
    }

    pub fn mark_speculated(&mut self) {
        self.transition(MutationPhase::Speculated);
    }

    pub fn mark_dispatched(&mut self) {
        self.transition(MutationPhase::Dispatched);
    }

    /// Discards the rollback point. Returns false if already settled.
    pub fn confirm(&mut self) -> bool {
        if self.rollback.take().is_none() {
            return false;
        }
        self.transition(MutationPhase::Confirmed);
        true
    }

    /// Restores the rollback point into `cache`. Returns false, leaving the
    /// cache untouched, if this mutation was already settled.
    pub fn roll_back(&mut self, cache: &LocalCache) -> bool {
        let Some(snapshot) = self.rollback.take() else {
            return false;
        };
        cache.replace(snapshot);
        self.transition(MutationPhase::RolledBack);
        true
    }

    pub fn mark_reconciled(&mut self) {
        self.transition(MutationPhase::Idle);
    }

    fn transition(&mut self, next: MutationPhase) {
        debug!(
            kind = %self.kind,
            todo_id = ?self.target,
            from = ?self.phase,
            to = ?next,
            "mutation phase"
        );
        self.phase = next;
    }
}

/// Everything the rendering layer needs for one frame.
#[derive(Debug, Clone)]
pub struct ListView {
    pub items: Snapshot,
    /// The initial list fetch has not settled yet.
    pub loading: bool,
    pub deleting: HashSet<TodoId>,
    pub create_pending: bool,
    pub toggle_pending: bool,
    pub delete_pending: bool,
    pub draft: String,
}

impl ListView {
    pub fn is_deleting(&self, id: &TodoId) -> bool {
        self.deleting.contains(id)
    }

    pub fn can_submit(&self) -> bool {
        !self.create_pending
    }

    /// Placeholders have no server id yet, so their controls stay disabled.
    pub fn can_toggle(&self, todo: &Todo) -> bool {
        !self.toggle_pending && !self.is_deleting(&todo.id) && !todo.is_placeholder()
    }

    pub fn can_delete(&self, todo: &Todo) -> bool {
        !self.is_deleting(&todo.id) && !todo.is_placeholder()
    }
}

pub struct MutationCoordinator {
    api: Arc<dyn TodoApi>,
    cache: LocalCache,
    deleting: InFlightDeletes,
    pending: PendingFlags,
    loading: AtomicBool,
    /// Bumped before every speculation. A list response is applied only if
    /// the epoch still matches the one read when its request went out.
    query_epoch: Mutex<u64>,
    draft: Mutex<String>,
    events: broadcast::Sender<ListEvent>,
}

impl MutationCoordinator {
    pub fn new(api: Arc<dyn TodoApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            cache: LocalCache::new(),
            deleting: InFlightDeletes::default(),
            pending: PendingFlags::default(),
            loading: AtomicBool::new(false),
            query_epoch: Mutex::new(0),
            draft: Mutex::new(String::new()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.cache.read()
    }

    pub fn is_deleting(&self, id: &TodoId) -> bool {
        self.deleting.contains(id)
    }

    pub fn deleting_ids(&self) -> HashSet<TodoId> {
        self.deleting.ids()
    }

    pub fn is_pending(&self, kind: MutationKind) -> bool {
        self.pending.is_pending(kind)
    }

    pub fn view(&self) -> ListView {
        ListView {
            items: self.cache.read(),
            loading: self.loading.load(Ordering::SeqCst),
            deleting: self.deleting.ids(),
            create_pending: self.pending.is_pending(MutationKind::Create),
            toggle_pending: self.pending.is_pending(MutationKind::Toggle),
            delete_pending: self.pending.is_pending(MutationKind::Delete),
            draft: self.draft(),
        }
    }

    pub fn draft(&self) -> String {
        lock(&self.draft).clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        *lock(&self.draft) = text.into();
    }

    /// Initial population of the cache. `view().loading` is set until the
    /// fetch settles either way.
    pub async fn load(&self) -> Result<(), PersistenceError> {
        self.loading.store(true, Ordering::SeqCst);
        self.emit(ListEvent::PendingChanged);
        let outcome = self.refresh().await;
        self.loading.store(false, Ordering::SeqCst);
        self.emit(ListEvent::PendingChanged);

        if outcome? {
            info!(count = self.cache.read().len(), "todo list loaded");
        }
        Ok(())
    }

    /// Replaces the cache with the store's list. Returns `Ok(false)` when a
    /// mutation started while the request was in flight and the response was
    /// discarded as stale.
    pub async fn refresh(&self) -> Result<bool, PersistenceError> {
        let epoch = *lock(&self.query_epoch);
        let todos = match self.api.list().await {
            Ok(todos) => todos,
            Err(err) => {
                error!(error = %err, "failed to refresh todo list");
                self.emit(ListEvent::RefreshFailed {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        {
            let current = lock(&self.query_epoch);
            if *current != epoch {
                debug!(
                    requested_at = epoch,
                    current = *current,
                    "discarding stale list response"
                );
                return Ok(false);
            }
            self.cache.replace(Snapshot::new(todos));
        }
        self.emit(ListEvent::CacheChanged);
        Ok(true)
    }

    /// Submits the input draft as a new todo. Whitespace-only drafts are
    /// ignored and return `Ok(None)`.
    pub async fn submit_draft(&self) -> Result<Option<Todo>, MutationError> {
        let title = self.draft().trim().to_string();
        if title.is_empty() {
            return Ok(None);
        }
        self.create(title).await.map(Some)
    }

    pub async fn create(&self, title: impl Into<String>) -> Result<Todo, MutationError> {
        let title = title.into();
        let pending = self.pending.begin(MutationKind::Create);
        self.emit(ListEvent::PendingChanged);

        let placeholder = Todo::placeholder(title.clone());
        let placeholder_id = placeholder.id.clone();
        let mut mutation = self.speculate(
            MutationKind::Create,
            Some(placeholder_id.clone()),
            move |items: &[Todo]| {
                let mut next = Vec::with_capacity(items.len() + 1);
                next.push(placeholder.clone());
                next.extend_from_slice(items);
                next
            },
        );
        lock(&self.draft).clear();

        mutation.mark_dispatched();
        let outcome = match self.api.create(&title).await {
            Ok(todo) => {
                mutation.confirm();
                info!(todo_id = %todo.id, %placeholder_id, "todo created");
                Ok(todo)
            }
            Err(err) => {
                self.roll_back(&mut mutation, &err);
                Err(MutationError::Remote(err))
            }
        };

        self.reconcile(&mut mutation).await;
        drop(pending);
        self.emit(ListEvent::PendingChanged);
        outcome
    }

    /// Sets `completed` on `id`. An id missing from the cache is still sent
    /// to the store; only the speculative step is skipped.
    pub async fn toggle(&self, id: &TodoId, completed: bool) -> Result<Todo, MutationError> {
        let pending = self.pending.begin(MutationKind::Toggle);
        self.emit(ListEvent::PendingChanged);

        let mark_completed = |items: &[Todo]| -> Vec<Todo> {
            items
                .iter()
                .map(|todo| {
                    if &todo.id == id {
                        Todo {
                            completed,
                            ..todo.clone()
                        }
                    } else {
                        todo.clone()
                    }
                })
                .collect()
        };
        let mut mutation = self.speculate(MutationKind::Toggle, Some(id.clone()), mark_completed);

        mutation.mark_dispatched();
        let outcome = match self.api.update(id, completed).await {
            Ok(todo) => {
                mutation.confirm();
                info!(todo_id = %id, completed, "todo toggled");
                Ok(todo)
            }
            Err(err) => {
                self.roll_back(&mut mutation, &err);
                Err(MutationError::Remote(err))
            }
        };

        self.reconcile(&mut mutation).await;
        drop(pending);
        self.emit(ListEvent::PendingChanged);
        outcome
    }

    /// Flips the cached `completed` value of `id`. Returns `Ok(None)` without
    /// dispatching when the id is not in the cache.
    pub async fn toggle_item(&self, id: &TodoId) -> Result<Option<Todo>, MutationError> {
        let Some(completed) = self.cache.read().get(id).map(|todo| todo.completed) else {
            warn!(todo_id = %id, "toggle requested for unknown todo");
            return Ok(None);
        };
        self.toggle(id, !completed).await.map(Some)
    }

    /// Deletes `id`, refusing without a remote call if a delete for the same
    /// id is still in flight.
    pub async fn delete(&self, id: &TodoId) -> Result<(), MutationError> {
        let Some(marker) = self.deleting.try_begin(id) else {
            warn!(todo_id = %id, "delete already in flight; ignoring repeat request");
            return Err(MutationError::DeleteInFlight(id.clone()));
        };
        let pending = self.pending.begin(MutationKind::Delete);
        self.emit(ListEvent::PendingChanged);

        let without_target = |items: &[Todo]| -> Vec<Todo> {
            items.iter().filter(|todo| &todo.id != id).cloned().collect()
        };
        let mut mutation = self.speculate(MutationKind::Delete, Some(id.clone()), without_target);

        mutation.mark_dispatched();
        let outcome = match self.api.delete(id).await {
            Ok(()) => {
                mutation.confirm();
                info!(todo_id = %id, "todo deleted");
                // The marker must outlive the refresh so the item never shows
                // an enabled control right before it disappears.
                self.reconcile(&mut mutation).await;
                marker.release();
                Ok(())
            }
            Err(err) => {
                self.roll_back(&mut mutation, &err);
                marker.release();
                self.emit(ListEvent::PendingChanged);
                self.reconcile(&mut mutation).await;
                Err(MutationError::Remote(err))
            }
        };

        drop(pending);
        self.emit(ListEvent::PendingChanged);
        outcome
    }

    /// Cancels in-flight list queries, captures the rollback point and applies
    /// `f`, all under the epoch lock so no list response can land in between.
    fn speculate<F>(&self, kind: MutationKind, target: Option<TodoId>, f: F) -> PendingMutation
    where
        F: FnMut(&[Todo]) -> Vec<Todo>,
    {
        let mut mutation = {
            let mut epoch = lock(&self.query_epoch);
            *epoch += 1;
            let mutation = PendingMutation::new(kind, target, self.cache.read());
            self.cache.mutate(f);
            mutation
        };
        mutation.mark_speculated();
        self.emit(ListEvent::CacheChanged);
        mutation
    }

    fn roll_back(&self, mutation: &mut PendingMutation, err: &PersistenceError) {
        if mutation.roll_back(&self.cache) {
            self.emit(ListEvent::CacheChanged);
        }
        error!(
            kind = %mutation.kind(),
            todo_id = ?mutation.target(),
            error = %err,
            "mutation failed; speculative change rolled back"
        );
        self.emit(ListEvent::MutationFailed {
            kind: mutation.kind(),
            todo_id: mutation.target().cloned(),
            message: err.to_string(),
        });
    }

    /// Refresh failures are reported through events and logs only; the
    /// mutation outcome has already been decided.
    async fn reconcile(&self, mutation: &mut PendingMutation) {
        if let Err(err) = self.refresh().await {
            debug!(
                kind = %mutation.kind(),
                error = %err,
                "refresh after mutation failed; cache may lag the store"
            );
        }
        mutation.mark_reconciled();
    }

    fn emit(&self, event: ListEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
