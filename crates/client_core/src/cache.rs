//! Local cache of the todo list.
//!
//! Readers are wait-free (`ArcSwap` load of an immutable `Vec`). Writers
//! either swap in a whole new snapshot or run a pure transformation through
//! `rcu`, so a concurrent writer can never observe a half-applied change.

use std::{collections::HashSet, ops::Deref, sync::Arc};

use arc_swap::ArcSwap;
use shared::domain::{Todo, TodoId};
use tracing::warn;

/// Immutable, cheaply clonable view of the list at one instant. Item ids are
/// unique; order is newest first.
#[derive(Debug, Clone, Default)]
pub struct Snapshot(Arc<Vec<Todo>>);

impl Snapshot {
    /// Keeps the first occurrence of every id and drops the rest.
    pub fn new(items: Vec<Todo>) -> Self {
        Self(Arc::new(dedupe(items)))
    }

    pub fn items(&self) -> &[Todo] {
        &self.0
    }

    pub fn get(&self, id: &TodoId) -> Option<&Todo> {
        self.0.iter().find(|todo| &todo.id == id)
    }

    pub fn contains(&self, id: &TodoId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<TodoId> {
        self.0.iter().map(|todo| todo.id.clone()).collect()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Todo> {
        self.0.iter().filter(|todo| todo.is_placeholder())
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Snapshot {
    type Target = [Todo];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl Eq for Snapshot {}

impl From<Vec<Todo>> for Snapshot {
    fn from(items: Vec<Todo>) -> Self {
        Self::new(items)
    }
}

fn dedupe(items: Vec<Todo>) -> Vec<Todo> {
    let mut seen = HashSet::with_capacity(items.len());
    let before = items.len();
    let unique: Vec<Todo> = items
        .into_iter()
        .filter(|todo| seen.insert(todo.id.clone()))
        .collect();
    if unique.len() != before {
        warn!(
            dropped = before - unique.len(),
            "cache: dropped todos with duplicate ids"
        );
    }
    unique
}

#[derive(Default)]
pub struct LocalCache {
    current: ArcSwap<Vec<Todo>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> Snapshot {
        Snapshot(self.current.load_full())
    }

    pub fn replace(&self, snapshot: Snapshot) {
        self.current.store(snapshot.0);
    }

    /// Applies `f` to the current contents and stores the result. `f` may run
    /// more than once under contention, so it must be pure.
    pub fn mutate<F>(&self, mut f: F) -> Snapshot
    where
        F: FnMut(&[Todo]) -> Vec<Todo>,
    {
        let mut stored = Snapshot::default();
        self.current.rcu(|current| {
            stored = Snapshot::new(f(current));
            Arc::clone(&stored.0)
        });
        stored
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
