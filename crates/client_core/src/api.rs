use async_trait::async_trait;
use shared::domain::{Todo, TodoId};

use crate::error::PersistenceError;

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

/// Remote authoritative store for the todo list.
#[async_trait]
pub trait TodoApi: Send + Sync {
    /// All todos, newest first.
    async fn list(&self) -> PersistenceResult<Vec<Todo>>;
    async fn create(&self, title: &str) -> PersistenceResult<Todo>;
    async fn update(&self, id: &TodoId, completed: bool) -> PersistenceResult<Todo>;
    async fn delete(&self, id: &TodoId) -> PersistenceResult<()>;
}
