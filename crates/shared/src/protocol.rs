use serde::{Deserialize, Serialize};

use crate::domain::TodoId;

pub const TITLE_MAX_CHARS: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleTodoRequest {
    pub completed: bool,
}

pub fn todos_route() -> &'static str {
    "/todos"
}

/// Axum path pattern matching [`todo_route`].
pub fn todo_route_pattern() -> &'static str {
    "/todos/:todo_id"
}

pub fn todo_route(id: &TodoId) -> String {
    format!("/todos/{}", id.as_str())
}

pub fn health_route() -> &'static str {
    "/healthz"
}
