use shared::{
    domain::{Todo, TodoId},
    error::{ApiError, ErrorCode},
    protocol::TITLE_MAX_CHARS,
};
use storage::{Storage, StoredTodo};
use tracing::debug;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_todos(ctx: &ApiContext) -> Result<Vec<Todo>, ApiError> {
    let todos = ctx.storage.list_todos().await.map_err(internal)?;
    Ok(todos.into_iter().map(todo_from_stored).collect())
}

pub async fn create_todo(ctx: &ApiContext, title: &str) -> Result<Todo, ApiError> {
    let title = validate_title(title)?;
    let stored = ctx.storage.create_todo(title).await.map_err(internal)?;
    debug!(todo_id = %stored.todo_id, "todo created");
    Ok(todo_from_stored(stored))
}

pub async fn toggle_todo(
    ctx: &ApiContext,
    todo_id: &TodoId,
    completed: bool,
) -> Result<Todo, ApiError> {
    let stored = ctx
        .storage
        .set_completed(todo_id, completed)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(todo_id))?;
    debug!(todo_id = %stored.todo_id, completed, "todo toggled");
    Ok(todo_from_stored(stored))
}

pub async fn delete_todo(ctx: &ApiContext, todo_id: &TodoId) -> Result<Todo, ApiError> {
    let stored = ctx
        .storage
        .delete_todo(todo_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(todo_id))?;
    debug!(todo_id = %stored.todo_id, "todo deleted");
    Ok(todo_from_stored(stored))
}

/// Trims surrounding whitespace and rejects empty or oversized titles.
pub fn validate_title(title: &str) -> Result<&str, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("title must not be empty"));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ApiError::validation(format!(
            "title exceeds {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(title)
}

fn todo_from_stored(stored: StoredTodo) -> Todo {
    Todo {
        id: stored.todo_id,
        title: stored.title,
        completed: stored.completed,
        created_at: stored.created_at,
        updated_at: stored.updated_at,
    }
}

fn not_found(todo_id: &TodoId) -> ApiError {
    ApiError::not_found(format!("todo {todo_id} not found"))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> ApiContext {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        ApiContext { storage }
    }

    #[tokio::test]
    async fn create_trims_title() {
        let ctx = setup().await;
        let todo = create_todo(&ctx, "  Buy milk  ").await.expect("create");
        assert_eq!(todo.title, "Buy milk");
        assert!(!todo.completed);
    }

    #[tokio::test]
    async fn blank_title_is_a_validation_error() {
        let ctx = setup().await;
        let err = create_todo(&ctx, "   ").await.expect_err("should fail");
        assert!(matches!(err.code, ErrorCode::Validation));
        assert!(list_todos(&ctx).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn oversized_title_is_a_validation_error() {
        let ctx = setup().await;
        let title = "x".repeat(TITLE_MAX_CHARS + 1);
        let err = create_todo(&ctx, &title).await.expect_err("should fail");
        assert!(matches!(err.code, ErrorCode::Validation));
    }

    #[tokio::test]
    async fn toggle_missing_todo_is_not_found() {
        let ctx = setup().await;
        let err = toggle_todo(&ctx, &TodoId::generate(), true)
            .await
            .expect_err("should fail");
        assert!(matches!(err.code, ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found_the_second_time() {
        let ctx = setup().await;
        let todo = create_todo(&ctx, "once").await.expect("create");
        delete_todo(&ctx, &todo.id).await.expect("first delete");
        let err = delete_todo(&ctx, &todo.id).await.expect_err("second delete");
        assert!(matches!(err.code, ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn toggle_round_trips_through_list() {
        let ctx = setup().await;
        let todo = create_todo(&ctx, "read book").await.expect("create");
        toggle_todo(&ctx, &todo.id, true).await.expect("toggle");

        let todos = list_todos(&ctx).await.expect("list");
        assert_eq!(todos.len(), 1);
        assert!(todos[0].completed);
    }
}
