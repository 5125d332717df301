use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::TodoId;

const TODO_COLUMNS: &str = "id, title, completed, created_at, updated_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTodo {
    pub todo_id: TodoId,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredTodo {
    fn from_row(row: &SqliteRow) -> Self {
        Self {
            todo_id: TodoId(row.get::<String, _>("id")),
            title: row.get::<String, _>("title"),
            completed: row.get::<bool, _>("completed"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        }
    }
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Newest first. Rows created within the same timestamp fall back to
    /// insertion order.
    pub async fn list_todos(&self) -> Result<Vec<StoredTodo>> {
        let rows = sqlx::query(&format!(
            "SELECT {TODO_COLUMNS} FROM todos ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("failed to list todos")?;
        Ok(rows.iter().map(StoredTodo::from_row).collect())
    }

    pub async fn create_todo(&self, title: &str) -> Result<StoredTodo> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO todos (id, title, completed, created_at, updated_at)
             VALUES (?, ?, 0, ?, ?)
             RETURNING {TODO_COLUMNS}"
        ))
        .bind(TodoId::generate().0)
        .bind(title)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert todo")?;
        Ok(StoredTodo::from_row(&row))
    }

    pub async fn load_todo(&self, todo_id: &TodoId) -> Result<Option<StoredTodo>> {
        let row = sqlx::query(&format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?"))
            .bind(todo_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(StoredTodo::from_row))
    }

    /// Returns `None` when no row carries `todo_id`.
    pub async fn set_completed(
        &self,
        todo_id: &TodoId,
        completed: bool,
    ) -> Result<Option<StoredTodo>> {
        let row = sqlx::query(&format!(
            "UPDATE todos SET completed = ?, updated_at = ?
             WHERE id = ?
             RETURNING {TODO_COLUMNS}"
        ))
        .bind(completed)
        .bind(Utc::now())
        .bind(todo_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update todo {todo_id}"))?;
        Ok(row.as_ref().map(StoredTodo::from_row))
    }

    /// Returns the removed row, or `None` when nothing matched.
    pub async fn delete_todo(&self, todo_id: &TodoId) -> Result<Option<StoredTodo>> {
        let row = sqlx::query(&format!(
            "DELETE FROM todos WHERE id = ? RETURNING {TODO_COLUMNS}"
        ))
        .bind(todo_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to delete todo {todo_id}"))?;
        Ok(row.as_ref().map(StoredTodo::from_row))
    }
}

/// Creates the directory a file-backed SQLite url points into. In-memory and
/// non-SQLite urls are left alone.
pub fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
