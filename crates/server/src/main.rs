use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use server_api::{create_todo, delete_todo, list_todos, toggle_todo, ApiContext};
use shared::{
    domain::{Todo, TodoId},
    error::{ApiError, ErrorCode},
    protocol::{
        health_route, todo_route_pattern, todos_route, CreateTodoRequest, ToggleTodoRequest,
    },
};
use storage::Storage;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(health_route(), get(healthz))
        .route(todos_route(), get(http_list_todos).post(http_create_todo))
        .route(
            todo_route_pattern(),
            patch(http_toggle_todo).delete(http_delete_todo),
        )
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.api.storage.health_check().await.map_err(|error| {
        error!(%error, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

async fn http_list_todos(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Todo>> {
    let todos = list_todos(&state.api).await.map_err(api_failure)?;
    Ok(Json(todos))
}

async fn http_create_todo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTodoRequest>,
) -> ApiResult<Todo> {
    let todo = create_todo(&state.api, &req.title)
        .await
        .map_err(api_failure)?;
    info!(todo_id = %todo.id, "todo created");
    Ok(Json(todo))
}

async fn http_toggle_todo(
    State(state): State<Arc<AppState>>,
    Path(todo_id): Path<String>,
    Json(req): Json<ToggleTodoRequest>,
) -> ApiResult<Todo> {
    let todo = toggle_todo(&state.api, &TodoId(todo_id), req.completed)
        .await
        .map_err(api_failure)?;
    Ok(Json(todo))
}

async fn http_delete_todo(
    State(state): State<Arc<AppState>>,
    Path(todo_id): Path<String>,
) -> ApiResult<Todo> {
    let todo = delete_todo(&state.api, &TodoId(todo_id))
        .await
        .map_err(api_failure)?;
    info!(todo_id = %todo.id, "todo deleted");
    Ok(Json(todo))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_failure(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(err.code);
    if status.is_server_error() {
        error!(message = %err.message, "todo request failed");
    } else {
        warn!(code = ?err.code, message = %err.message, "todo request rejected");
    }
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
