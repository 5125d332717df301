use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Todo, TodoId},
    error::ApiError,
    protocol::{todo_route, todos_route, CreateTodoRequest, ToggleTodoRequest},
};
use tracing::debug;
use url::Url;

use crate::{
    api::{PersistenceResult, TodoApi},
    error::PersistenceError,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub server_url: String,
    pub request_timeout: Duration,
}

impl ClientSettings {
    /// Validates `server_url` as an absolute http(s) URL and strips any
    /// trailing slash.
    pub fn new(server_url: &str, request_timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(server_url.trim())
            .with_context(|| format!("invalid server url: {server_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("server_url must start with http:// or https://"));
        }
        if request_timeout.is_zero() {
            return Err(anyhow!("request timeout must be greater than zero"));
        }
        Ok(Self {
            server_url: parsed.as_str().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }
}

/// [`TodoApi`] over the JSON HTTP routes served by the todo server.
pub struct HttpTodoApi {
    http: Client,
    server_url: String,
}

impl HttpTodoApi {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            server_url: settings.server_url.clone(),
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.server_url)
    }
}

#[async_trait]
impl TodoApi for HttpTodoApi {
    async fn list(&self) -> PersistenceResult<Vec<Todo>> {
        let res = self.http.get(self.url(todos_route())).send().await?;
        read_json(res).await
    }

    async fn create(&self, title: &str) -> PersistenceResult<Todo> {
        let res = self
            .http
            .post(self.url(todos_route()))
            .json(&CreateTodoRequest {
                title: title.to_string(),
            })
            .send()
            .await?;
        read_json(res).await
    }

    async fn update(&self, id: &TodoId, completed: bool) -> PersistenceResult<Todo> {
        let res = self
            .http
            .patch(self.url(&todo_route(id)))
            .json(&ToggleTodoRequest { completed })
            .send()
            .await?;
        read_json(res).await
    }

    async fn delete(&self, id: &TodoId) -> PersistenceResult<()> {
        let res = self.http.delete(self.url(&todo_route(id))).send().await?;
        let status = res.status();
        if status.is_success() {
            debug!(todo_id = %id, "http: delete acknowledged");
            return Ok(());
        }
        let body = res.text().await.unwrap_or_default();
        Err(error_from_response(status, &body))
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> PersistenceResult<T> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(error_from_response(status, &body));
    }
    res.json::<T>()
        .await
        .map_err(|err| PersistenceError::Transport(format!("malformed response body: {err}")))
}

/// Prefers the `ApiError` code in the body and falls back to the status.
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> PersistenceError {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
        return api_error.into();
    }

    let message = format!("server responded with {status}");
    if status == StatusCode::NOT_FOUND {
        PersistenceError::NotFound(message)
    } else if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        PersistenceError::Validation(message)
    } else {
        PersistenceError::Transport(message)
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
