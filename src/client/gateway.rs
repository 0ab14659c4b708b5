//! Reqwest-backed gateway to the book lending API.
//!
//! Every call runs under the configured request timeout. Idempotent calls are
//! retried with backoff on transient failures; `add` is sent exactly once.
//! Application-level rejections are surfaced immediately, except where a
//! retry is refused because an earlier attempt already went through.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::{
    error::{GatewayError, GatewayResult, Rejection},
    retry::RetryPolicy,
};
use crate::{
    api::books::{BookActionResponse, CreatedBook, MessageResponse},
    config::ClientConfig,
    error::ErrorResponse,
    models::book::{Book, BookStatus, CreateBook, IssueBook, ReserveBook},
};

pub struct BookGateway {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl BookGateway {
    /// Build a gateway from client settings
    pub fn new(config: &ClientConfig) -> GatewayResult<Self> {
        Self::with_policy(
            &config.base_url,
            Duration::from_millis(config.timeout_ms),
            RetryPolicy::from(config),
        )
    }

    /// Build a gateway with an explicit timeout and retry policy
    pub fn with_policy(base_url: &str, timeout: Duration, retry: RetryPolicy) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub async fn list_books(&self) -> GatewayResult<Vec<Book>> {
        let url = format!("{}/books", self.base_url);
        self.send(|client| client.get(&url), true).await
    }

    /// Add a book and return its id. Never retried, a replay could add it twice.
    pub async fn add_book(&self, title: &str, author: &str) -> GatewayResult<i32> {
        let url = format!("{}/books", self.base_url);
        let body = CreateBook {
            title: title.to_string(),
            author: author.to_string(),
        };
        let created: CreatedBook = self.send(|client| client.post(&url).json(&body), false).await?;
        Ok(created.id)
    }

    pub async fn get_book(&self, id: i32) -> GatewayResult<Book> {
        let url = format!("{}/books/{}", self.base_url, id);
        self.send(|client| client.get(&url), true).await
    }

    pub async fn issue_book(&self, id: i32, name: Option<&str>) -> GatewayResult<Book> {
        let url = format!("{}/books/issue/{}", self.base_url, id);
        let body = IssueBook {
            name: name.map(str::to_string),
        };
        self.transition(
            id,
            |client| client.put(&url).json(&body),
            Rejection::NotAvailable,
            |book| book.status == BookStatus::Issued,
        )
        .await
    }

    pub async fn return_book(&self, id: i32) -> GatewayResult<Book> {
        let url = format!("{}/books/return/{}", self.base_url, id);
        self.transition(
            id,
            |client| client.put(&url),
            Rejection::NotIssued,
            |book| book.status == BookStatus::Available,
        )
        .await
    }

    pub async fn reserve_book(&self, id: i32, name: &str) -> GatewayResult<Book> {
        let url = format!("{}/books/reserve/{}", self.base_url, id);
        let body = ReserveBook {
            name: name.to_string(),
        };
        self.transition(
            id,
            |client| client.put(&url).json(&body),
            Rejection::NotAvailable,
            |book| {
                book.status == BookStatus::Reserved && book.reserved_by.as_deref() == Some(name.trim())
            },
        )
        .await
    }

    pub async fn delete_book(&self, id: i32) -> GatewayResult<()> {
        let url = format!("{}/books/{}", self.base_url, id);
        let (result, attempts) = self
            .send_counted::<MessageResponse, _>(|client| client.delete(&url), true)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if attempts > 1 && error.rejection() == Some(Rejection::NotFound) => {
                tracing::info!(book_id = id, "Retried delete had already been applied");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Send a lending transition.
    ///
    /// A lost response can hide an attempt that was applied. When a retry is
    /// then refused with `settled_by`, the book is re-read and the call
    /// succeeds if the book is already where the transition would put it.
    async fn transition<F, R>(
        &self,
        id: i32,
        build: F,
        settled_by: Rejection,
        reached: R,
    ) -> GatewayResult<Book>
    where
        F: Fn(&Client) -> RequestBuilder,
        R: Fn(&Book) -> bool,
    {
        let (result, attempts) = self.send_counted::<BookActionResponse, _>(build, true).await;

        match result {
            Ok(response) => Ok(response.book),
            Err(error) if attempts > 1 && error.rejection() == Some(settled_by) => {
                match self.get_book(id).await {
                    Ok(book) if reached(&book) => {
                        tracing::info!(book_id = id, "Retried transition had already been applied");
                        Ok(book)
                    }
                    _ => Err(error),
                }
            }
            Err(error) => Err(error),
        }
    }

    async fn send<T, F>(&self, build: F, retryable: bool) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        self.send_counted(build, retryable).await.0
    }

    /// Like `send`, also reporting how many attempts were made
    async fn send_counted<T, F>(&self, build: F, retryable: bool) -> (GatewayResult<T>, u32)
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let attempts = self.retry.attempts(retryable);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match send_once(build(&self.client)).await {
                Err(error) if error.is_transient() && attempt < attempts => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(attempt, ?delay, %error, "Transient gateway failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                result => return (result, attempt),
            }
        }
    }
}

async fn send_once<T: DeserializeOwned>(request: RequestBuilder) -> GatewayResult<T> {
    let response = request.send().await.map_err(map_transport_error)?;
    let status = response.status();
    let body = response.bytes().await.map_err(map_transport_error)?;

    if !status.is_success() {
        return Err(map_status_error(status, &body));
    }

    serde_json::from_slice(&body).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn map_transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Transient(format!("request timed out: {}", error))
    } else {
        GatewayError::Transient(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> GatewayError {
    let parsed = serde_json::from_slice::<ErrorResponse>(body).ok();

    if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_MANY_REQUESTS
        )
    {
        let detail = parsed
            .map(|e| e.message)
            .unwrap_or_else(|| status.to_string());
        return GatewayError::Transient(format!("status {}: {}", status.as_u16(), detail));
    }

    match parsed {
        Some(error) => GatewayError::rejected(Rejection::from_kind(&error.error), error.message),
        None if status == StatusCode::NOT_FOUND => {
            GatewayError::rejected(Rejection::NotFound, "Resource not found")
        }
        None => GatewayError::rejected(
            Rejection::Other,
            format!("status {}: {}", status.as_u16(), body_preview(body)),
        ),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let text = String::from_utf8_lossy(body);
    let preview: String = text.chars().take(PREVIEW_CHAR_LIMIT).collect();
    if text.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{}...", preview)
    } else {
        preview
    }
}
