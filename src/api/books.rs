//! Book endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::extract::{JsonBody, OptionalJsonBody};
use crate::{
    error::AppResult,
    models::book::{Book, CreateBook, IssueBook, ReserveBook},
    AppState,
};

/// Created book response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedBook {
    /// Assigned book ID
    pub id: i32,
}

/// Result of a lending transition
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookActionResponse {
    /// Status message
    pub message: String,
    /// Book as stored after the transition
    pub book: Book,
}

/// Plain status message
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// List all books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books ordered by ID", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.list().await?;
    Ok(Json(books))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.get(id).await?;
    Ok(Json(book))
}

/// Add a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = CreatedBook),
        (status = 400, description = "Missing or invalid title/author", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateBook>,
) -> AppResult<(StatusCode, Json<CreatedBook>)> {
    request.validate()?;

    let book = state
        .services
        .books
        .add(&request.title, &request.author)
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedBook { id: book.id })))
}

/// Issue a book
#[utoipa::path(
    put,
    path = "/books/issue/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    request_body(content = IssueBook, description = "Name is required for reserved books"),
    responses(
        (status = 200, description = "Book issued", body = BookActionResponse),
        (status = 400, description = "NameMismatch or NotAvailable", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn issue_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    OptionalJsonBody(request): OptionalJsonBody<IssueBook>,
) -> AppResult<Json<BookActionResponse>> {
    let request = request.unwrap_or_default();
    request.validate()?;

    let book = state
        .services
        .books
        .issue(id, request.name.as_deref())
        .await?;

    Ok(Json(BookActionResponse {
        message: "Book issued".to_string(),
        book,
    }))
}

/// Return an issued book
#[utoipa::path(
    put,
    path = "/books/return/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book returned", body = BookActionResponse),
        (status = 400, description = "NotIssued", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<BookActionResponse>> {
    let book = state.services.books.return_book(id).await?;

    Ok(Json(BookActionResponse {
        message: "Book returned".to_string(),
        book,
    }))
}

/// Reserve an available book
#[utoipa::path(
    put,
    path = "/books/reserve/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = ReserveBook,
    responses(
        (status = 200, description = "Book reserved", body = BookActionResponse),
        (status = 400, description = "InvalidInput or NotAvailable", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn reserve_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    OptionalJsonBody(request): OptionalJsonBody<ReserveBook>,
) -> AppResult<Json<BookActionResponse>> {
    let request = request.unwrap_or_default();
    request.validate()?;

    let book = state.services.books.reserve(id, &request.name).await?;

    Ok(Json(BookActionResponse {
        message: "Book reserved".to_string(),
        book,
    }))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    state.services.books.delete(id).await?;

    Ok(Json(MessageResponse {
        message: "Book deleted".to_string(),
    }))
}
