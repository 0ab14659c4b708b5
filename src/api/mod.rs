//! API handlers and routing for the Libris REST endpoints

pub mod books;
pub mod extract;
pub mod health;
pub mod openapi;

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/:id", get(books::get_book).delete(books::delete_book))
        .route("/books/issue/:id", put(books::issue_book))
        .route("/books/return/:id", put(books::return_book))
        .route("/books/reserve/:id", put(books::reserve_book))
        .merge(openapi::create_openapi_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
