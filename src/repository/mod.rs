//! Book Store: persistence of book records

pub mod books;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::book::{Book, StatusChange},
};

pub use books::PgBookStore;
pub use memory::MemoryBookStore;

/// Storage contract for book records.
///
/// `apply` is a compare-and-swap: the change is written only if the record is
/// still in the state the change was planned against, in a single atomic step.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Insert a new available book and return it with its assigned id
    async fn create(&self, title: &str, author: &str) -> AppResult<Book>;

    /// All books, ordered by id
    async fn get_all(&self) -> AppResult<Vec<Book>>;

    /// Get book by ID, failing with `NotFound`
    async fn get(&self, id: i32) -> AppResult<Book>;

    /// Apply a status change. `Ok(None)` means the guard no longer holds;
    /// a missing record fails with `NotFound`.
    async fn apply(&self, id: i32, change: &StatusChange) -> AppResult<Option<Book>>;

    /// Remove a book; `false` when there was nothing to remove
    async fn delete(&self, id: i32) -> AppResult<bool>;

    /// Check that the backing storage is reachable
    async fn ping(&self) -> AppResult<()>;
}

/// Main repository struct holding the configured book store
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
}

impl Repository {
    /// Create a new repository over the given store
    pub fn new(books: Arc<dyn BookStore>) -> Self {
        Self { books }
    }

    /// Repository backed by process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBookStore::new()))
    }
}
