//! In-process book store, used by tests and the `memory` storage backend

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::BookStore;
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookStatus, StatusChange},
};

#[derive(Default)]
struct Shelf {
    last_id: i32,
    books: BTreeMap<i32, Book>,
}

/// Book store keeping every record behind a single lock
#[derive(Default)]
pub struct MemoryBookStore {
    shelf: RwLock<Shelf>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Book {} not found", id))
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn create(&self, title: &str, author: &str) -> AppResult<Book> {
        let mut shelf = self.shelf.write().await;
        shelf.last_id = shelf
            .last_id
            .checked_add(1)
            .ok_or_else(|| AppError::Internal("Book id space exhausted".to_string()))?;

        let book = Book {
            id: shelf.last_id,
            title: title.to_string(),
            author: author.to_string(),
            status: BookStatus::Available,
            issued_date: None,
            reserved_by: None,
        };
        shelf.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn get_all(&self) -> AppResult<Vec<Book>> {
        Ok(self.shelf.read().await.books.values().cloned().collect())
    }

    async fn get(&self, id: i32) -> AppResult<Book> {
        self.shelf
            .read()
            .await
            .books
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn apply(&self, id: i32, change: &StatusChange) -> AppResult<Option<Book>> {
        let mut shelf = self.shelf.write().await;
        let book = shelf.books.get_mut(&id).ok_or_else(|| not_found(id))?;

        if !change.matches(book) {
            return Ok(None);
        }
        change.apply_to(book);
        Ok(Some(book.clone()))
    }

    async fn delete(&self, id: i32) -> AppResult<bool> {
        Ok(self.shelf.write().await.books.remove(&id).is_some())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
