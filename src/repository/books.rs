//! Postgres-backed book store

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::BookStore;
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookStatus, StatusChange},
};

#[derive(Clone)]
pub struct PgBookStore {
    pool: Pool<Postgres>,
}

impl PgBookStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn create(&self, title: &str, author: &str) -> AppResult<Book> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, status)
            VALUES ($1, $2, $3)
            RETURNING id, title, author, status, issued_date, reserved_by
            "#,
        )
        .bind(title)
        .bind(author)
        .bind(BookStatus::Available.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(book)
    }

    async fn get_all(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT id, title, author, status, issued_date, reserved_by FROM books ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn get(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            "SELECT id, title, author, status, issued_date, reserved_by FROM books WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    async fn apply(&self, id: i32, change: &StatusChange) -> AppResult<Option<Book>> {
        // The WHERE clause re-checks the guard inside the UPDATE itself, so two
        // writers planned against the same state cannot both succeed.
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET status = $1, issued_date = $2, reserved_by = $3
            WHERE id = $4
              AND status = $5
              AND reserved_by IS NOT DISTINCT FROM $6
            RETURNING id, title, author, status, issued_date, reserved_by
            "#,
        )
        .bind(change.status.as_str())
        .bind(change.issued_date)
        .bind(&change.reserved_by)
        .bind(id)
        .bind(change.expected.status.as_str())
        .bind(&change.expected.reserved_by)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(book) => Ok(Some(book)),
            None if self.exists(id).await? => Ok(None),
            None => Err(AppError::NotFound(format!("Book {} not found", id))),
        }
    }

    async fn delete(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
