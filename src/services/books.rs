//! Book lifecycle service
//!
//! A book moves available -> reserved -> issued -> available (or straight from
//! available to issued). Every transition is planned against a fresh read and
//! written with a compare-and-swap, so concurrent callers racing on the same
//! record observe each other's commits instead of overwriting them.

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, StatusChange},
    repository::Repository,
};

/// Number of times a transition is re-planned after losing a race
const MAX_TRANSITION_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List all books
    pub async fn list(&self) -> AppResult<Vec<Book>> {
        self.repository.books.get_all().await
    }

    /// Get a single book
    pub async fn get(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get(id).await
    }

    /// Add a new available book
    pub async fn add(&self, title: &str, author: &str) -> AppResult<Book> {
        let title = required("title", title)?;
        let author = required("author", author)?;

        let book = self.repository.books.create(title, author).await?;
        tracing::info!(book_id = book.id, "Book added");
        Ok(book)
    }

    /// Issue a book, to the reservation holder if it is reserved
    pub async fn issue(&self, id: i32, name: Option<&str>) -> AppResult<Book> {
        let book = self
            .transition(id, |book| book.plan_issue(name, Utc::now()))
            .await?;
        tracing::info!(book_id = id, "Book issued");
        Ok(book)
    }

    /// Return an issued book
    pub async fn return_book(&self, id: i32) -> AppResult<Book> {
        let book = self.transition(id, Book::plan_return).await?;
        tracing::info!(book_id = id, "Book returned");
        Ok(book)
    }

    /// Reserve an available book for `name`
    pub async fn reserve(&self, id: i32, name: &str) -> AppResult<Book> {
        let name = required("name", name)?;

        let book = self.transition(id, |book| book.plan_reserve(name)).await?;
        tracing::info!(book_id = id, reserved_by = name, "Book reserved");
        Ok(book)
    }

    /// Delete a book whatever its status
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        if !self.repository.books.delete(id).await? {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    /// Check the book store is reachable
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.books.ping().await
    }

    async fn transition<F>(&self, id: i32, plan: F) -> AppResult<Book>
    where
        F: Fn(&Book) -> AppResult<StatusChange>,
    {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let current = self.repository.books.get(id).await?;
            let change = plan(&current)?;

            if let Some(updated) = self.repository.books.apply(id, &change).await? {
                return Ok(updated);
            }
            tracing::debug!(book_id = id, attempt, "Book changed concurrently, re-planning");
        }

        tracing::warn!(book_id = id, "Giving up on contended book transition");
        Err(AppError::Conflict(format!(
            "Book {} is being modified concurrently, try again",
            id
        )))
    }
}

fn required<'a>(field: &str, value: &'a str) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::book::BookStatus,
        repository::{MockBookStore, Repository},
    };
    use mockall::{predicate::eq, Sequence};
    use std::sync::Arc;

    fn book(status: BookStatus) -> Book {
        Book {
            id: 1,
            title: "Dune".into(),
            author: "Herbert".into(),
            status,
            issued_date: (status == BookStatus::Issued).then(Utc::now),
            reserved_by: (status == BookStatus::Reserved).then(|| "Alice".to_string()),
        }
    }

    fn service(store: MockBookStore) -> BooksService {
        BooksService::new(Repository::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn lost_race_is_replanned_against_fresh_state() {
        let mut store = MockBookStore::new();
        let mut seq = Sequence::new();

        store
            .expect_get()
            .with(eq(1))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(book(BookStatus::Available)));
        store
            .expect_apply()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        store
            .expect_get()
            .with(eq(1))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(book(BookStatus::Issued)));

        let result = service(store).issue(1, None).await;
        assert!(matches!(result, Err(AppError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn persistent_contention_ends_in_conflict() {
        let mut store = MockBookStore::new();
        store
            .expect_get()
            .times(MAX_TRANSITION_ATTEMPTS)
            .returning(|_| Ok(book(BookStatus::Available)));
        store
            .expect_apply()
            .times(MAX_TRANSITION_ATTEMPTS)
            .returning(|_, _| Ok(None));

        let result = service(store).reserve(1, "Alice").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn guard_failure_never_reaches_the_store_write() {
        let mut store = MockBookStore::new();
        store
            .expect_get()
            .returning(|_| Ok(book(BookStatus::Reserved)));
        store.expect_apply().never();

        let result = service(store).issue(1, Some("Bob")).await;
        assert!(matches!(result, Err(AppError::NameMismatch(_))));
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_storage() {
        let mut store = MockBookStore::new();
        store.expect_create().never();
        store.expect_get().never();

        let service = service(store);
        assert!(matches!(
            service.add("  ", "Herbert").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            service.add("Dune", "").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            service.reserve(1, " ").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn add_trims_before_storing() {
        let mut store = MockBookStore::new();
        store
            .expect_create()
            .withf(|title, author| title.to_string() == "Dune" && author.to_string() == "Herbert")
            .times(1)
            .returning(|title, author| {
                Ok(Book {
                    id: 1,
                    title: title.to_string(),
                    author: author.to_string(),
                    status: BookStatus::Available,
                    issued_date: None,
                    reserved_by: None,
                })
            });

        let book = tokio_test::assert_ok!(service(store).add(" Dune ", "Herbert\n").await);
        assert_eq!(book.title, "Dune");
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_not_found() {
        let mut store = MockBookStore::new();
        store.expect_delete().with(eq(9)).returning(|_| Ok(false));

        let result = service(store).delete(9).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let mut store = MockBookStore::new();
        store
            .expect_get_all()
            .returning(|| Err(AppError::Database(sqlx::Error::PoolTimedOut)));

        let result = service(store).list().await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
