//! Client-side snapshot of the book list.
//!
//! The cache is owned by whoever renders books; it is only replaced by a
//! successful fetch and never edited in place, so a failed command or refresh
//! leaves the last confirmed state on screen.

use chrono::{DateTime, Utc};

use super::{dispatch::Outcome, error::GatewayResult, gateway::BookGateway};
use crate::models::book::{Book, BookStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Id,
    Title,
    Author,
    Status,
}

#[derive(Debug, Clone, Default)]
pub struct BookCache {
    books: Vec<Book>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl BookCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// When the snapshot was last replaced, `None` before the first fetch
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn replace(&mut self, books: Vec<Book>) {
        self.books = books;
        self.refreshed_at = Some(Utc::now());
    }

    /// Fetch the current list; the snapshot is kept on failure
    pub async fn refresh(&mut self, gateway: &BookGateway) -> GatewayResult<()> {
        let books = gateway.list_books().await?;
        self.replace(books);
        Ok(())
    }

    /// Fold a dispatcher outcome into the snapshot and produce the message to
    /// show the user
    pub fn apply(&mut self, outcome: Outcome) -> Result<String, String> {
        let action = outcome.command.action();
        if let Err(error) = outcome.result {
            return Err(format!("Could not {}: {}", action, error));
        }

        match outcome.books {
            Some(Ok(books)) => {
                self.replace(books);
                Ok(format!("Done: {}", action))
            }
            Some(Err(error)) => Ok(format!(
                "Done: {} (book list not refreshed: {})",
                action, error
            )),
            None => Ok(format!("Done: {}", action)),
        }
    }

    /// Books whose title or author contains `query`, ignoring case
    pub fn filter(&self, query: &str) -> Vec<&Book> {
        let query = query.trim().to_lowercase();
        self.books
            .iter()
            .filter(|book| {
                query.is_empty()
                    || book.title.to_lowercase().contains(&query)
                    || book.author.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn with_status(&self, status: BookStatus) -> Vec<&Book> {
        self.books.iter().filter(|book| book.status == status).collect()
    }

    pub fn sorted(&self, key: SortKey) -> Vec<&Book> {
        let mut books: Vec<&Book> = self.books.iter().collect();
        match key {
            SortKey::Id => books.sort_by_key(|book| book.id),
            SortKey::Title => books.sort_by_cached_key(|book| (book.title.to_lowercase(), book.id)),
            SortKey::Author => {
                books.sort_by_cached_key(|book| (book.author.to_lowercase(), book.id))
            }
            SortKey::Status => books.sort_by_key(|book| (book.status.as_str(), book.id)),
        }
        books
    }

    /// One list row per book
    pub fn display_line(book: &Book) -> String {
        let reserved = book
            .reserved_by
            .as_deref()
            .map(|name| format!(", reserved by: {}", name))
            .unwrap_or_default();
        format!(
            "{} — {} (ID: {}, status: {}{})",
            book.title, book.author, book.id, book.status, reserved
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        dispatch::BookCommand,
        error::{GatewayError, Rejection},
    };

    fn book(id: i32, title: &str, author: &str, status: BookStatus) -> Book {
        Book {
            id,
            title: title.into(),
            author: author.into(),
            status,
            issued_date: (status == BookStatus::Issued).then(Utc::now),
            reserved_by: (status == BookStatus::Reserved).then(|| "Alice".to_string()),
        }
    }

    fn shelf() -> BookCache {
        let mut cache = BookCache::new();
        cache.replace(vec![
            book(1, "Dune", "Herbert", BookStatus::Reserved),
            book(2, "emma", "Austen", BookStatus::Available),
            book(3, "Children of Dune", "Herbert", BookStatus::Issued),
        ]);
        cache
    }

    #[test]
    fn filter_matches_title_or_author_case_insensitively() {
        let cache = shelf();
        let ids: Vec<i32> = cache.filter("dune").iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let ids: Vec<i32> = cache.filter("AUSTEN").iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2]);

        assert_eq!(cache.filter("  ").len(), 3);
    }

    #[test]
    fn sorts_and_status_filter() {
        let cache = shelf();
        let titles: Vec<&str> = cache
            .sorted(SortKey::Title)
            .iter()
            .map(|b| b.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Children of Dune", "Dune", "emma"]);

        let ids: Vec<i32> = cache.sorted(SortKey::Status).iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        assert_eq!(cache.with_status(BookStatus::Issued)[0].id, 3);
    }

    #[test]
    fn failed_outcome_keeps_the_snapshot() {
        let mut cache = shelf();
        let before = cache.refreshed_at();

        let message = cache
            .apply(Outcome {
                command: BookCommand::Issue { id: 1, name: Some("Bob".into()) },
                result: Err(GatewayError::rejected(
                    Rejection::NameMismatch,
                    "Book 1 is reserved for another name",
                )),
                books: None,
            })
            .unwrap_err();

        assert_eq!(
            message,
            "Could not issue book: Book 1 is reserved for another name"
        );
        assert_eq!(cache.books().len(), 3);
        assert_eq!(cache.refreshed_at(), before);
    }

    #[test]
    fn successful_outcome_replaces_the_snapshot() {
        let mut cache = shelf();
        let message = cache
            .apply(Outcome {
                command: BookCommand::Delete { id: 2 },
                result: Ok(()),
                books: Some(Ok(vec![book(1, "Dune", "Herbert", BookStatus::Reserved)])),
            })
            .unwrap();

        assert_eq!(message, "Done: delete book");
        assert_eq!(cache.books().len(), 1);
    }

    #[test]
    fn applied_command_with_failed_refresh_is_still_done() {
        let mut cache = shelf();
        let before = cache.refreshed_at();

        let message = cache
            .apply(Outcome {
                command: BookCommand::Issue { id: 2, name: None },
                result: Ok(()),
                books: Some(Err(GatewayError::Transient("status 503".into()))),
            })
            .unwrap();

        assert!(message.starts_with("Done: issue book"), "{message}");
        assert!(message.contains("not refreshed"));
        assert_eq!(cache.books()[1].status, BookStatus::Available);
        assert_eq!(cache.refreshed_at(), before);
    }

    #[test]
    fn display_line_mentions_reservation() {
        let cache = shelf();
        assert_eq!(
            BookCache::display_line(&cache.books()[0]),
            "Dune — Herbert (ID: 1, status: reserved, reserved by: Alice)"
        );
        assert_eq!(
            BookCache::display_line(&cache.books()[1]),
            "emma — Austen (ID: 2, status: available)"
        );
    }
}
