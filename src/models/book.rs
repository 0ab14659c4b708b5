//! Book model and the lending state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{postgres::PgTypeInfo, Decode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Lending status of a book
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Available,
    Issued,
    Reserved,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Issued => "issued",
            BookStatus::Reserved => "reserved",
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(BookStatus::Available),
            "issued" => Ok(BookStatus::Issued),
            "reserved" => Ok(BookStatus::Reserved),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

// SQLx conversion: status is stored as text
impl sqlx::Type<Postgres> for BookStatus {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for BookStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

/// Book record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub status: BookStatus,
    /// Set while the book is issued
    pub issued_date: Option<DateTime<Utc>>,
    /// Name the book is held for while reserved
    pub reserved_by: Option<String>,
}

impl Book {
    /// Whether the status-dependent fields agree with the status
    pub fn is_consistent(&self) -> bool {
        (self.status == BookStatus::Issued) == self.issued_date.is_some()
            && (self.status == BookStatus::Reserved) == self.reserved_by.is_some()
    }

    /// Plan handing the book out.
    ///
    /// An available book is issued to anyone; a reserved book only to the
    /// name it is reserved for.
    pub fn plan_issue(&self, name: Option<&str>, now: DateTime<Utc>) -> AppResult<StatusChange> {
        match self.status {
            BookStatus::Available => {}
            BookStatus::Reserved => {
                let name = name.map(str::trim).unwrap_or_default();
                if self.reserved_by.as_deref() != Some(name) {
                    return Err(AppError::NameMismatch(format!(
                        "Book {} is reserved for another name",
                        self.id
                    )));
                }
            }
            BookStatus::Issued => {
                return Err(AppError::NotAvailable(format!(
                    "Book {} is already issued",
                    self.id
                )));
            }
        }

        Ok(StatusChange {
            expected: self.guard(),
            status: BookStatus::Issued,
            issued_date: Some(now),
            reserved_by: None,
        })
    }

    /// Plan taking the book back into circulation
    pub fn plan_return(&self) -> AppResult<StatusChange> {
        if self.status != BookStatus::Issued {
            return Err(AppError::NotIssued(format!(
                "Book {} is not issued (status: {})",
                self.id, self.status
            )));
        }

        Ok(StatusChange {
            expected: self.guard(),
            status: BookStatus::Available,
            issued_date: None,
            reserved_by: None,
        })
    }

    /// Plan holding the book for `name`, which must already be trimmed and non-empty
    pub fn plan_reserve(&self, name: &str) -> AppResult<StatusChange> {
        if self.status != BookStatus::Available {
            return Err(AppError::NotAvailable(format!(
                "Book {} cannot be reserved (status: {})",
                self.id, self.status
            )));
        }

        Ok(StatusChange {
            expected: self.guard(),
            status: BookStatus::Reserved,
            issued_date: None,
            reserved_by: Some(name.to_string()),
        })
    }

    fn guard(&self) -> Guard {
        Guard {
            status: self.status,
            reserved_by: self.reserved_by.clone(),
        }
    }
}

/// State a record must still be in for a planned change to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub status: BookStatus,
    pub reserved_by: Option<String>,
}

/// A compare-and-swap on the status fields of one book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub expected: Guard,
    pub status: BookStatus,
    pub issued_date: Option<DateTime<Utc>>,
    pub reserved_by: Option<String>,
}

impl StatusChange {
    /// Whether `book` is still in the state this change was planned against
    pub fn matches(&self, book: &Book) -> bool {
        book.status == self.expected.status && book.reserved_by == self.expected.reserved_by
    }

    pub fn apply_to(&self, book: &mut Book) {
        book.status = self.status;
        book.issued_date = self.issued_date;
        book.reserved_by = self.reserved_by.clone();
    }
}

// Request text is trimmed as it is read, so length limits apply to what is stored
fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(String::deserialize(deserializer)?.trim().to_string())
}

fn trimmed_option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(|value| value.trim().to_string()))
}

/// Create book request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 120, message = "Title is too long"))]
    pub title: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 120, message = "Author is too long"))]
    pub author: String,
}

/// Issue book request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct IssueBook {
    /// Required when the book is reserved; must match the reservation
    #[serde(
        default,
        deserialize_with = "trimmed_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(length(max = 120, message = "Name is too long"))]
    pub name: Option<String>,
}

/// Reserve book request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReserveBook {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 120, message = "Name is too long"))]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(status: BookStatus) -> Book {
        Book {
            id: 7,
            title: "Dune".into(),
            author: "Herbert".into(),
            status,
            issued_date: (status == BookStatus::Issued).then(Utc::now),
            reserved_by: (status == BookStatus::Reserved).then(|| "Alice".to_string()),
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [BookStatus::Available, BookStatus::Issued, BookStatus::Reserved] {
            assert_eq!(status.as_str().parse::<BookStatus>(), Ok(status));
        }
        assert!("lost".parse::<BookStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&BookStatus::Reserved).unwrap(),
            "\"reserved\""
        );
    }

    #[test]
    fn issue_available_ignores_name() {
        let now = Utc::now();
        let change = book(BookStatus::Available).plan_issue(Some("Bob"), now).unwrap();
        assert_eq!(change.status, BookStatus::Issued);
        assert_eq!(change.issued_date, Some(now));
        assert_eq!(change.reserved_by, None);
        assert_eq!(change.expected.status, BookStatus::Available);
    }

    #[test]
    fn issue_reserved_requires_matching_name() {
        let reserved = book(BookStatus::Reserved);
        let now = Utc::now();

        assert!(matches!(
            reserved.plan_issue(Some("Bob"), now),
            Err(AppError::NameMismatch(_))
        ));
        assert!(matches!(
            reserved.plan_issue(None, now),
            Err(AppError::NameMismatch(_))
        ));

        let change = reserved.plan_issue(Some(" Alice "), now).unwrap();
        assert_eq!(change.reserved_by, None);
        assert_eq!(change.expected.reserved_by.as_deref(), Some("Alice"));
    }

    #[test]
    fn issue_issued_is_not_available() {
        assert!(matches!(
            book(BookStatus::Issued).plan_issue(None, Utc::now()),
            Err(AppError::NotAvailable(_))
        ));
    }

    #[test]
    fn only_issued_books_can_be_returned() {
        assert!(book(BookStatus::Issued).plan_return().is_ok());
        for status in [BookStatus::Available, BookStatus::Reserved] {
            assert!(matches!(book(status).plan_return(), Err(AppError::NotIssued(_))));
        }
    }

    #[test]
    fn only_available_books_can_be_reserved() {
        let change = book(BookStatus::Available).plan_reserve("Carol").unwrap();
        assert_eq!(change.reserved_by.as_deref(), Some("Carol"));
        for status in [BookStatus::Issued, BookStatus::Reserved] {
            assert!(matches!(
                book(status).plan_reserve("Carol"),
                Err(AppError::NotAvailable(_))
            ));
        }
    }

    #[test]
    fn applied_changes_keep_the_record_consistent() {
        let now = Utc::now();
        let mut record = book(BookStatus::Available);

        let steps: [fn(&Book, DateTime<Utc>) -> AppResult<StatusChange>; 4] = [
            |b, _| b.plan_reserve("Alice"),
            |b, now| b.plan_issue(Some("Alice"), now),
            |b, _| b.plan_return(),
            |b, now| b.plan_issue(None, now),
        ];

        for step in steps {
            let change = step(&record, now).unwrap();
            assert!(change.matches(&record));
            change.apply_to(&mut record);
            assert!(record.is_consistent(), "{record:?}");
        }
        assert_eq!(record.status, BookStatus::Issued);
    }

    #[test]
    fn stale_change_no_longer_matches() {
        let mut record = book(BookStatus::Available);
        let first = record.plan_issue(None, Utc::now()).unwrap();
        let second = record.plan_reserve("Dave").unwrap();

        first.apply_to(&mut record);
        assert!(!second.matches(&record));
    }

    #[test]
    fn overlong_title_fails_validation() {
        let request = CreateBook {
            title: "x".repeat(121),
            author: "Herbert".into(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn padding_does_not_count_towards_length_limits() {
        let padded = format!("   {}   ", "x".repeat(120));
        let request: CreateBook =
            serde_json::from_value(serde_json::json!({ "title": padded, "author": " Herbert " }))
                .unwrap();
        assert_eq!(request.title.len(), 120);
        assert_eq!(request.author, "Herbert");
        assert!(request.validate().is_ok());

        let request: IssueBook =
            serde_json::from_value(serde_json::json!({ "name": "  Alice " })).unwrap();
        assert_eq!(request.name.as_deref(), Some("Alice"));
        let request: IssueBook = serde_json::from_value(serde_json::json!({ "name": null })).unwrap();
        assert_eq!(request.name, None);
    }
}
