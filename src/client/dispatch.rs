//! Background execution of gateway calls for a presentation layer.
//!
//! A UI thread builds a [`BookCommand`] from raw user input and submits it;
//! the call runs on the tokio runtime with at most `workers` requests in
//! flight, and its [`Outcome`] is delivered over a channel the UI drains on
//! its own update path. A successful command is followed by a list refresh
//! whose result is reported separately, so a failed refresh never turns an
//! applied command into a reported failure.

use std::sync::Arc;

use tokio::{
    runtime::Handle,
    sync::{mpsc, Semaphore},
    task::JoinHandle,
};

use super::{
    error::{GatewayError, GatewayResult, Rejection},
    gateway::BookGateway,
};
use crate::models::book::Book;

/// A user-initiated operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookCommand {
    Refresh,
    Add { title: String, author: String },
    Issue { id: i32, name: Option<String> },
    Return { id: i32 },
    Reserve { id: i32, name: String },
    Delete { id: i32 },
}

impl BookCommand {
    pub fn add(title: &str, author: &str) -> GatewayResult<Self> {
        Ok(BookCommand::Add {
            title: required("Title", title)?,
            author: required("Author", author)?,
        })
    }

    /// A blank name issues without a reservation check
    pub fn issue(id: &str, name: &str) -> GatewayResult<Self> {
        let name = name.trim();
        Ok(BookCommand::Issue {
            id: parse_id(id)?,
            name: (!name.is_empty()).then(|| name.to_string()),
        })
    }

    pub fn return_book(id: &str) -> GatewayResult<Self> {
        Ok(BookCommand::Return { id: parse_id(id)? })
    }

    pub fn reserve(id: &str, name: &str) -> GatewayResult<Self> {
        Ok(BookCommand::Reserve {
            id: parse_id(id)?,
            name: required("Name", name)?,
        })
    }

    pub fn delete(id: &str) -> GatewayResult<Self> {
        Ok(BookCommand::Delete { id: parse_id(id)? })
    }

    /// Verb used in user-facing messages
    pub fn action(&self) -> &'static str {
        match self {
            BookCommand::Refresh => "load books",
            BookCommand::Add { .. } => "add book",
            BookCommand::Issue { .. } => "issue book",
            BookCommand::Return { .. } => "return book",
            BookCommand::Reserve { .. } => "reserve book",
            BookCommand::Delete { .. } => "delete book",
        }
    }
}

fn required(field: &str, value: &str) -> GatewayResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(GatewayError::rejected(
            Rejection::InvalidInput,
            format!("{} is required", field),
        ));
    }
    Ok(value.to_string())
}

fn parse_id(raw: &str) -> GatewayResult<i32> {
    raw.trim().parse().map_err(|_| {
        GatewayError::rejected(
            Rejection::InvalidInput,
            format!("Book ID must be a number, got '{}'", raw.trim()),
        )
    })
}

/// Result of one submitted command
#[derive(Debug, Clone)]
pub struct Outcome {
    pub command: BookCommand,
    pub result: GatewayResult<()>,
    /// Book list fetched after the command succeeded, `None` if it failed
    pub books: Option<GatewayResult<Vec<Book>>>,
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Dispatcher {
    gateway: Arc<BookGateway>,
    permits: Arc<Semaphore>,
    outcomes: mpsc::UnboundedSender<Outcome>,
    runtime: Handle,
}

impl Dispatcher {
    /// Create a dispatcher running at most `workers` calls at once on `runtime`
    pub fn new(
        gateway: BookGateway,
        workers: usize,
        runtime: Handle,
    ) -> (Self, mpsc::UnboundedReceiver<Outcome>) {
        let (outcomes, receiver) = mpsc::unbounded_channel();
        let dispatcher = Self {
            gateway: Arc::new(gateway),
            permits: Arc::new(Semaphore::new(workers.max(1))),
            outcomes,
            runtime,
        };
        (dispatcher, receiver)
    }

    /// Queue a command; callable from threads outside the runtime
    pub fn submit(&self, command: BookCommand) -> JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        let permits = Arc::clone(&self.permits);
        let outcomes = self.outcomes.clone();

        self.runtime.spawn(async move {
            let (result, books) = match permits.acquire_owned().await {
                Ok(_permit) => run(&gateway, &command).await,
                Err(_) => (
                    Err(GatewayError::Setup("dispatcher is shut down".to_string())),
                    None,
                ),
            };

            if let Err(error) = &result {
                tracing::debug!(action = command.action(), %error, "Book command failed");
            }
            if let Some(Err(error)) = &books {
                tracing::warn!(action = command.action(), %error, "Book list refresh failed");
            }
            // A closed channel means the presentation layer is gone
            let _ = outcomes.send(Outcome {
                command,
                result,
                books,
            });
        })
    }
}

async fn run(
    gateway: &BookGateway,
    command: &BookCommand,
) -> (GatewayResult<()>, Option<GatewayResult<Vec<Book>>>) {
    if *command == BookCommand::Refresh {
        return match gateway.list_books().await {
            Ok(books) => (Ok(()), Some(Ok(books))),
            Err(error) => (Err(error), None),
        };
    }

    match execute(gateway, command).await {
        Ok(()) => (Ok(()), Some(gateway.list_books().await)),
        Err(error) => (Err(error), None),
    }
}

async fn execute(gateway: &BookGateway, command: &BookCommand) -> GatewayResult<()> {
    match command {
        BookCommand::Refresh => {}
        BookCommand::Add { title, author } => {
            gateway.add_book(title, author).await?;
        }
        BookCommand::Issue { id, name } => {
            gateway.issue_book(*id, name.as_deref()).await?;
        }
        BookCommand::Return { id } => {
            gateway.return_book(*id).await?;
        }
        BookCommand::Reserve { id, name } => {
            gateway.reserve_book(*id, name).await?;
        }
        BookCommand::Delete { id } => {
            gateway.delete_book(*id).await?;
        }
    }
    Ok(())
}
