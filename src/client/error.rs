//! Client gateway errors

use thiserror::Error;

/// Application-level rejection kinds reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidInput,
    NotFound,
    NotAvailable,
    NotIssued,
    NameMismatch,
    Other,
}

impl Rejection {
    /// Map the `error` field of a server error body
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "InvalidInput" => Rejection::InvalidInput,
            "NotFound" => Rejection::NotFound,
            "NotAvailable" => Rejection::NotAvailable,
            "NotIssued" => Rejection::NotIssued,
            "NameMismatch" => Rejection::NameMismatch,
            _ => Rejection::Other,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The server understood the request and refused it
    #[error("{message}")]
    Rejected { kind: Rejection, message: String },

    /// Network failure, timeout or server-side error; worth retrying
    #[error("Server unavailable: {0}")]
    Transient(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Client setup failed: {0}")]
    Setup(String),
}

impl GatewayError {
    pub fn rejected(kind: Rejection, message: impl Into<String>) -> Self {
        GatewayError::Rejected {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            GatewayError::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
