use common::OrderId;
use thiserror::Error;

/// Errors that can occur when interacting with the checkout store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another order already carries this code.
    #[error("Duplicate order code: {0}")]
    DuplicateOrderCode(String),

    /// The backend is temporarily unable to serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back into the model.
    #[error("Corrupt row for order {order_id}: {reason}")]
    CorruptRow { order_id: OrderId, reason: String },

    /// A write would break a storage invariant (negative stock, stale status, ...).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl StoreError {
    /// Returns true when retrying the whole unit of work with fresh state may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(err) => match err {
                sqlx::Error::Database(db) => db
                    .code()
                    .is_some_and(|code| is_transient_sqlstate(&code)),
                sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::Protocol(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::WorkerCrashed => true,
                _ => false,
            },
            StoreError::DuplicateOrderCode(_) | StoreError::Unavailable(_) => true,
            StoreError::Migration(_)
            | StoreError::Serialization(_)
            | StoreError::CorruptRow { .. }
            | StoreError::InvariantViolation(_) => false,
        }
    }
}

/// Classifies a PostgreSQL SQLSTATE.
///
/// Transaction rollbacks (`40`: serialization failure, deadlock), connection
/// exceptions (`08`), insufficient resources (`53`) and operator intervention
/// (`57P`) can clear on retry. Everything else, including integrity
/// constraint violations (`23`), fails the same way every time.
pub(crate) fn is_transient_sqlstate(code: &str) -> bool {
    ["40", "08", "53", "57P"]
        .iter()
        .any(|class| code.starts_with(class))
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
