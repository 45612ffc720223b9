//! Repository Module
//!
//! Provides data access over the SQLite pool. Conditional updates report
//! via `rows_affected`, which is the storage layer's compare-and-swap
//! primitive — no read-modify-write in application code.

pub mod inventory;
pub mod order;
pub mod product;
pub mod user;

pub use inventory::InventoryLedger;
pub use order::OrderRepository;
pub use product::ProductRepository;
pub use user::UserRepository;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
