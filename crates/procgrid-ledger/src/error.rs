//! Ledger error types.

use procgrid_resolver::ValidationErrors;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("process not found: {0}")]
    ProcessNotFound(String),

    #[error("process already exists: {0}")]
    ProcessExists(String),

    #[error("app not found: {0}")]
    AppNotFound(String),

    #[error("space not found: {0}")]
    SpaceNotFound(String),

    #[error("organization not found: {0}")]
    OrganizationNotFound(String),

    #[error("{0} cannot be changed after creation")]
    Immutable(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
