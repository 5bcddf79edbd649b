//! Error types for descriptor construction.

use procgrid_model::LifecycleKind;
use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors that can occur while translating a process for the orchestrator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("no image reference for {0}")]
    MissingImage(String),

    #[error("no droplet for {0}")]
    MissingDroplet(String),

    #[error("package not ready for staging: {0}")]
    PackageNotReady(String),

    #[error("{} package is incompatible with {} application", .package.as_str(), .app.as_str())]
    LifecycleMismatch { app: LifecycleKind, package: LifecycleKind },
}
