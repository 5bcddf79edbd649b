//! procgrid-model — record snapshots for the process desired-state resolver.
//!
//! Value types for processes, applications, packages, builds, droplets,
//! revisions, route mappings, and quota definitions, plus the tolerant
//! execution-metadata parser and the immutable [`ResolverConfig`].
//!
//! Every type is `serde`-serializable so snapshots can be loaded from JSON
//! fixtures and descriptors can be handed to the orchestrator as-is.

pub mod config;
pub mod error;
pub mod metadata;
pub mod quota;
pub mod types;

pub use config::ResolverConfig;
pub use error::{ConfigError, ConfigResult};
pub use metadata::{ExecutionMetadata, ExposedPort};
pub use quota::{QuotaDefinition, QuotaScope, ScopeKind, ScopeUsage};
pub use types::*;
