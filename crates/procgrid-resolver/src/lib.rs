//! procgrid-resolver — desired-state resolution for application processes.
//!
//! Pure functions over record snapshots from `procgrid-model`:
//!
//! - [`classifier`] derives the package phase (pending / staging / staged / failed)
//! - [`ports`] computes declared and container-facing ports
//! - [`quota`] runs the validator chain against org and space quotas
//! - [`version`] decides when a save replaces running instances
//! - [`usage`] derives billing events from process transitions
//!
//! [`ProcessContext`] ties the records of one process together so callers
//! can ask for derived attributes without re-plumbing lookups.
//!
//! # Data flow
//!
//! ```text
//! records ──► ProcessContext ──► classify ──► open_ports
//!                    │
//!   update ──► validate ──► bump_if_needed ──► usage event
//! ```
//!
//! Nothing here performs I/O or blocks.

pub mod classifier;
pub mod context;
pub mod error;
pub mod ports;
pub mod quota;
pub mod usage;
pub mod version;

pub use classifier::{PackageState, classify, needs_staging};
pub use context::{ProcessContext, ProcessSnapshot};
pub use error::{Field, FieldViolation, ValidationErrors, ValidationResult, Violation};
pub use ports::{open_ports, resolve_ports};
pub use quota::{ValidationInput, validate, validate_input};
pub use usage::{BuildpackAttribution, UsageEvent, usage_event_for_destroy, usage_event_for_update};
pub use version::{VersionPolicy, bump_if_needed};
