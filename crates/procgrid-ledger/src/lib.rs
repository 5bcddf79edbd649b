//! procgrid-ledger — async in-memory process records.
//!
//! The ledger is the concurrency boundary around the pure resolver: saves
//! are serialized per process and gated by the quota chain, versions are
//! bumped on restart-worthy changes, and billable transitions land in a
//! usage event log.

pub mod error;
pub mod ledger;
pub mod tenancy;

pub use error::{LedgerError, LedgerResult};
pub use ledger::ProcessLedger;
pub use tenancy::{Organization, Space};
