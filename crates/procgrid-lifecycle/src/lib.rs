//! procgrid-lifecycle — orchestrator descriptors for buildpack and image processes.
//!
//! Consumes a resolved [`procgrid_resolver::ProcessContext`] and produces a
//! [`DesiredState`] for either a long-running process or a one-shot task.
//! The lifecycle variant on the application selects the artifact, start
//! command, and default user; everything else is shared.

pub mod adapter;
pub mod descriptor;
pub mod error;
pub mod staging;

pub use adapter::{PORT_ENV, TaskSpec, build_desired_state, build_task_state, env_overrides};
pub use descriptor::{ArtifactRef, DesiredState, ProbeSpec, ResourceLimits, WorkloadKind};
pub use error::{LifecycleError, LifecycleResult};
pub use staging::{StagingLifecycleData, staging_lifecycle_data};
