//! Orchestrator-facing desired-state descriptors.
//!
//! These are the only values this workspace hands to the orchestrator. They
//! are plain data and serialize to JSON as-is.

use std::collections::BTreeMap;

use procgrid_model::{HealthCheckType, LifecycleKind, RegistryCredentials, VersionToken};
use serde::{Deserialize, Serialize};

/// Kind of workload a descriptor asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    /// Desired long-running process, kept at `instances` replicas.
    LongRunning,
    /// One-shot task.
    Task,
}

/// What the container runs from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactRef {
    Image {
        image: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credentials: Option<RegistryCredentials>,
    },
    Droplet {
        guid: String,
        #[serde(default)]
        checksum: Option<String>,
        #[serde(default)]
        stack: Option<String>,
    },
}

/// Per-instance resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_mb: i64,
    pub disk_mb: i64,
    /// Bytes per second; `-1` is unlimited.
    pub log_rate_limit: i64,
    pub max_file_descriptors: u64,
}

/// Liveness or readiness probe as the orchestrator runs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    #[serde(rename = "type")]
    pub kind: HealthCheckType,
    /// Container port probed by `port` and `http` checks.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub http_endpoint: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u32>,
}

/// Everything the orchestrator needs to run one LRP or task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    pub kind: WorkloadKind,
    /// Process guid for LRPs, task guid for tasks.
    pub guid: String,
    /// Replacing running instances is signalled by a new version. Tasks have none.
    #[serde(default)]
    pub version: Option<VersionToken>,
    pub lifecycle: LifecycleKind,
    /// Absent until the app has something to run: no image reference for
    /// image apps, no droplet for buildpack apps.
    #[serde(default)]
    pub artifact: Option<ArtifactRef>,
    pub ports: Vec<u16>,
    pub run_as_user: String,
    pub start_command: String,
    #[serde(default)]
    pub entrypoint: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub instances: u32,
    pub resources: ResourceLimits,
    #[serde(default)]
    pub health_check: Option<ProbeSpec>,
    #[serde(default)]
    pub readiness_check: Option<ProbeSpec>,
}

impl DesiredState {
    pub fn image_ref(&self) -> Option<&str> {
        match self.artifact.as_ref()? {
            ArtifactRef::Image { image, .. } => Some(image),
            ArtifactRef::Droplet { .. } => None,
        }
    }

    pub fn is_task(&self) -> bool {
        self.kind == WorkloadKind::Task
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
