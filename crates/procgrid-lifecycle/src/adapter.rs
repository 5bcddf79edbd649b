//! Translation of resolved process state into desired-state descriptors.
//!
//! Both workload kinds share one shape; the lifecycle variant decides where
//! the artifact, start command, and default user come from:
//!
//! ```text
//!               artifact                         command                 default user
//! image      package image | droplet receipt    explicit | ""           image user | default_image_user
//! buildpack  actual droplet                     explicit | detected     default_process_user
//! ```
//!
//! An LRP whose app has nothing to run yet still gets a descriptor, with no
//! artifact. Tasks need a droplet and fail without one.

use std::collections::BTreeMap;

use procgrid_model::{
    Droplet, ExecutionMetadata, HealthCheck, HealthCheckType, Lifecycle, Package, ResolverConfig,
};
use procgrid_resolver::ProcessContext;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::{ArtifactRef, DesiredState, ProbeSpec, ResourceLimits, WorkloadKind};
use crate::error::{LifecycleError, LifecycleResult};

/// Environment variable carrying the primary container port.
pub const PORT_ENV: &str = "PORT";

/// A one-shot command to run against an app's droplet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub guid: String,
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub user: Option<String>,
    pub memory_mb: i64,
    pub disk_mb: i64,
    #[serde(default = "unlimited_log_rate")]
    pub log_rate_limit: i64,
    /// Droplet to run; the app's current droplet when unset.
    #[serde(default)]
    pub droplet_guid: Option<String>,
}

fn unlimited_log_rate() -> i64 {
    procgrid_model::UNLIMITED
}

/// Desired LRP for the process in `ctx`.
pub fn build_desired_state(ctx: &ProcessContext<'_>, config: &ResolverConfig) -> LifecycleResult<DesiredState> {
    let process = ctx.process;
    let ports = ctx.open_ports();

    let (artifact, start_command, entrypoint) = match &ctx.app.lifecycle {
        Lifecycle::Image => {
            let package = ctx.latest_package();
            let image = package
                .and_then(Package::image)
                .map(str::to_string)
                .or_else(|| ctx.actual_droplet().and_then(|d| d.image_receipt.clone()))
                .filter(|i| !i.is_empty());
            let credentials = package.and_then(Package::credentials).cloned();
            let command = process.command.clone().unwrap_or_default();
            (
                image.map(|image| ArtifactRef::Image { image, credentials }),
                command,
                ctx.execution_metadata().entrypoint,
            )
        }
        Lifecycle::Buildpack { stack, .. } => (
            ctx.actual_droplet()
                .map(|droplet| droplet_artifact(droplet, stack.as_deref())),
            ctx.specified_or_detected_command().to_string(),
            Vec::new(),
        ),
    };
    if artifact.is_none() {
        debug!(process = %process.guid, "no artifact to run yet");
    }

    let mut env = ctx.environment().clone();
    if let Some(port) = ports.first() {
        env.insert(PORT_ENV.to_string(), port.to_string());
    }

    let descriptor = DesiredState {
        kind: WorkloadKind::LongRunning,
        guid: process.guid.clone(),
        version: Some(process.version),
        lifecycle: ctx.lifecycle_kind(),
        artifact,
        run_as_user: ctx.run_action_user(config),
        start_command,
        entrypoint,
        env,
        instances: process.desired_instances(),
        resources: ResourceLimits {
            memory_mb: process.memory_mb,
            disk_mb: process.disk_mb,
            log_rate_limit: process.log_rate_limit,
            max_file_descriptors: config.instance_file_descriptor_limit,
        },
        health_check: health_probe(&process.health_check, &ports),
        readiness_check: readiness_probe(&process.readiness_check, &ports),
        ports,
    };

    debug!(
        process = %descriptor.guid,
        version = ?descriptor.version.map(|v| v.to_string()),
        lifecycle = descriptor.lifecycle.as_str(),
        ports = ?descriptor.ports,
        user = %descriptor.run_as_user,
        "built desired lrp"
    );
    Ok(descriptor)
}

/// Desired task for `task`, run against the app in `ctx`.
pub fn build_task_state(
    task: &TaskSpec,
    ctx: &ProcessContext<'_>,
    config: &ResolverConfig,
) -> LifecycleResult<DesiredState> {
    let droplet = match task.droplet_guid.as_deref() {
        Some(guid) => ctx.droplets.iter().find(|d| d.guid == guid),
        None => ctx.desired_droplet(),
    }
    .ok_or_else(|| LifecycleError::MissingDroplet(task.guid.clone()))?;

    let explicit_user = task.user.clone().filter(|u| !u.is_empty());
    let (artifact, run_as_user) = match &ctx.app.lifecycle {
        Lifecycle::Image => {
            let image = droplet
                .image_receipt
                .clone()
                .filter(|i| !i.is_empty())
                .ok_or_else(|| LifecycleError::MissingImage(task.guid.clone()))?;
            let user = explicit_user.unwrap_or_else(|| {
                ExecutionMetadata::parse(droplet.execution_metadata.as_deref())
                    .user
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| config.default_image_user.clone())
            });
            (Some(ArtifactRef::Image { image, credentials: None }), user)
        }
        Lifecycle::Buildpack { stack, .. } => (
            Some(droplet_artifact(droplet, stack.as_deref())),
            explicit_user.unwrap_or_else(|| config.default_process_user.clone()),
        ),
    };

    debug!(task = %task.guid, droplet = %droplet.guid, user = %run_as_user, "built desired task");

    Ok(DesiredState {
        kind: WorkloadKind::Task,
        guid: task.guid.clone(),
        version: None,
        lifecycle: ctx.lifecycle_kind(),
        artifact,
        ports: Vec::new(),
        run_as_user,
        start_command: task.command.clone(),
        entrypoint: Vec::new(),
        env: ctx.environment().clone(),
        instances: 1,
        resources: ResourceLimits {
            memory_mb: task.memory_mb,
            disk_mb: task.disk_mb,
            log_rate_limit: task.log_rate_limit,
            max_file_descriptors: config.instance_file_descriptor_limit,
        },
        health_check: None,
        readiness_check: None,
    })
}

fn droplet_artifact(droplet: &Droplet, stack: Option<&str>) -> ArtifactRef {
    ArtifactRef::Droplet {
        guid: droplet.guid.clone(),
        checksum: droplet.checksum.clone(),
        stack: stack.map(str::to_string),
    }
}

fn health_probe(check: &HealthCheck, ports: &[u16]) -> Option<ProbeSpec> {
    if check.kind == HealthCheckType::None {
        return None;
    }
    Some(probe(check, ports))
}

/// A `process` readiness check means "ready once running"; no probe is sent.
fn readiness_probe(check: &HealthCheck, ports: &[u16]) -> Option<ProbeSpec> {
    match check.kind {
        HealthCheckType::None | HealthCheckType::Process => None,
        HealthCheckType::Port | HealthCheckType::Http => Some(probe(check, ports)),
    }
}

fn probe(check: &HealthCheck, ports: &[u16]) -> ProbeSpec {
    let uses_port = matches!(check.kind, HealthCheckType::Port | HealthCheckType::Http);
    ProbeSpec {
        kind: check.kind,
        port: if uses_port { ports.first().copied() } else { None },
        http_endpoint: if check.kind == HealthCheckType::Http {
            check.http_endpoint.clone()
        } else {
            None
        },
        timeout_secs: check.timeout_secs,
    }
}

/// Environment overrides for a descriptor, sorted by name.
pub fn env_overrides(descriptor: &DesiredState) -> BTreeMap<&str, &str> {
    descriptor
        .env
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}
