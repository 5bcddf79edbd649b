//! Read-only view over the records one process resolution needs.
//!
//! Callers load the records however they like and borrow them into a
//! [`ProcessContext`]; every derived attribute (package state, droplet,
//! ports, command, user) is computed from it on demand.

use std::collections::BTreeMap;

use procgrid_model::{
    Application, Build, Droplet, ExecutionMetadata, LifecycleKind, Package, Process, ResolverConfig, Revision,
    RouteMapping, StagingError,
};
use serde::{Deserialize, Serialize};

use crate::classifier::{self, PackageState};
use crate::ports;

/// Borrowed snapshot of a process and everything it depends on.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    pub process: &'a Process,
    pub app: &'a Application,
    pub packages: &'a [Package],
    pub builds: &'a [Build],
    pub droplets: &'a [Droplet],
    pub revision: Option<&'a Revision>,
    pub route_mappings: &'a [RouteMapping],
}

impl<'a> ProcessContext<'a> {
    pub fn new(process: &'a Process, app: &'a Application) -> Self {
        Self {
            process,
            app,
            packages: &[],
            builds: &[],
            droplets: &[],
            revision: None,
            route_mappings: &[],
        }
    }

    pub fn lifecycle_kind(&self) -> LifecycleKind {
        self.app.lifecycle.kind()
    }

    // ── Build pipeline ────────────────────────────────────────────

    /// Most recently created package of the app.
    pub fn latest_package(&self) -> Option<&'a Package> {
        self.packages
            .iter()
            .filter(|p| p.app_guid == self.app.guid)
            .max_by_key(|p| p.created_at)
    }

    pub fn package_state(&self) -> PackageState {
        classifier::classify(self.latest_package(), self.builds)
    }

    pub fn is_staged(&self) -> bool {
        self.package_state() == PackageState::Staged
    }

    pub fn needs_staging(&self) -> bool {
        classifier::needs_staging(self.process, self.latest_package(), self.package_state())
    }

    pub fn staging_failure(&self) -> Option<&'a StagingError> {
        classifier::staging_failure(self.builds, self.droplets)
    }

    pub fn staging_task_id(&self) -> Option<&'a str> {
        classifier::staging_task_id(self.builds, self.droplets)
    }

    // ── Droplets ──────────────────────────────────────────────────

    /// The app's current droplet.
    pub fn desired_droplet(&self) -> Option<&'a Droplet> {
        let guid = self.app.droplet_guid.as_deref()?;
        self.droplet(guid)
    }

    /// The droplet running instances use: the revision's when revisions are
    /// in effect, otherwise the app's current one.
    pub fn actual_droplet(&self) -> Option<&'a Droplet> {
        match self.effective_revision() {
            Some(revision) => self.droplet(&revision.droplet_guid),
            None => self.desired_droplet(),
        }
    }

    fn droplet(&self, guid: &str) -> Option<&'a Droplet> {
        self.droplets.iter().find(|d| d.guid == guid)
    }

    fn effective_revision(&self) -> Option<&'a Revision> {
        self.revision.filter(|_| self.app.revisions_enabled)
    }

    /// Parsed execution metadata of the desired droplet. Never fails.
    pub fn execution_metadata(&self) -> ExecutionMetadata {
        ExecutionMetadata::parse(self.desired_droplet().and_then(|d| d.execution_metadata.as_deref()))
    }

    /// TCP ports the image declares. Empty for buildpack apps and until the
    /// current package is staged into a droplet.
    pub fn image_exposed_ports(&self) -> Vec<u16> {
        if self.lifecycle_kind() != LifecycleKind::Image || !self.is_staged() || self.desired_droplet().is_none() {
            return Vec::new();
        }
        self.execution_metadata().tcp_ports()
    }

    // ── Ports ─────────────────────────────────────────────────────

    /// Route mappings that target this process's type.
    pub fn route_mappings_for_process(&self) -> Vec<RouteMapping> {
        self.route_mappings
            .iter()
            .filter(|m| m.app_guid == self.app.guid && m.process_type == self.process.process_type)
            .cloned()
            .collect()
    }

    pub fn open_ports(&self) -> Vec<u16> {
        ports::open_ports(
            self.process,
            self.lifecycle_kind(),
            &self.image_exposed_ports(),
            &self.route_mappings_for_process(),
        )
    }

    pub fn resolved_ports(&self) -> Option<Vec<u16>> {
        ports::resolve_ports(
            self.process,
            self.lifecycle_kind(),
            &self.image_exposed_ports(),
            &self.route_mappings_for_process(),
        )
    }

    // ── Runtime attributes ────────────────────────────────────────

    /// Environment running instances receive.
    pub fn environment(&self) -> &'a BTreeMap<String, String> {
        match self.effective_revision() {
            Some(revision) => &revision.environment,
            None => &self.app.environment,
        }
    }

    /// Start command the build detected for this process type, or `""`.
    pub fn detected_start_command(&self) -> &'a str {
        self.desired_droplet()
            .and_then(|d| d.process_types.get(&self.process.process_type))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn specified_or_detected_command(&self) -> &'a str {
        match self.process.command.as_deref() {
            Some(command) if !command.is_empty() => command,
            _ => self.detected_start_command(),
        }
    }

    /// User the container's run action executes as.
    ///
    /// An explicit process user always wins. Image processes then fall back
    /// to the image's declared user and finally the configured image user.
    pub fn run_action_user(&self, config: &ResolverConfig) -> String {
        if let Some(user) = self.process.user.as_deref().filter(|u| !u.is_empty()) {
            return user.to_string();
        }
        match self.lifecycle_kind() {
            LifecycleKind::Image => self
                .execution_metadata()
                .user
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| config.default_image_user.clone()),
            LifecycleKind::Buildpack => config.default_process_user.clone(),
        }
    }
}

/// Owned counterpart of [`ProcessContext`], loadable from a JSON fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub process: Process,
    pub app: Application,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub builds: Vec<Build>,
    #[serde(default)]
    pub droplets: Vec<Droplet>,
    #[serde(default)]
    pub revision: Option<Revision>,
    #[serde(default)]
    pub route_mappings: Vec<RouteMapping>,
    #[serde(default)]
    pub organization: Option<procgrid_model::QuotaScope>,
    #[serde(default)]
    pub space: Option<procgrid_model::QuotaScope>,
}

impl ProcessSnapshot {
    pub fn context(&self) -> ProcessContext<'_> {
        ProcessContext {
            process: &self.process,
            app: &self.app,
            packages: &self.packages,
            builds: &self.builds,
            droplets: &self.droplets,
            revision: self.revision.as_ref(),
            route_mappings: &self.route_mappings,
        }
    }
}
