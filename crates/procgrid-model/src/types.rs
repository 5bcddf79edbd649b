//! Record types for processes and the artifacts they run.
//!
//! These are plain value snapshots of the persisted records. Nothing here
//! talks to a database; the resolver operates on borrowed snapshots and the
//! ledger owns copies.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ResolverConfig;

/// Unique identifier for a process.
pub type ProcessGuid = String;

/// Unique identifier for an application.
pub type AppGuid = String;

/// Unique identifier for a droplet.
pub type DropletGuid = String;

/// Unique identifier for a package.
pub type PackageGuid = String;

/// Process type that receives routes and a default port.
pub const WEB_PROCESS_TYPE: &str = "web";

/// Container port opened when nothing more specific is known.
pub const DEFAULT_PORT: u16 = 8080;

/// Route mapping `app_port` meaning "no explicit target port".
pub const NO_APP_PORT_SPECIFIED: i32 = -1;

/// Sentinel for "unlimited" log rate and quota ceilings.
pub const UNLIMITED: i64 = -1;

// ── Process ───────────────────────────────────────────────────────

/// Desired run state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    Started,
    Stopped,
}

/// Kind of liveness or readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCheckType {
    Port,
    Process,
    Http,
    None,
}

impl HealthCheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthCheckType::Port => "port",
            HealthCheckType::Process => "process",
            HealthCheckType::Http => "http",
            HealthCheckType::None => "none",
        }
    }
}

/// Probe configuration shared by health and readiness checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(rename = "type")]
    pub kind: HealthCheckType,
    /// HTTP path to probe; only meaningful for `http`.
    #[serde(default)]
    pub http_endpoint: Option<String>,
    /// Seconds to wait for the first healthy probe.
    #[serde(default)]
    pub timeout_secs: Option<u32>,
}

impl HealthCheck {
    pub fn port() -> Self {
        Self {
            kind: HealthCheckType::Port,
            http_endpoint: None,
            timeout_secs: None,
        }
    }

    pub fn process() -> Self {
        Self {
            kind: HealthCheckType::Process,
            http_endpoint: None,
            timeout_secs: None,
        }
    }

    pub fn http(endpoint: &str) -> Self {
        Self {
            kind: HealthCheckType::Http,
            http_endpoint: Some(endpoint.to_string()),
            timeout_secs: None,
        }
    }
}

/// Auxiliary flags stored alongside a process.
///
/// `console` and `debug` are first-class; anything else a client stored is
/// kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessMetadata {
    #[serde(default)]
    pub console: bool,
    #[serde(default)]
    pub debug: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Opaque token that changes whenever running instances must be replaced.
///
/// The generation increases with every bump; the nonce keeps tokens from
/// different records (or restored snapshots) from colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken {
    pub generation: u64,
    pub nonce: Uuid,
}

impl VersionToken {
    /// The token a freshly created process starts with.
    pub fn initial() -> Self {
        Self {
            generation: 1,
            nonce: Uuid::new_v4(),
        }
    }

    /// A new token strictly newer than `self`.
    pub fn next(&self) -> Self {
        Self {
            generation: self.generation + 1,
            nonce: Uuid::new_v4(),
        }
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.nonce)
    }
}

/// One runtime unit of an application ("web", "worker", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub guid: ProcessGuid,
    pub app_guid: AppGuid,
    /// Process type name.
    #[serde(rename = "type")]
    pub process_type: String,
    pub instances: i32,
    pub memory_mb: i64,
    pub disk_mb: i64,
    /// Bytes per second, or [`UNLIMITED`].
    pub log_rate_limit: i64,
    /// User-declared ports. `None` defers to the lifecycle default.
    #[serde(default)]
    pub ports: Option<Vec<u16>>,
    pub health_check: HealthCheck,
    pub readiness_check: HealthCheck,
    #[serde(default)]
    pub user: Option<String>,
    pub state: ProcessState,
    pub version: VersionToken,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub metadata: ProcessMetadata,
    #[serde(default)]
    pub revision_guid: Option<String>,
}

impl Process {
    /// Create a stopped process with configured defaults.
    pub fn new(guid: &str, app_guid: &str, process_type: &str, config: &ResolverConfig) -> Self {
        Self {
            guid: guid.to_string(),
            app_guid: app_guid.to_string(),
            process_type: process_type.to_string(),
            instances: 1,
            memory_mb: config.default_app_memory_mb,
            disk_mb: config.default_app_disk_mb,
            log_rate_limit: config.default_app_log_rate_limit,
            ports: None,
            health_check: HealthCheck::port(),
            readiness_check: HealthCheck::process(),
            user: None,
            state: ProcessState::Stopped,
            version: VersionToken::initial(),
            command: None,
            metadata: ProcessMetadata::default(),
            revision_guid: None,
        }
    }

    pub fn is_web(&self) -> bool {
        self.process_type == WEB_PROCESS_TYPE
    }

    pub fn is_started(&self) -> bool {
        self.state == ProcessState::Started
    }

    pub fn is_stopped(&self) -> bool {
        self.state == ProcessState::Stopped
    }

    /// Instances the orchestrator should run right now.
    pub fn desired_instances(&self) -> u32 {
        if self.is_started() {
            self.instances.max(0) as u32
        } else {
            0
        }
    }

    /// Memory committed across all instances, in MB. Saturates at `i64::MAX`.
    pub fn total_memory_mb(&self) -> i64 {
        i64::from(self.instances.max(0)).saturating_mul(self.memory_mb)
    }

    /// Log rate committed across all instances. Saturates at `i64::MAX`.
    pub fn total_log_rate(&self) -> i64 {
        i64::from(self.instances.max(0)).saturating_mul(self.log_rate_limit)
    }

    pub fn console(&self) -> bool {
        self.metadata.console
    }

    pub fn debug(&self) -> Option<&str> {
        self.metadata.debug.as_deref()
    }
}

// ── Application ───────────────────────────────────────────────────

/// Discriminator for the two execution models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Buildpack,
    Image,
}

impl LifecycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleKind::Buildpack => "buildpack",
            LifecycleKind::Image => "image",
        }
    }
}

/// Per-application lifecycle data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Lifecycle {
    Buildpack {
        /// Admin buildpack names or custom buildpack URLs, in detection order.
        #[serde(default)]
        buildpacks: Vec<String>,
        #[serde(default)]
        stack: Option<String>,
    },
    Image,
}

impl Lifecycle {
    pub fn kind(&self) -> LifecycleKind {
        match self {
            Lifecycle::Buildpack { .. } => LifecycleKind::Buildpack,
            Lifecycle::Image => LifecycleKind::Image,
        }
    }
}

/// Helper container that shares memory with a process type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    pub name: String,
    #[serde(default)]
    pub memory_mb: Option<i64>,
    /// Process types this sidecar runs alongside.
    #[serde(default)]
    pub process_types: Vec<String>,
}

/// Owner of one or more processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub guid: AppGuid,
    pub name: String,
    pub space_guid: String,
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Current droplet.
    #[serde(default)]
    pub droplet_guid: Option<DropletGuid>,
    #[serde(default = "default_true")]
    pub revisions_enabled: bool,
    #[serde(default)]
    pub sidecars: Vec<Sidecar>,
}

fn default_true() -> bool {
    true
}

impl Application {
    /// First buildpack when it is a URL rather than an admin buildpack name.
    pub fn custom_buildpack_url(&self) -> Option<&str> {
        match &self.lifecycle {
            Lifecycle::Buildpack { buildpacks, .. } => buildpacks
                .first()
                .map(String::as_str)
                .filter(|bp| is_buildpack_url(bp)),
            Lifecycle::Image => None,
        }
    }
}

fn is_buildpack_url(candidate: &str) -> bool {
    ["http://", "https://", "git://"]
        .iter()
        .any(|scheme| candidate.starts_with(scheme))
}

// ── Package / Build / Droplet ─────────────────────────────────────

/// Registry login for a private image.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// What a package carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PackageSource {
    /// Uploaded application bits, compiled by buildpacks.
    Bits,
    /// A pre-built container image.
    Image {
        image: String,
        #[serde(default)]
        credentials: Option<RegistryCredentials>,
    },
}

/// Uploaded source or image reference awaiting a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub guid: PackageGuid,
    pub app_guid: AppGuid,
    /// Monotonic creation order within the app.
    pub created_at: u64,
    /// Content checksum; blank until the upload completes.
    #[serde(default)]
    pub checksum: Option<String>,
    pub source: PackageSource,
}

impl Package {
    pub fn lifecycle_kind(&self) -> LifecycleKind {
        match self.source {
            PackageSource::Bits => LifecycleKind::Buildpack,
            PackageSource::Image { .. } => LifecycleKind::Image,
        }
    }

    /// Whether the package content is present and buildable.
    ///
    /// Image packages reference remote content, so they are never blank.
    pub fn is_uploaded(&self) -> bool {
        match &self.source {
            PackageSource::Bits => self.checksum.as_deref().is_some_and(|c| !c.trim().is_empty()),
            PackageSource::Image { image, .. } => !image.trim().is_empty(),
        }
    }

    pub fn image(&self) -> Option<&str> {
        match &self.source {
            PackageSource::Image { image, .. } => Some(image.as_str()),
            PackageSource::Bits => None,
        }
    }

    pub fn credentials(&self) -> Option<&RegistryCredentials> {
        match &self.source {
            PackageSource::Image { credentials, .. } => credentials.as_ref(),
            PackageSource::Bits => None,
        }
    }
}

/// Error attribution recorded by the build pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingError {
    pub id: String,
    pub description: String,
}

/// State shared by builds and droplets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StagingState {
    Staging,
    Staged,
    Failed,
}

/// One attempt to turn a package into a droplet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub guid: String,
    pub app_guid: AppGuid,
    pub package_guid: PackageGuid,
    pub state: StagingState,
    /// Monotonic creation order within the app.
    pub created_at: u64,
    #[serde(default)]
    pub error: Option<StagingError>,
    #[serde(default)]
    pub droplet_guid: Option<DropletGuid>,
}

/// Buildpack that produced a droplet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackReceipt {
    pub buildpack: String,
    #[serde(default)]
    pub buildpack_guid: Option<String>,
}

/// Built runtime artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Droplet {
    pub guid: DropletGuid,
    pub app_guid: AppGuid,
    #[serde(default)]
    pub package_guid: Option<PackageGuid>,
    pub state: StagingState,
    pub created_at: u64,
    /// Raw execution metadata from the build pipeline. Untrusted.
    #[serde(default)]
    pub execution_metadata: Option<String>,
    /// Detected start command per process type.
    #[serde(default)]
    pub process_types: BTreeMap<String, String>,
    #[serde(default)]
    pub buildpack_receipt: Option<BuildpackReceipt>,
    /// Resolved image reference for image-based droplets.
    #[serde(default)]
    pub image_receipt: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub error: Option<StagingError>,
}

impl Droplet {
    pub fn is_staged(&self) -> bool {
        self.state == StagingState::Staged
    }
}

// ── Revision / Route mapping ──────────────────────────────────────

/// Pinned environment + droplet for running instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub guid: String,
    pub app_guid: AppGuid,
    pub version: u32,
    pub droplet_guid: DropletGuid,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Binding of a route to a process type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMapping {
    pub guid: String,
    pub app_guid: AppGuid,
    pub process_type: String,
    pub route_guid: String,
    /// Target container port, or [`NO_APP_PORT_SPECIFIED`].
    #[serde(default = "no_app_port")]
    pub app_port: i32,
}

fn no_app_port() -> i32 {
    NO_APP_PORT_SPECIFIED
}

impl RouteMapping {
    /// Explicit target port, if the mapping carries one.
    pub fn target_port(&self) -> Option<u16> {
        if self.app_port == NO_APP_PORT_SPECIFIED {
            return None;
        }
        u16::try_from(self.app_port).ok()
    }

    pub fn has_explicit_port(&self) -> bool {
        self.app_port != NO_APP_PORT_SPECIFIED
    }
}
