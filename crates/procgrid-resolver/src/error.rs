//! Field-attributed validation errors.

use std::fmt;

use procgrid_model::{LifecycleKind, ScopeKind};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for validation.
pub type ValidationResult = Result<(), ValidationErrors>;

/// Process attribute a violation is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Instances,
    Memory,
    DiskQuota,
    LogRateLimit,
    User,
    Ports,
    HealthCheckHttpEndpoint,
    HealthCheckTimeout,
    ReadinessHealthCheckHttpEndpoint,
    Lifecycle,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Instances => "instances",
            Field::Memory => "memory",
            Field::DiskQuota => "disk_quota",
            Field::LogRateLimit => "log_rate_limit",
            Field::User => "user",
            Field::Ports => "ports",
            Field::HealthCheckHttpEndpoint => "health_check_http_endpoint",
            Field::HealthCheckTimeout => "health_check_timeout",
            Field::ReadinessHealthCheckHttpEndpoint => "readiness_health_check_http_endpoint",
            Field::Lifecycle => "lifecycle",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("must be greater than or equal to 0")]
    Negative,

    #[error("must be at least {minimum}")]
    BelowMinimum { minimum: i64 },

    #[error("must be at most {maximum}")]
    AboveMaximum { maximum: i64 },

    #[error("quota_exceeded in {scope}")]
    MemoryQuotaExceeded { scope: ScopeKind },

    #[error("instance_memory_limit_exceeded in {scope}")]
    InstanceMemoryLimitExceeded { scope: ScopeKind },

    #[error("instance_limit_exceeded in {scope}")]
    InstanceLimitExceeded { scope: ScopeKind },

    #[error("exceeds {scope} log rate quota")]
    LogRateQuotaExceeded { scope: ScopeKind },

    #[error("cannot be unlimited in {scope} '{name}'.")]
    UnlimitedNotAllowed { scope: ScopeKind, name: String },

    #[error("user invalid: '{user}' is not an allowed process user")]
    UserNotAllowed { user: String },

    #[error("is required for http checks")]
    EndpointRequired,

    #[error("must not be empty")]
    Empty,

    #[error("contains duplicate port {port}")]
    DuplicatePort { port: u16 },

    #[error("must not contain port 0")]
    ZeroPort,

    #[error("{package} package is incompatible with {app} application")]
    LifecycleMismatch {
        package: LifecycleKindName,
        app: LifecycleKindName,
    },

    #[error("image lifecycle is not enabled")]
    ImageLifecycleDisabled,

    #[error("must be greater than the {reserved_mb} MB reserved by sidecars")]
    SidecarMemory { reserved_mb: i64 },
}

/// Display wrapper so lifecycle kinds read naturally in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LifecycleKindName(pub LifecycleKind);

impl fmt::Display for LifecycleKindName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// A violation attributed to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: Field,
    pub violation: Violation,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.violation)
    }
}

/// Every violation found for one attempted save.
///
/// A non-empty list rejects the whole save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[serde(transparent)]
#[error("validation failed: {}", join_violations(.violations))]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: Field, violation: Violation) {
        self.violations.push(FieldViolation { field, violation });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Violations reported against `field`.
    pub fn on(&self, field: Field) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.field == field)
            .map(|v| &v.violation)
            .collect()
    }

    /// Messages reported against `field`.
    pub fn messages_on(&self, field: Field) -> Vec<String> {
        self.on(field).into_iter().map(ToString::to_string).collect()
    }

    pub fn into_result(self) -> ValidationResult {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
