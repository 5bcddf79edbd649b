//! Quota validator chain.
//!
//! Every policy runs on every attempted save and appends its findings to a
//! shared [`ValidationErrors`]; nothing short-circuits. Field sanity checks
//! always apply. Scope ceilings apply only while the process is STARTED, so
//! a stopped process may hold values above quota and an over-quota process
//! can always be stopped.
//!
//! Scope checks are evaluated on the post-change aggregate:
//!
//! ```text
//! memory:     usage.memory    + instances * memory    <= memory_limit
//! instances:  usage.instances + instances             <= app_instance_limit
//! log rate:   usage.log_rate  + instances * log_rate  <= log_rate_limit
//! ```
//!
//! Scaling down from above quota therefore succeeds only when the result
//! lands at or below the ceiling.

use procgrid_model::{
    Application, HealthCheck, HealthCheckType, Package, Process, QuotaScope, ResolverConfig,
    UNLIMITED,
};
use tracing::{debug, warn};

use crate::error::{Field, LifecycleKindName, ValidationErrors, ValidationResult, Violation};

/// Everything the chain looks at for one attempted save.
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    pub process: &'a Process,
    /// Owning application; lifecycle and sidecar checks are skipped without it.
    pub app: Option<&'a Application>,
    /// Current package; the lifecycle match check is skipped without it.
    pub package: Option<&'a Package>,
    pub organization: Option<&'a QuotaScope>,
    pub space: Option<&'a QuotaScope>,
    pub config: &'a ResolverConfig,
}

impl<'a> ValidationInput<'a> {
    pub fn new(process: &'a Process, config: &'a ResolverConfig) -> Self {
        Self {
            process,
            app: None,
            package: None,
            organization: None,
            space: None,
            config,
        }
    }

    pub fn with_app(mut self, app: &'a Application) -> Self {
        self.app = Some(app);
        self
    }

    pub fn with_package(mut self, package: Option<&'a Package>) -> Self {
        self.package = package;
        self
    }

    pub fn with_scopes(mut self, organization: Option<&'a QuotaScope>, space: Option<&'a QuotaScope>) -> Self {
        self.organization = organization;
        self.space = space;
        self
    }

    fn scopes(&self) -> impl Iterator<Item = &'a QuotaScope> {
        self.organization.into_iter().chain(self.space)
    }
}

type Check = fn(&ValidationInput<'_>, &mut ValidationErrors);

/// One named check in the chain.
#[derive(Clone, Copy)]
pub struct Policy {
    pub name: &'static str,
    /// Whether the policy applies to stopped processes too.
    pub always: bool,
    check: Check,
}

/// Ordered chain of checks.
pub const POLICIES: &[Policy] = &[
    Policy { name: "instances", always: true, check: instances_policy },
    Policy { name: "min_memory", always: true, check: min_memory_policy },
    Policy { name: "disk_quota", always: true, check: disk_quota_policy },
    Policy { name: "min_log_rate_limit", always: true, check: min_log_rate_policy },
    Policy { name: "process_user", always: true, check: user_policy },
    Policy { name: "health_check", always: true, check: health_check_policy },
    Policy { name: "readiness_health_check", always: true, check: readiness_check_policy },
    Policy { name: "ports", always: true, check: ports_policy },
    Policy { name: "lifecycle_match", always: true, check: lifecycle_match_policy },
    Policy { name: "sidecar_memory", always: true, check: sidecar_memory_policy },
    Policy { name: "image_lifecycle_enabled", always: false, check: image_enabled_policy },
    Policy { name: "max_memory", always: false, check: max_memory_policy },
    Policy { name: "max_instance_memory", always: false, check: max_instance_memory_policy },
    Policy { name: "max_app_instances", always: false, check: max_instances_policy },
    Policy { name: "max_log_rate", always: false, check: max_log_rate_policy },
];

/// Validate a process against scope quotas and platform configuration.
pub fn validate(
    process: &Process,
    organization: Option<&QuotaScope>,
    space: Option<&QuotaScope>,
    config: &ResolverConfig,
) -> ValidationResult {
    validate_input(&ValidationInput::new(process, config).with_scopes(organization, space))
}

/// Run the full chain over `input`.
pub fn validate_input(input: &ValidationInput<'_>) -> ValidationResult {
    let mut errors = ValidationErrors::new();
    let started = input.process.is_started();

    for policy in POLICIES.iter().filter(|p| p.always || started) {
        let before = errors.len();
        (policy.check)(input, &mut errors);
        if errors.len() > before {
            debug!(
                process = %input.process.guid,
                policy = policy.name,
                violations = errors.len() - before,
                "policy rejected process"
            );
        }
    }

    if !errors.is_empty() {
        warn!(process = %input.process.guid, %errors, "process failed validation");
    }
    errors.into_result()
}

// ── Field policies ────────────────────────────────────────────────

fn instances_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    if input.process.instances < 0 {
        errors.add(Field::Instances, Violation::Negative);
    }
}

fn min_memory_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let minimum = input.config.minimum_app_memory_mb;
    if input.process.memory_mb < minimum {
        errors.add(Field::Memory, Violation::BelowMinimum { minimum });
    }
}

fn disk_quota_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let disk = input.process.disk_mb;
    let cfg = input.config;
    if disk < cfg.minimum_app_disk_mb {
        errors.add(Field::DiskQuota, Violation::BelowMinimum { minimum: cfg.minimum_app_disk_mb });
    }
    if disk > cfg.maximum_app_disk_mb {
        errors.add(Field::DiskQuota, Violation::AboveMaximum { maximum: cfg.maximum_app_disk_mb });
    }
}

fn min_log_rate_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let minimum = input.config.minimum_log_rate_limit;
    if input.process.log_rate_limit < minimum {
        errors.add(Field::LogRateLimit, Violation::BelowMinimum { minimum });
    }
}

fn user_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let Some(user) = input.process.user.as_deref().filter(|u| !u.is_empty()) else {
        return;
    };
    if !input.config.is_allowed_user(user) {
        errors.add(Field::User, Violation::UserNotAllowed { user: user.to_string() });
    }
}

fn health_check_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let check = &input.process.health_check;
    if requires_missing_endpoint(check) {
        errors.add(Field::HealthCheckHttpEndpoint, Violation::EndpointRequired);
    }
    if let Some(timeout) = check.timeout_secs {
        let maximum = input.config.maximum_health_check_timeout_secs;
        if timeout > maximum {
            errors.add(Field::HealthCheckTimeout, Violation::AboveMaximum { maximum: i64::from(maximum) });
        }
    }
}

fn readiness_check_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    if requires_missing_endpoint(&input.process.readiness_check) {
        errors.add(Field::ReadinessHealthCheckHttpEndpoint, Violation::EndpointRequired);
    }
}

fn requires_missing_endpoint(check: &HealthCheck) -> bool {
    check.kind == HealthCheckType::Http
        && check.http_endpoint.as_deref().is_none_or(|e| e.trim().is_empty())
}

fn ports_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let Some(ports) = &input.process.ports else {
        return;
    };
    if ports.is_empty() {
        errors.add(Field::Ports, Violation::Empty);
        return;
    }
    if ports.contains(&0) {
        errors.add(Field::Ports, Violation::ZeroPort);
    }
    let mut reported = Vec::new();
    for (i, port) in ports.iter().enumerate() {
        if ports[..i].contains(port) && !reported.contains(port) {
            reported.push(*port);
            errors.add(Field::Ports, Violation::DuplicatePort { port: *port });
        }
    }
}

fn lifecycle_match_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let (Some(app), Some(package)) = (input.app, input.package) else {
        return;
    };
    let app_kind = app.lifecycle.kind();
    let package_kind = package.lifecycle_kind();
    if app_kind != package_kind {
        errors.add(
            Field::Lifecycle,
            Violation::LifecycleMismatch {
                package: LifecycleKindName(package_kind),
                app: LifecycleKindName(app_kind),
            },
        );
    }
}

fn sidecar_memory_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let Some(app) = input.app else {
        return;
    };
    let process_type = &input.process.process_type;
    let reserved_mb: i64 = app
        .sidecars
        .iter()
        .filter(|s| s.process_types.iter().any(|t| t == process_type))
        .filter_map(|s| s.memory_mb)
        .sum();

    if reserved_mb > 0 && input.process.memory_mb <= reserved_mb {
        errors.add(Field::Memory, Violation::SidecarMemory { reserved_mb });
    }
}

// ── Started-only policies ─────────────────────────────────────────

fn image_enabled_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let Some(app) = input.app else {
        return;
    };
    if app.lifecycle.kind() == procgrid_model::LifecycleKind::Image && !input.config.image_lifecycle_enabled {
        errors.add(Field::Lifecycle, Violation::ImageLifecycleDisabled);
    }
}

fn max_memory_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let requested = input.process.total_memory_mb();
    for scope in input.scopes() {
        let limit = scope.definition.memory_limit_mb;
        if limit != UNLIMITED && scope.usage.memory_mb.saturating_add(requested) > limit {
            errors.add(Field::Memory, Violation::MemoryQuotaExceeded { scope: scope.kind });
        }
    }
}

fn max_instance_memory_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    for scope in input.scopes() {
        let limit = scope.definition.instance_memory_limit_mb;
        if limit != UNLIMITED && input.process.memory_mb > limit {
            errors.add(Field::Memory, Violation::InstanceMemoryLimitExceeded { scope: scope.kind });
        }
    }
}

fn max_instances_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let requested = i64::from(input.process.instances.max(0));
    for scope in input.scopes() {
        let limit = scope.definition.app_instance_limit;
        if limit != UNLIMITED && scope.usage.instances.saturating_add(requested) > limit {
            errors.add(Field::Instances, Violation::InstanceLimitExceeded { scope: scope.kind });
        }
    }
}

fn max_log_rate_policy(input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let process = input.process;
    for scope in input.scopes() {
        if scope.definition.has_unlimited_log_rate() {
            continue;
        }
        if process.log_rate_limit == UNLIMITED {
            errors.add(
                Field::LogRateLimit,
                Violation::UnlimitedNotAllowed {
                    scope: scope.kind,
                    name: scope.name.clone(),
                },
            );
            continue;
        }
        let requested = process.total_log_rate();
        if scope.usage.log_rate.saturating_add(requested) > scope.definition.log_rate_limit {
            errors.add(Field::LogRateLimit, Violation::LogRateQuotaExceeded { scope: scope.kind });
        }
    }
}
