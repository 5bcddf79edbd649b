//! Version tracking.
//!
//! A process's version token changes exactly when running instances must
//! be replaced rather than scaled. Instance count is not part of
//! the tracked set.

use procgrid_model::{HealthCheck, Process, VersionToken};
use tracing::debug;

/// Whether a save should consider bumping the version at all.
///
/// Bulk maintenance paths (migrations, backfills) save with [`VersionPolicy::Skip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    #[default]
    Track,
    Skip,
}

/// Fields whose change forces a restart, by name.
pub const TRACKED_FIELDS: &[&str] = &[
    "memory",
    "disk_quota",
    "health_check_type",
    "health_check_http_endpoint",
    "readiness_health_check_type",
    "readiness_health_check_http_endpoint",
    "ports",
    "state",
];

/// Names of tracked fields that differ between `old` and `new`.
pub fn changed_fields(old: &Process, new: &Process) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if old.memory_mb != new.memory_mb {
        changed.push("memory");
    }
    if old.disk_mb != new.disk_mb {
        changed.push("disk_quota");
    }
    check_changes(
        &old.health_check,
        &new.health_check,
        ["health_check_type", "health_check_http_endpoint"],
        &mut changed,
    );
    check_changes(
        &old.readiness_check,
        &new.readiness_check,
        ["readiness_health_check_type", "readiness_health_check_http_endpoint"],
        &mut changed,
    );
    if old.ports != new.ports {
        changed.push("ports");
    }
    if old.state != new.state {
        changed.push("state");
    }
    changed
}

fn check_changes(
    old: &HealthCheck,
    new: &HealthCheck,
    [type_field, endpoint_field]: [&'static str; 2],
    changed: &mut Vec<&'static str>,
) {
    if old.kind != new.kind {
        changed.push(type_field);
    }
    if old.http_endpoint != new.http_endpoint {
        changed.push(endpoint_field);
    }
}

/// Token `new` should be saved with.
///
/// Returns a fresh token strictly newer than `old.version` when a tracked
/// field changed and the policy allows it; otherwise `old.version`.
pub fn bump_if_needed(old: &Process, new: &Process, policy: VersionPolicy) -> VersionToken {
    if policy == VersionPolicy::Skip {
        return old.version;
    }

    let changed = changed_fields(old, new);
    if changed.is_empty() {
        return old.version;
    }

    let next = old.version.next();
    debug!(
        process = %new.guid,
        ?changed,
        from = %old.version,
        to = %next,
        "bumping process version"
    );
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgrid_model::{HealthCheckType, ProcessState, ResolverConfig};

    fn process() -> Process {
        let mut p = Process::new("p1", "app-1", "web", &ResolverConfig::default());
        p.memory_mb = 64;
        p.instances = 2;
        p
    }

    #[test]
    fn memory_change_bumps() {
        let old = process();
        let mut new = old.clone();
        new.memory_mb = 65;

        let token = bump_if_needed(&old, &new, VersionPolicy::Track);
        assert_ne!(token, old.version);
        assert!(token.generation > old.version.generation);
    }

    #[test]
    fn scaling_never_bumps() {
        let old = process();
        let mut new = old.clone();
        new.instances = 5;
        assert_eq!(bump_if_needed(&old, &new, VersionPolicy::Track), old.version);
    }

    #[test]
    fn unchanged_process_keeps_token() {
        let old = process();
        assert_eq!(bump_if_needed(&old, &old.clone(), VersionPolicy::Track), old.version);
    }

    #[test]
    fn skip_policy_keeps_token() {
        let old = process();
        let mut new = old.clone();
        new.disk_mb = 2048;
        assert_eq!(bump_if_needed(&old, &new, VersionPolicy::Skip), old.version);
    }

    #[test]
    fn every_tracked_field_is_detected() {
        let old = process();
        let mutations: Vec<(&str, Box<dyn Fn(&mut Process)>)> = vec![
            ("memory", Box::new(|p: &mut Process| p.memory_mb = 128)),
            ("disk_quota", Box::new(|p: &mut Process| p.disk_mb = 2048)),
            ("health_check_type", Box::new(|p: &mut Process| p.health_check.kind = HealthCheckType::Process)),
            ("health_check_http_endpoint", Box::new(|p: &mut Process| p.health_check.http_endpoint = Some("/two".into()))),
            ("readiness_health_check_type", Box::new(|p: &mut Process| p.readiness_check.kind = HealthCheckType::Port)),
            (
                "readiness_health_check_http_endpoint",
                Box::new(|p: &mut Process| p.readiness_check.http_endpoint = Some("/ready".into())),
            ),
            ("ports", Box::new(|p: &mut Process| p.ports = Some(vec![8081]))),
            ("state", Box::new(|p: &mut Process| p.state = ProcessState::Started)),
        ];

        for (field, mutate) in mutations {
            let mut new = old.clone();
            mutate(&mut new);
            assert_eq!(changed_fields(&old, &new), vec![field]);
            assert!(TRACKED_FIELDS.contains(&field));
        }
    }

    #[test]
    fn untracked_fields_are_ignored() {
        let old = process();
        let mut new = old.clone();
        new.instances = 10;
        new.command = Some("./run".into());
        new.user = Some("vcap".into());
        new.health_check.timeout_secs = Some(30);
        assert!(changed_fields(&old, &new).is_empty());
    }

    #[test]
    fn tokens_increase_across_successive_bumps() {
        let mut current = process();
        let mut seen = vec![current.version];
        for memory in [65, 66, 67] {
            let mut next = current.clone();
            next.memory_mb = memory;
            next.version = bump_if_needed(&current, &next, VersionPolicy::Track);
            assert!(!seen.contains(&next.version));
            seen.push(next.version);
            current = next;
        }
        assert_eq!(current.version.generation, 4);
    }
}
