//! Organizations, spaces, and the footprint each process leaves in them.

use procgrid_model::{Application, Process, QuotaDefinition, ScopeKind, ScopeUsage, UNLIMITED};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub guid: String,
    pub name: String,
    pub quota: QuotaDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub guid: String,
    pub name: String,
    pub organization_guid: String,
    /// Spaces without their own quota are bounded only by the organization.
    pub quota: Option<QuotaDefinition>,
}

/// Resources one process commits to its space and organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Footprint {
    pub space_guid: String,
    pub organization_guid: String,
    pub started: bool,
    pub memory_mb: i64,
    pub instances: i64,
    /// Committed log rate; unlimited processes commit nothing countable.
    pub log_rate: i64,
}

impl Footprint {
    pub fn of(process: &Process, app: &Application, organization_guid: &str) -> Self {
        let instances = i64::from(process.instances.max(0));
        let log_rate = if process.log_rate_limit == UNLIMITED {
            0
        } else {
            process.total_log_rate()
        };
        Self {
            space_guid: app.space_guid.clone(),
            organization_guid: organization_guid.to_string(),
            started: process.is_started(),
            memory_mb: process.total_memory_mb(),
            instances,
            log_rate,
        }
    }

    fn in_scope(&self, kind: ScopeKind, guid: &str) -> bool {
        match kind {
            ScopeKind::Organization => self.organization_guid == guid,
            ScopeKind::Space => self.space_guid == guid,
        }
    }
}

/// Usage of a scope by started processes other than `exclude`.
pub(crate) fn scope_usage<'a>(
    footprints: impl IntoIterator<Item = (&'a String, &'a Footprint)>,
    kind: ScopeKind,
    scope_guid: &str,
    exclude: &str,
) -> ScopeUsage {
    footprints
        .into_iter()
        .filter(|(guid, f)| guid.as_str() != exclude && f.started && f.in_scope(kind, scope_guid))
        .fold(ScopeUsage::default(), |acc, (_, f)| ScopeUsage {
            memory_mb: acc.memory_mb.saturating_add(f.memory_mb),
            instances: acc.instances.saturating_add(f.instances),
            log_rate: acc.log_rate.saturating_add(f.log_rate),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn footprint(space: &str, org: &str, started: bool) -> Footprint {
        Footprint {
            space_guid: space.to_string(),
            organization_guid: org.to_string(),
            started,
            memory_mb: 128,
            instances: 2,
            log_rate: 10,
        }
    }

    #[test]
    fn usage_sums_started_others_in_scope() {
        let footprints = HashMap::from([
            ("p1".to_string(), footprint("s1", "o1", true)),
            ("p2".to_string(), footprint("s1", "o1", true)),
            ("p3".to_string(), footprint("s2", "o1", true)),
            ("p4".to_string(), footprint("s1", "o1", false)),
        ]);

        let space = scope_usage(&footprints, ScopeKind::Space, "s1", "p1");
        assert_eq!(space, ScopeUsage { memory_mb: 128, instances: 2, log_rate: 10 });

        let org = scope_usage(&footprints, ScopeKind::Organization, "o1", "p1");
        assert_eq!(org, ScopeUsage { memory_mb: 256, instances: 4, log_rate: 20 });
    }
}
