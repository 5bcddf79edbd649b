//! Organization and space quota definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::UNLIMITED;

/// Which level of the tenancy hierarchy a quota belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Organization,
    Space,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Organization => f.write_str("organization"),
            ScopeKind::Space => f.write_str("space"),
        }
    }
}

/// Ceilings for one scope. Every limit uses [`UNLIMITED`] (`-1`) for "no limit".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDefinition {
    pub name: String,
    /// Total memory across all started instances, in MB.
    pub memory_limit_mb: i64,
    /// Memory per instance, in MB.
    #[serde(default = "unlimited")]
    pub instance_memory_limit_mb: i64,
    /// Total started instances.
    #[serde(default = "unlimited")]
    pub app_instance_limit: i64,
    /// Total log rate across started instances, bytes per second.
    #[serde(default = "unlimited")]
    pub log_rate_limit: i64,
}

fn unlimited() -> i64 {
    UNLIMITED
}

impl QuotaDefinition {
    /// A quota with no ceilings at all.
    pub fn unlimited(name: &str) -> Self {
        Self {
            name: name.to_string(),
            memory_limit_mb: UNLIMITED,
            instance_memory_limit_mb: UNLIMITED,
            app_instance_limit: UNLIMITED,
            log_rate_limit: UNLIMITED,
        }
    }

    pub fn has_unlimited_log_rate(&self) -> bool {
        self.log_rate_limit == UNLIMITED
    }
}

/// Resources already committed in a scope by processes other than the one
/// being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScopeUsage {
    pub memory_mb: i64,
    pub instances: i64,
    /// Committed log rate; unlimited consumers are not counted.
    pub log_rate: i64,
}

/// A quota applied to one named organization or space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaScope {
    pub kind: ScopeKind,
    /// Organization or space name, used in violation messages.
    pub name: String,
    pub definition: QuotaDefinition,
    #[serde(default)]
    pub usage: ScopeUsage,
}

impl QuotaScope {
    pub fn organization(name: &str, definition: QuotaDefinition) -> Self {
        Self {
            kind: ScopeKind::Organization,
            name: name.to_string(),
            definition,
            usage: ScopeUsage::default(),
        }
    }

    pub fn space(name: &str, definition: QuotaDefinition) -> Self {
        Self {
            kind: ScopeKind::Space,
            name: name.to_string(),
            definition,
            usage: ScopeUsage::default(),
        }
    }

    pub fn with_usage(mut self, usage: ScopeUsage) -> Self {
        self.usage = usage;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_limits_default_to_unlimited() {
        let quota: QuotaDefinition =
            serde_json::from_str(r#"{"name":"small","memory_limit_mb":128}"#).unwrap();
        assert_eq!(quota.memory_limit_mb, 128);
        assert_eq!(quota.instance_memory_limit_mb, UNLIMITED);
        assert_eq!(quota.app_instance_limit, UNLIMITED);
        assert!(quota.has_unlimited_log_rate());
    }

    #[test]
    fn scope_kind_display() {
        assert_eq!(ScopeKind::Organization.to_string(), "organization");
        assert_eq!(ScopeKind::Space.to_string(), "space");
    }
}
