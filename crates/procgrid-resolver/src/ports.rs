//! Port resolution.
//!
//! Two related answers live here:
//!
//! - [`resolve_ports`]: the ports a process *declares*. Explicit user
//!   configuration always wins; otherwise the lifecycle default applies.
//! - [`open_ports`]: the ports the container must actually open. For image
//!   processes this folds image-exposed (or default) ports in alongside the
//!   explicit ones whenever a route needs them.
//!
//! # Image lifecycle
//!
//! ```text
//! needs_image_port = any route mapping without a port
//!                 || (web && ports unset)
//!
//! open = explicit ports
//! if needs_image_port:
//!     open += image tcp ports, or [8080] if the image exposes none
//! ```

use procgrid_model::{DEFAULT_PORT, LifecycleKind, Process, RouteMapping};
use tracing::debug;

/// Declared ports for a process.
///
/// Returns the explicit ports verbatim when set. Otherwise returns the
/// lifecycle default, or `None` when the lifecycle opens nothing by default.
pub fn resolve_ports(
    process: &Process,
    lifecycle: LifecycleKind,
    image_exposed_ports: &[u16],
    route_mappings: &[RouteMapping],
) -> Option<Vec<u16>> {
    if let Some(ports) = &process.ports {
        return Some(ports.clone());
    }

    let defaults = open_ports(process, lifecycle, image_exposed_ports, route_mappings);
    if defaults.is_empty() { None } else { Some(defaults) }
}

/// Container-facing ports for a process.
pub fn open_ports(
    process: &Process,
    lifecycle: LifecycleKind,
    image_exposed_ports: &[u16],
    route_mappings: &[RouteMapping],
) -> Vec<u16> {
    let explicit = process.ports.as_deref().unwrap_or_default();

    let ports = match lifecycle {
        LifecycleKind::Buildpack => {
            if process.ports.is_none() && process.is_web() {
                vec![DEFAULT_PORT]
            } else {
                explicit.to_vec()
            }
        }
        LifecycleKind::Image => {
            let mut ports = explicit.to_vec();
            if needs_image_port(process, route_mappings) {
                if image_exposed_ports.is_empty() {
                    ports.push(DEFAULT_PORT);
                } else {
                    ports.extend_from_slice(image_exposed_ports);
                }
            }
            ports
        }
    };

    let ports = dedup_preserving_order(ports);
    debug!(
        process = %process.guid,
        lifecycle = lifecycle.as_str(),
        ?ports,
        "resolved open ports"
    );
    ports
}

/// Whether an image process must open a port beyond its explicit ones.
fn needs_image_port(process: &Process, route_mappings: &[RouteMapping]) -> bool {
    let has_mapping_without_port = route_mappings
        .iter()
        .filter(|m| m.process_type == process.process_type)
        .any(|m| !m.has_explicit_port());

    has_mapping_without_port || (process.is_web() && process.ports.is_none())
}

fn dedup_preserving_order(ports: Vec<u16>) -> Vec<u16> {
    let mut seen = Vec::with_capacity(ports.len());
    for port in ports {
        if !seen.contains(&port) {
            seen.push(port);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgrid_model::{NO_APP_PORT_SPECIFIED, ResolverConfig};

    fn process(process_type: &str, ports: Option<Vec<u16>>) -> Process {
        let mut p = Process::new("p1", "app-1", process_type, &ResolverConfig::default());
        p.ports = ports;
        p
    }

    fn mapping(process_type: &str, app_port: i32) -> RouteMapping {
        RouteMapping {
            guid: format!("rm-{app_port}"),
            app_guid: "app-1".to_string(),
            process_type: process_type.to_string(),
            route_guid: "route-1".to_string(),
            app_port,
        }
    }

    fn sorted(mut ports: Vec<u16>) -> Vec<u16> {
        ports.sort();
        ports
    }

    #[test]
    fn explicit_ports_win_for_every_lifecycle() {
        let p = process("worker", Some(vec![1111, 2222]));
        let mappings = vec![mapping("worker", NO_APP_PORT_SPECIFIED)];
        for lifecycle in [LifecycleKind::Buildpack, LifecycleKind::Image] {
            assert_eq!(
                resolve_ports(&p, lifecycle, &[3333], &mappings),
                Some(vec![1111, 2222])
            );
        }
    }

    // ── Image lifecycle ───────────────────────────────────────────

    #[test]
    fn image_explicit_ports_and_sentinel_union_image_ports() {
        let p = process("worker", Some(vec![1111, 2222]));
        let mappings = vec![mapping("worker", NO_APP_PORT_SPECIFIED)];
        let open = open_ports(&p, LifecycleKind::Image, &[2222, 3333, 4444], &mappings);
        assert_eq!(sorted(open), vec![1111, 2222, 3333, 4444]);
    }

    #[test]
    fn image_explicit_ports_and_sentinel_without_image_ports_add_default() {
        let p = process("worker", Some(vec![1111, 2222]));
        let mappings = vec![mapping("worker", NO_APP_PORT_SPECIFIED)];
        let open = open_ports(&p, LifecycleKind::Image, &[], &mappings);
        assert_eq!(sorted(open), vec![1111, 2222, 8080]);
    }

    #[test]
    fn image_explicit_ports_with_explicit_mappings_stay_as_is() {
        let p = process("worker", Some(vec![1111, 2222]));
        let mappings = vec![mapping("worker", 9999)];
        let open = open_ports(&p, LifecycleKind::Image, &[3333], &mappings);
        assert_eq!(sorted(open), vec![1111, 2222]);
    }

    #[test]
    fn image_web_with_sentinel_uses_image_ports() {
        let p = process("web", None);
        let mappings = vec![mapping("web", NO_APP_PORT_SPECIFIED)];
        let open = open_ports(&p, LifecycleKind::Image, &[3333, 4444], &mappings);
        assert_eq!(sorted(open), vec![3333, 4444]);
    }

    #[test]
    fn image_web_with_sentinel_and_no_image_ports_uses_default() {
        let p = process("web", None);
        let mappings = vec![mapping("web", NO_APP_PORT_SPECIFIED)];
        assert_eq!(open_ports(&p, LifecycleKind::Image, &[], &mappings), vec![8080]);
    }

    #[test]
    fn image_web_with_explicit_mappings_still_opens_default() {
        let p = process("web", None);
        let mappings = vec![mapping("web", 9999)];
        assert_eq!(open_ports(&p, LifecycleKind::Image, &[], &mappings), vec![8080]);
    }

    #[test]
    fn image_web_without_mappings_or_droplet_uses_default() {
        let p = process("web", None);
        assert_eq!(open_ports(&p, LifecycleKind::Image, &[], &[]), vec![8080]);
    }

    #[test]
    fn image_worker_with_sentinel_uses_image_ports() {
        let p = process("worker", None);
        let mappings = vec![mapping("worker", NO_APP_PORT_SPECIFIED)];
        let open = open_ports(&p, LifecycleKind::Image, &[3333, 4444], &mappings);
        assert_eq!(sorted(open), vec![3333, 4444]);
    }

    #[test]
    fn image_worker_with_sentinel_and_no_image_ports_uses_default() {
        let p = process("worker", None);
        let mappings = vec![mapping("worker", NO_APP_PORT_SPECIFIED)];
        assert_eq!(open_ports(&p, LifecycleKind::Image, &[], &mappings), vec![8080]);
    }

    #[test]
    fn image_worker_with_explicit_mappings_opens_nothing() {
        let p = process("worker", None);
        let mappings = vec![mapping("worker", 9999)];
        assert!(open_ports(&p, LifecycleKind::Image, &[3333], &mappings).is_empty());
    }

    #[test]
    fn image_worker_without_mappings_opens_nothing() {
        let p = process("worker", None);
        assert!(open_ports(&p, LifecycleKind::Image, &[3333], &[]).is_empty());
        assert_eq!(resolve_ports(&p, LifecycleKind::Image, &[3333], &[]), None);
    }

    #[test]
    fn mappings_for_other_process_types_are_ignored() {
        let p = process("worker", None);
        let mappings = vec![mapping("web", NO_APP_PORT_SPECIFIED)];
        assert!(open_ports(&p, LifecycleKind::Image, &[3333], &mappings).is_empty());
    }

    #[test]
    fn union_removes_duplicates() {
        let p = process("web", Some(vec![1111, 2222]));
        let mappings = vec![mapping("web", NO_APP_PORT_SPECIFIED)];
        let open = open_ports(&p, LifecycleKind::Image, &[2222, 3333], &mappings);
        assert_eq!(open, vec![1111, 2222, 3333]);
    }

    // ── Buildpack lifecycle ───────────────────────────────────────

    #[test]
    fn buildpack_explicit_ports() {
        let p = process("worker", Some(vec![1111, 2222]));
        assert_eq!(open_ports(&p, LifecycleKind::Buildpack, &[], &[]), vec![1111, 2222]);
    }

    #[test]
    fn buildpack_web_defaults_to_8080() {
        let p = process("web", None);
        assert_eq!(open_ports(&p, LifecycleKind::Buildpack, &[], &[]), vec![8080]);
        assert_eq!(resolve_ports(&p, LifecycleKind::Buildpack, &[], &[]), Some(vec![8080]));
    }

    #[test]
    fn buildpack_worker_opens_nothing() {
        let p = process("worker", None);
        let mappings = vec![mapping("worker", NO_APP_PORT_SPECIFIED)];
        assert!(open_ports(&p, LifecycleKind::Buildpack, &[], &mappings).is_empty());
        assert_eq!(resolve_ports(&p, LifecycleKind::Buildpack, &[], &mappings), None);
    }

    #[test]
    fn buildpack_ignores_image_ports() {
        let p = process("web", None);
        let open = open_ports(&p, LifecycleKind::Buildpack, &[1024, 8080], &[]);
        assert_eq!(open, vec![8080]);
    }
}
