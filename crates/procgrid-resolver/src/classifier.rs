//! Package state classification.
//!
//! Derives where a process's code is in the build pipeline from the current
//! package and the builds created for it.

use procgrid_model::{Build, Droplet, Package, Process, StagingError, StagingState};
use serde::{Deserialize, Serialize};

/// Build/package lifecycle phase of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageState {
    /// Nothing buildable yet, or the current package has not been built.
    Pending,
    Staging,
    Staged,
    Failed,
}

impl PackageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageState::Pending => "PENDING",
            PackageState::Staging => "STAGING",
            PackageState::Staged => "STAGED",
            PackageState::Failed => "FAILED",
        }
    }
}

/// Classify the current package against its builds.
///
/// Only builds of `package` count and the most recent one decides; a newer
/// package without builds is PENDING even if an older package staged
/// successfully.
pub fn classify(package: Option<&Package>, builds: &[Build]) -> PackageState {
    let Some(package) = package else {
        return PackageState::Pending;
    };
    if !package.is_uploaded() {
        return PackageState::Pending;
    }

    let latest = builds
        .iter()
        .filter(|b| b.package_guid == package.guid)
        .max_by_key(|b| b.created_at);

    match latest.map(|b| b.state) {
        None => PackageState::Pending,
        Some(StagingState::Staging) => PackageState::Staging,
        Some(StagingState::Staged) => PackageState::Staged,
        Some(StagingState::Failed) => PackageState::Failed,
    }
}

/// Whether the platform should kick off a build for this process.
///
/// A stopped process never needs staging, and neither does one whose
/// package upload has not finished.
pub fn needs_staging(process: &Process, package: Option<&Package>, state: PackageState) -> bool {
    state == PackageState::Pending
        && package.is_some_and(Package::is_uploaded)
        && process.is_started()
        && process.instances > 0
}

/// Error attribution for the most recent staging attempt.
///
/// The latest build wins; droplets are consulted only for apps staged
/// before builds existed.
pub fn staging_failure<'a>(builds: &'a [Build], droplets: &'a [Droplet]) -> Option<&'a StagingError> {
    match builds.iter().max_by_key(|b| b.created_at) {
        Some(build) => build.error.as_ref(),
        None => droplets
            .iter()
            .max_by_key(|d| d.created_at)
            .and_then(|d| d.error.as_ref()),
    }
}

/// Identifier of the most recent staging task.
pub fn staging_task_id<'a>(builds: &'a [Build], droplets: &'a [Droplet]) -> Option<&'a str> {
    match builds.iter().max_by_key(|b| b.created_at) {
        Some(build) => Some(build.guid.as_str()),
        None => droplets
            .iter()
            .max_by_key(|d| d.created_at)
            .map(|d| d.guid.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgrid_model::{PackageSource, ProcessState, ResolverConfig};
    use std::collections::BTreeMap;

    fn package(guid: &str, checksum: Option<&str>) -> Package {
        Package {
            guid: guid.to_string(),
            app_guid: "app-1".to_string(),
            created_at: 1,
            checksum: checksum.map(str::to_string),
            source: PackageSource::Bits,
        }
    }

    fn build(guid: &str, package_guid: &str, state: StagingState, created_at: u64) -> Build {
        Build {
            guid: guid.to_string(),
            app_guid: "app-1".to_string(),
            package_guid: package_guid.to_string(),
            state,
            created_at,
            error: None,
            droplet_guid: None,
        }
    }

    fn droplet(guid: &str, created_at: u64, error: Option<StagingError>) -> Droplet {
        Droplet {
            guid: guid.to_string(),
            app_guid: "app-1".to_string(),
            package_guid: None,
            state: StagingState::Failed,
            created_at,
            execution_metadata: None,
            process_types: BTreeMap::new(),
            buildpack_receipt: None,
            image_receipt: None,
            checksum: None,
            error,
        }
    }

    fn started_process(instances: i32) -> Process {
        let mut process = Process::new("p1", "app-1", "web", &ResolverConfig::default());
        process.state = ProcessState::Started;
        process.instances = instances;
        process
    }

    #[test]
    fn no_package_is_pending() {
        assert_eq!(classify(None, &[]), PackageState::Pending);
    }

    #[test]
    fn blank_checksum_is_pending() {
        let pkg = package("pkg-1", Some(""));
        let builds = vec![build("b1", "pkg-1", StagingState::Staged, 1)];
        assert_eq!(classify(Some(&pkg), &builds), PackageState::Pending);
    }

    #[test]
    fn unbuilt_package_is_pending() {
        let pkg = package("pkg-2", Some("hash"));
        let builds = vec![build("b1", "pkg-1", StagingState::Staged, 1)];
        assert_eq!(classify(Some(&pkg), &builds), PackageState::Pending);
    }

    #[test]
    fn latest_staging_build_is_staging() {
        let pkg = package("pkg-1", Some("hash"));
        let builds = vec![
            build("b1", "pkg-1", StagingState::Staged, 1),
            build("b2", "pkg-1", StagingState::Staging, 2),
        ];
        assert_eq!(classify(Some(&pkg), &builds), PackageState::Staging);
    }

    #[test]
    fn staged_wins_over_older_failure() {
        let pkg = package("pkg-1", Some("hash"));
        let builds = vec![
            build("b1", "pkg-1", StagingState::Failed, 1),
            build("b2", "pkg-1", StagingState::Staged, 2),
        ];
        assert_eq!(classify(Some(&pkg), &builds), PackageState::Staged);
    }

    #[test]
    fn failure_after_staged_build_is_failed() {
        let pkg = package("pkg-1", Some("hash"));
        let builds = vec![
            build("b1", "pkg-1", StagingState::Staged, 1),
            build("b2", "pkg-1", StagingState::Failed, 2),
        ];
        assert_eq!(classify(Some(&pkg), &builds), PackageState::Failed);
    }

    #[test]
    fn failed_latest_build_is_failed() {
        let pkg = package("pkg-1", Some("hash"));
        let builds = vec![build("b1", "pkg-1", StagingState::Failed, 1)];
        assert_eq!(classify(Some(&pkg), &builds), PackageState::Failed);
    }

    #[test]
    fn needs_staging_when_started_and_pending() {
        let pkg = package("pkg-1", Some("hash"));
        let process = started_process(1);
        assert!(needs_staging(&process, Some(&pkg), PackageState::Pending));
    }

    #[test]
    fn no_staging_for_incomplete_upload() {
        let pkg = package("pkg-1", None);
        let process = started_process(1);
        assert!(!needs_staging(&process, Some(&pkg), PackageState::Pending));
    }

    #[test]
    fn no_staging_while_staging() {
        let pkg = package("pkg-1", Some("hash"));
        let process = started_process(1);
        assert!(!needs_staging(&process, Some(&pkg), PackageState::Staging));
    }

    #[test]
    fn stopped_process_never_needs_staging() {
        let pkg = package("pkg-1", Some("hash"));
        let mut process = started_process(3);
        process.state = ProcessState::Stopped;
        assert!(!needs_staging(&process, Some(&pkg), PackageState::Pending));
    }

    #[test]
    fn zero_instances_never_need_staging() {
        let pkg = package("pkg-1", Some("hash"));
        let process = started_process(0);
        assert!(!needs_staging(&process, Some(&pkg), PackageState::Pending));
    }

    #[test]
    fn staging_failure_prefers_build() {
        let build_error = StagingError {
            id: "StagingFailed".to_string(),
            description: "build said so".to_string(),
        };
        let droplet_error = StagingError {
            id: "StagingError".to_string(),
            description: "droplet said so".to_string(),
        };
        let mut b = build("b1", "pkg-1", StagingState::Failed, 1);
        b.error = Some(build_error.clone());
        let droplets = vec![droplet("d1", 5, Some(droplet_error.clone()))];

        assert_eq!(staging_failure(&[b], &droplets), Some(&build_error));
        assert_eq!(staging_failure(&[], &droplets), Some(&droplet_error));
        assert_eq!(staging_failure(&[], &[]), None);
    }

    #[test]
    fn staging_task_id_falls_back_to_droplet() {
        let builds = vec![build("b1", "pkg-1", StagingState::Staging, 1)];
        let droplets = vec![droplet("d1", 1, None)];
        assert_eq!(staging_task_id(&builds, &droplets), Some("b1"));
        assert_eq!(staging_task_id(&[], &droplets), Some("d1"));
    }
}
