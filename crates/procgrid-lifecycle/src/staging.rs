//! Lifecycle data handed to the build pipeline when staging a package.

use procgrid_model::{Application, Lifecycle, Package, PackageSource, RegistryCredentials};
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, LifecycleResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StagingLifecycleData {
    Image {
        image: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credentials: Option<RegistryCredentials>,
    },
    Buildpack {
        buildpacks: Vec<String>,
        #[serde(default)]
        stack: Option<String>,
    },
}

/// Staging inputs for building `package` for `app`.
pub fn staging_lifecycle_data(app: &Application, package: &Package) -> LifecycleResult<StagingLifecycleData> {
    if !package.is_uploaded() {
        return Err(LifecycleError::PackageNotReady(package.guid.clone()));
    }

    match (&app.lifecycle, &package.source) {
        (Lifecycle::Image, PackageSource::Image { image, credentials }) => Ok(StagingLifecycleData::Image {
            image: image.clone(),
            credentials: credentials.clone(),
        }),
        (Lifecycle::Buildpack { buildpacks, stack }, PackageSource::Bits) => Ok(StagingLifecycleData::Buildpack {
            buildpacks: buildpacks.clone(),
            stack: stack.clone(),
        }),
        _ => Err(LifecycleError::LifecycleMismatch {
            app: app.lifecycle.kind(),
            package: package.lifecycle_kind(),
        }),
    }
}
