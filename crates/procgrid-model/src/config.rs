//! Resolver configuration.
//!
//! Platform-wide defaults and ceilings, loaded once (usually from a TOML
//! file) and passed by reference into every resolver and validator call.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub default_app_memory_mb: i64,
    pub default_app_disk_mb: i64,
    /// Bytes per second; `-1` is unlimited.
    pub default_app_log_rate_limit: i64,
    pub minimum_app_memory_mb: i64,
    pub minimum_app_disk_mb: i64,
    pub maximum_app_disk_mb: i64,
    pub minimum_log_rate_limit: i64,
    pub instance_file_descriptor_limit: u64,
    pub maximum_health_check_timeout_secs: u32,
    /// User buildpack processes run as unless told otherwise.
    pub default_process_user: String,
    /// User image processes run as when neither the process nor the image names one.
    pub default_image_user: String,
    pub additional_allowed_process_users: Vec<String>,
    /// Whether image-based processes may be started at all.
    pub image_lifecycle_enabled: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_app_memory_mb: 1024,
            default_app_disk_mb: 1024,
            default_app_log_rate_limit: -1,
            minimum_app_memory_mb: 1,
            minimum_app_disk_mb: 1,
            maximum_app_disk_mb: 2048,
            minimum_log_rate_limit: -1,
            instance_file_descriptor_limit: 16_384,
            maximum_health_check_timeout_secs: 180,
            default_process_user: "vcap".to_string(),
            default_image_user: "root".to_string(),
            additional_allowed_process_users: Vec::new(),
            image_lifecycle_enabled: true,
        }
    }
}

impl ResolverConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: ResolverConfig = toml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Whether `user` may be set on a process.
    pub fn is_allowed_user(&self, user: &str) -> bool {
        user.eq_ignore_ascii_case(&self.default_process_user)
            || self
                .additional_allowed_process_users
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(user))
    }

    fn check(&self) -> ConfigResult<()> {
        if self.minimum_app_disk_mb > self.maximum_app_disk_mb {
            return Err(ConfigError::Invalid(format!(
                "minimum_app_disk_mb ({}) exceeds maximum_app_disk_mb ({})",
                self.minimum_app_disk_mb, self.maximum_app_disk_mb
            )));
        }
        if self.default_process_user.is_empty() || self.default_image_user.is_empty() {
            return Err(ConfigError::Invalid("default users must not be empty".to_string()));
        }
        Ok(())
    }
}
