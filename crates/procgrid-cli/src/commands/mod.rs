use std::path::Path;

use anyhow::Context;
use procgrid_model::ResolverConfig;
use procgrid_resolver::ProcessSnapshot;
use tracing::debug;

pub mod desire;
pub mod ports;
pub mod validate;

pub fn load_config(path: Option<&str>) -> anyhow::Result<ResolverConfig> {
    match path {
        Some(path) => {
            let config = ResolverConfig::from_file(Path::new(path))
                .with_context(|| format!("loading config from {path}"))?;
            debug!(%path, "loaded resolver config");
            Ok(config)
        }
        None => Ok(ResolverConfig::default()),
    }
}

pub fn load_snapshot(path: &str) -> anyhow::Result<ProcessSnapshot> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading snapshot {path}"))?;
    let snapshot = serde_json::from_str(&content).with_context(|| format!("parsing snapshot {path}"))?;
    Ok(snapshot)
}
