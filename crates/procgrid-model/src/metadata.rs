//! Droplet execution metadata.
//!
//! The build pipeline records what it learned about an artifact (image
//! entrypoint, image user, exposed ports, detected commands) as a small JSON
//! document. The document is untrusted: it may be missing, empty, not JSON,
//! or JSON of the wrong shape. Parsing never fails; anything unusable is
//! dropped and the caller sees the defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A port an image declares, as recorded by the build pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedPort {
    pub port: u16,
    pub protocol: String,
}

impl ExposedPort {
    pub fn is_tcp(&self) -> bool {
        self.protocol.eq_ignore_ascii_case("tcp")
    }
}

/// Parsed view of a droplet's execution metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub entrypoint: Vec<String>,
    pub user: Option<String>,
    pub ports: Vec<ExposedPort>,
    pub process_types: BTreeMap<String, String>,
}

impl ExecutionMetadata {
    /// Parse a raw metadata document, falling back to defaults.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Self::default();
        };

        let document: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "execution metadata is not valid JSON, using defaults");
                return Self::default();
            }
        };

        let Value::Object(fields) = document else {
            debug!("execution metadata is not a JSON object, using defaults");
            return Self::default();
        };

        Self {
            entrypoint: fields
                .get("entrypoint")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            user: fields
                .get("user")
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            ports: fields
                .get("ports")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(parse_exposed_port).collect())
                .unwrap_or_default(),
            process_types: fields
                .get("process_types")
                .and_then(Value::as_object)
                .map(|types| {
                    types
                        .iter()
                        .filter_map(|(name, cmd)| Some((name.clone(), cmd.as_str()?.to_string())))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// TCP ports the image exposes, ascending, duplicates kept.
    pub fn tcp_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .ports
            .iter()
            .filter(|p| p.is_tcp())
            .map(|p| p.port)
            .collect();
        ports.sort();
        ports
    }
}

/// Accepts `{"port": N, "protocol": "tcp"}` and the capitalized image-config
/// spelling `{"Port": N, "Protocol": "tcp"}`.
fn parse_exposed_port(entry: &Value) -> Option<ExposedPort> {
    let fields = entry.as_object()?;
    let port = fields.get("port").or_else(|| fields.get("Port"))?.as_u64()?;
    let protocol = fields
        .get("protocol")
        .or_else(|| fields.get("Protocol"))?
        .as_str()?;

    let port = u16::try_from(port).ok().filter(|p| *p != 0)?;
    Some(ExposedPort {
        port,
        protocol: protocol.to_string(),
    })
}
