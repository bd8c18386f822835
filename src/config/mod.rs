pub mod defaults;
pub mod envfile;
pub mod model;
pub mod resolve;
pub mod secrets;
pub mod servers;
pub mod settings;
pub mod validate;
pub mod workspace;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{HubError, Result};
use model::HubManifest;

/// URL namespace under which the proxy exposes tool servers.
pub const ENDPOINT_NAMESPACE: &str = "mcp";
/// Trailing protocol segment of every tool-server URL.
pub const ENDPOINT_PROTOCOL: &str = "mcp";

/// Load a manifest. An empty file is an empty manifest.
pub fn load_manifest(path: &Path) -> Result<HubManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            HubError::WorkspaceNotFound(path.parent().unwrap_or(path).to_path_buf())
        } else {
            HubError::io(format!("reading {}", path.display()), e)
        }
    })?;
    if content.trim().is_empty() {
        return Ok(HubManifest::default());
    }
    serde_yaml::from_str(&content).map_err(|source| HubError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Validate and atomically write a manifest.
pub fn save_manifest(path: &Path, manifest: &HubManifest) -> Result<()> {
    if let Err(mut errors) = validate::validate_manifest(manifest) {
        return Err(errors.remove(0));
    }
    let content = serde_yaml::to_string(manifest)
        .map_err(|e| HubError::ConfigGeneration(e.to_string()))?;
    envfile::write_private(path, &content)
}

/// Deterministic URL for a tool server behind the proxy.
pub fn endpoint_url(proxy_port: u16, service_name: &str) -> String {
    format!("http://localhost:{proxy_port}/{ENDPOINT_NAMESPACE}/{service_name}/{ENDPOINT_PROTOCOL}")
}

/// Env vars required by enabled tool servers: key → servers needing it.
pub fn required_env_vars(manifest: &HubManifest) -> BTreeMap<String, Vec<String>> {
    let mut required: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, entry) in &manifest.tool_servers {
        if !entry.is_enabled() {
            continue;
        }
        for key in &entry.env_vars {
            required.entry(key.clone()).or_default().push(name.clone());
        }
    }
    required
}
