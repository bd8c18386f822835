//! Add, update, remove and toggle tool-server entries in the manifest.

use tracing::info;

use crate::config::envfile;
use crate::config::model::{HubManifest, ServiceEntry};
use crate::config::workspace::Workspace;
use crate::error::{HubError, Result};

/// Minimum Jaro-Winkler score to suggest a server name on a miss.
const NAME_SUGGESTION_THRESHOLD: f64 = 0.8;

fn closest_name<'a>(name: &str, manifest: &'a HubManifest) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;
    for key in manifest.tool_servers.keys() {
        let score = strsim::jaro_winkler(name, key);
        if score >= NAME_SUGGESTION_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((key.as_str(), score));
        }
    }
    best.map(|(name, _)| name)
}

fn not_found(name: &str, manifest: &HubManifest) -> HubError {
    HubError::ServerNotFound {
        name: name.to_string(),
        suggestion: closest_name(name, manifest).map(String::from),
    }
}

/// One past the highest tool-server port, or `start_port` when none are set.
pub fn next_available_port(manifest: &HubManifest, start_port: u16) -> u16 {
    manifest
        .tool_servers
        .values()
        .map(|e| e.port)
        .filter(|p| *p != 0)
        .max()
        .map(|max| max.saturating_add(1).max(start_port))
        .unwrap_or(start_port)
}

fn ensure_env_placeholders(workspace: &Workspace, name: &str, entry: &ServiceEntry) -> Result<()> {
    if entry.env_vars.is_empty() {
        return Ok(());
    }
    let added = workspace
        .env_file()
        .ensure_placeholders(&entry.env_vars, name)?;
    if !added.is_empty() {
        info!(server = %name, keys = ?added, "added env placeholders");
    }
    Ok(())
}

fn check_env_keys(entry: &ServiceEntry) -> Result<()> {
    entry
        .env_vars
        .iter()
        .try_for_each(|key| envfile::validate_env_key(key))
}

fn check_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(HubError::InvalidConfig(format!(
            "server name `{name}` must be non-empty and contain only letters, digits, '-' or '_'"
        )))
    }
}

/// Add a new tool server. A zero port is assigned the next free port.
pub fn add_server(
    workspace: &Workspace,
    name: &str,
    mut entry: ServiceEntry,
    start_port: u16,
) -> Result<ServiceEntry> {
    check_name(name)?;
    check_env_keys(&entry)?;
    let mut manifest = workspace.load_manifest()?;
    if manifest.tool_servers.contains_key(name) {
        return Err(HubError::ServerExists(name.to_string()));
    }
    if entry.port == 0 {
        entry.port = next_available_port(&manifest, start_port);
    }

    manifest.tool_servers.insert(name.to_string(), entry.clone());
    workspace.save_manifest(&manifest)?;
    ensure_env_placeholders(workspace, name, &entry)?;

    info!(server = %name, port = entry.port, "added tool server");
    Ok(entry)
}

/// Replace a tool server's entry. Fields left unset in `update` keep their
/// existing values: port, supergateway command, health endpoint, serve dir,
/// labels, readiness probe and the enabled flag.
pub fn update_server(workspace: &Workspace, name: &str, update: ServiceEntry) -> Result<ServiceEntry> {
    check_env_keys(&update)?;
    let mut manifest = workspace.load_manifest()?;
    let existing = manifest
        .tool_servers
        .get(name)
        .ok_or_else(|| not_found(name, &manifest))?;

    let merged = ServiceEntry {
        enabled: update.enabled.or(existing.enabled),
        port: if update.port == 0 { existing.port } else { update.port },
        supergateway_command: update
            .supergateway_command
            .or_else(|| existing.supergateway_command.clone()),
        health_endpoint: update
            .health_endpoint
            .or_else(|| existing.health_endpoint.clone()),
        serve_dir: update.serve_dir.or_else(|| existing.serve_dir.clone()),
        labels: if update.labels.is_empty() {
            existing.labels.clone()
        } else {
            update.labels
        },
        readiness_probe: update
            .readiness_probe
            .or_else(|| existing.readiness_probe.clone()),
        command: update.command,
        description: update.description,
        env_vars: update.env_vars,
    };

    manifest.tool_servers.insert(name.to_string(), merged.clone());
    workspace.save_manifest(&manifest)?;
    ensure_env_placeholders(workspace, name, &merged)?;

    info!(server = %name, "updated tool server");
    Ok(merged)
}

pub fn remove_server(workspace: &Workspace, name: &str) -> Result<ServiceEntry> {
    let mut manifest = workspace.load_manifest()?;
    let removed = manifest
        .tool_servers
        .remove(name)
        .ok_or_else(|| not_found(name, &manifest))?;
    workspace.save_manifest(&manifest)?;
    info!(server = %name, "removed tool server");
    Ok(removed)
}

/// Set the enabled flag explicitly. Returns the new value.
pub fn toggle_server(workspace: &Workspace, name: &str, enabled: bool) -> Result<bool> {
    let mut manifest = workspace.load_manifest()?;
    if !manifest.tool_servers.contains_key(name) {
        return Err(not_found(name, &manifest));
    }
    if let Some(entry) = manifest.tool_servers.get_mut(name) {
        entry.enabled = Some(enabled);
    }
    workspace.save_manifest(&manifest)?;
    info!(server = %name, enabled, "toggled tool server");
    Ok(enabled)
}
