use std::collections::BTreeMap;

use crate::config::model::HubManifest;
use crate::error::HubError;

/// Check that no two services share a port. Entries without a port (0) are
/// ignored. Returns every conflict, ordered by port.
pub fn validate_manifest(manifest: &HubManifest) -> Result<(), Vec<HubError>> {
    let mut by_port: BTreeMap<u16, Vec<String>> = BTreeMap::new();
    for (kind, name, entry) in manifest.entries() {
        if entry.port == 0 {
            continue;
        }
        by_port
            .entry(entry.port)
            .or_default()
            .push(format!("{kind}:{name}"));
    }

    let errors: Vec<HubError> = by_port
        .into_iter()
        .filter(|(_, services)| services.len() > 1)
        .map(|(port, services)| HubError::DuplicatePort { port, services })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
