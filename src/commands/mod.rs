pub mod doctor;
pub mod env;
pub mod init;
pub mod secret;
pub mod server;
pub mod start;
pub mod status;
pub mod stop;
pub mod validate;

use std::sync::Arc;

use anyhow::Result;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};

use crate::cli::GlobalOpts;
use crate::config::resolve::resolve_workspace;
use crate::config::secrets::FileSecretStore;
use crate::config::workspace::Workspace;
use crate::orchestrator::HubManager;

pub(crate) fn workspace(global: &GlobalOpts) -> Result<Workspace> {
    Ok(Workspace::new(resolve_workspace(global.workspace.as_deref())?))
}

pub(crate) fn secret_store(global: &GlobalOpts) -> Result<FileSecretStore> {
    match &global.secrets_file {
        Some(path) => Ok(FileSecretStore::new(path.clone())),
        None => FileSecretStore::default_location(),
    }
}

pub(crate) fn manager(global: &GlobalOpts) -> Result<HubManager> {
    let dir = resolve_workspace(global.workspace.as_deref())?;
    let store = secret_store(global)?;
    Ok(HubManager::new(global.settings(dir), Arc::new(store)))
}

pub(crate) fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.to_vec());
    table
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
