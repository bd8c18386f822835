use std::path::PathBuf;

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::cli::GlobalOpts;
use crate::config::resolve::resolve_workspace;
use crate::error::HubError;
use crate::orchestrator::discovery::find_executable;
use crate::orchestrator::ports::{check_port_available, cleanup_stale_instance, identify_port_owner};

/// Tear down a hub started by another `toolhub start` (or left behind by a
/// crashed one). The foreground session owns its own shutdown on Ctrl-C.
pub async fn run(global: &GlobalOpts) -> Result<()> {
    let dir = resolve_workspace(global.workspace.as_deref())?;
    let settings = global.settings(dir);
    let port = settings.ports.control_plane;

    if check_port_available(port) {
        println!("  No hub is listening on port {}.", port);
        return Ok(());
    }

    let orchestrator = find_executable(&settings.orchestrator_bin)
        .unwrap_or_else(|| PathBuf::from(&settings.orchestrator_bin));
    cleanup_stale_instance(
        &orchestrator,
        &settings.workspace_dir,
        settings.timings.teardown_timeout,
        settings.timings.cleanup_settle,
    )
    .await;

    if !check_port_available(port) {
        let owner = identify_port_owner(port)
            .map(|o| format!(" by {o}"))
            .unwrap_or_default();
        return Err(HubError::StopFailed(format!("port {port} is still in use{owner}")).into());
    }

    println!("  {} hub stopped", "\u{2713}".green());
    Ok(())
}
