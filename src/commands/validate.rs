use anyhow::{bail, Result};
use owo_colors::OwoColorize;

use crate::cli::GlobalOpts;
use crate::config::validate::validate_manifest;

pub fn run(global: &GlobalOpts) -> Result<()> {
    let workspace = super::workspace(global)?;
    let manifest = workspace.load_manifest()?;
    let path = workspace.manifest_path();

    match validate_manifest(&manifest) {
        Ok(()) => {
            println!(
                "  {} {} is valid ({} infrastructure, {} tool servers, {} tools)",
                "\u{2713}".green(),
                path.display(),
                manifest.infrastructure.len(),
                manifest.tool_servers.len(),
                manifest.tools.len(),
            );
            Ok(())
        }
        Err(errors) => {
            for err in &errors {
                eprintln!("  {} {}", "\u{2717}".red(), err);
            }
            bail!("{} has {} problem(s)", path.display(), errors.len())
        }
    }
}
