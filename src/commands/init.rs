use anyhow::Result;
use owo_colors::OwoColorize;

use crate::cli::GlobalOpts;
use crate::config::defaults::{default_manifest, merge_manifests};
use crate::config::settings::PortConfig;

pub fn run(global: &GlobalOpts, merge_defaults: bool) -> Result<()> {
    let workspace = super::workspace(global)?;
    let ports = global.ports.apply(PortConfig::default());

    let created = workspace.init(&ports)?;
    if created {
        println!(
            "  {} Created {}",
            "\u{2713}".green(),
            workspace.manifest_path().display()
        );
    } else if merge_defaults {
        let user = workspace.load_manifest()?;
        let merged = merge_manifests(&default_manifest(&ports), &user);
        let added = merged.entries().count() - user.entries().count();
        if added > 0 {
            workspace.save_manifest(&merged)?;
        }
        println!(
            "  {} Merged defaults into {} ({} service(s) added)",
            "\u{2713}".green(),
            workspace.manifest_path().display(),
            added
        );
    } else {
        println!(
            "  {} already exists (use --merge-defaults to add missing default services)",
            workspace.manifest_path().display()
        );
    }

    println!();
    println!("  Next steps:");
    println!("    toolhub doctor         check required binaries and ports");
    println!("    toolhub env required   see which variables tool servers need");
    println!("    toolhub start          run the hub");
    Ok(())
}
