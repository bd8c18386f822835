use anyhow::Result;
use std::process::Command;

use crate::cli::GlobalOpts;
use crate::config::resolve::resolve_workspace;
use crate::orchestrator::discovery::find_executable;
use crate::orchestrator::ports::{check_port_available, identify_port_owner};

pub fn run(global: &GlobalOpts) -> Result<()> {
    println!("toolhub doctor");
    println!("==============");
    println!();

    let dir = resolve_workspace(global.workspace.as_deref())?;
    let settings = global.settings(dir);

    let mut all_ok = true;

    println!("  Binaries");
    let binaries = [
        (settings.orchestrator_bin.as_str(), true),
        (settings.proxy_bin.as_str(), true),
        ("npx", false),
    ];
    for (name, required) in binaries {
        match find_executable(name) {
            Some(path) => {
                let version = binary_version(&path).unwrap_or_else(|| path.display().to_string());
                println!("  [ok] {:<16} {}", name, version);
            }
            None if required => {
                println!("  [!!] {:<16} not found", name);
                all_ok = false;
            }
            None => println!("  [--] {:<16} not found (needed by the default tool servers)", name),
        }
    }

    println!();
    println!("  Ports");
    let ports = [
        ("control plane", settings.ports.control_plane),
        ("proxy", settings.ports.proxy),
        ("admin api", settings.ports.admin_api),
        ("inspector ui", settings.ports.inspector_ui),
        ("inspector proxy", settings.ports.inspector_proxy),
    ];
    for (label, port) in ports {
        if check_port_available(port) {
            println!("  [ok] {:<16} {} free", label, port);
        } else {
            let owner = identify_port_owner(port)
                .map(|o| format!(" by {o}"))
                .unwrap_or_default();
            println!("  [!!] {:<16} {} in use{}", label, port, owner);
            all_ok = false;
        }
    }

    println!();
    println!("  Workspace");
    let workspace = crate::config::workspace::Workspace::new(&settings.workspace_dir);
    if workspace.exists() {
        println!("  [ok] {}", workspace.manifest_path().display());
    } else {
        println!(
            "  [!!] {} missing (run `toolhub init`)",
            workspace.manifest_path().display()
        );
        all_ok = false;
    }

    println!();
    if all_ok {
        println!("Everything looks good.");
    } else {
        println!("Some checks failed. A running hub holds its own ports, so stop it before re-checking.");
    }

    Ok(())
}

fn binary_version(path: &std::path::Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    // Some tools print their version to stderr.
    let text = if stdout.trim().is_empty() {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        stdout.to_string()
    };
    text.lines().next().map(|l| l.trim().to_string())
}
