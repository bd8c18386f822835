use anyhow::Result;
use comfy_table::Cell;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::cli::GlobalOpts;
use crate::orchestrator::state::{EndpointStatus, HubSnapshot, HubStatus};

pub async fn run(global: &GlobalOpts, json: bool) -> Result<()> {
    let manager = super::manager(global)?;
    let snapshot = manager.hub_status().await?;

    if json {
        return super::print_json(&snapshot);
    }
    print_snapshot(&snapshot);
    Ok(())
}

fn print_snapshot(snapshot: &HubSnapshot) {
    let color = std::io::stdout().is_terminal();
    let state = if snapshot.running {
        HubStatus::Running
    } else {
        snapshot.status
    };
    let label = match (color, state) {
        (false, s) => s.to_string(),
        (true, HubStatus::Running) => format!("{}", state.as_str().green()),
        (true, HubStatus::Error) => format!("{}", state.as_str().red()),
        (true, _) => format!("{}", state.as_str().dimmed()),
    };

    println!("  Hub:        {}", label);
    println!("  Workspace:  {}", snapshot.workspace_dir.display());
    println!(
        "  Ports:      control plane {}, proxy {}, admin {}",
        snapshot.ports.control_plane, snapshot.ports.proxy, snapshot.ports.admin_api
    );
    println!();

    if snapshot.endpoints.is_empty() {
        println!("  No services configured. Run `toolhub init` to create a workspace.");
        return;
    }

    let mut table = super::table(&["SERVICE", "KIND", "PORT", "URL", "STATUS"]);
    for endpoint in &snapshot.endpoints {
        let status = endpoint.status.as_str();
        let status = if color {
            match endpoint.status {
                EndpointStatus::Running => format!("{}", status.green()),
                EndpointStatus::Error => format!("{}", status.red()),
                EndpointStatus::Disabled | EndpointStatus::Unknown => {
                    format!("{}", status.dimmed())
                }
            }
        } else {
            status.to_string()
        };
        table.add_row(vec![
            Cell::new(&endpoint.name),
            Cell::new(endpoint.kind),
            Cell::new(endpoint.port),
            Cell::new(&endpoint.url),
            Cell::new(status),
        ]);
    }
    println!("{table}");
}
