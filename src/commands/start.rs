use std::time::Duration;

use anyhow::{bail, Result};
use owo_colors::OwoColorize;
use tracing::info;

use crate::cli::GlobalOpts;
use crate::error::HubError;
use crate::orchestrator::state::{Endpoint, HubStatus};
use crate::ui::logs::LogWriter;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Run the hub in the foreground until Ctrl-C or until it dies.
pub async fn run(global: &GlobalOpts, quiet: bool, tail: usize) -> Result<()> {
    let manager = super::manager(global)?;

    let printer = (!quiet).then(|| tokio::spawn(LogWriter::new(manager.subscribe_logs()).run()));

    if let Err(e) = manager.start().await {
        if let Some(printer) = printer {
            printer.abort();
        }
        return Err(e.into());
    }

    let ports = manager.ports();
    println!(
        "  {} hub starting (control plane http://localhost:{})",
        "\u{25b6}".cyan(),
        ports.control_plane
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut announced = false;
    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupt received, stopping hub");
                break Ok(());
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                match manager.status() {
                    HubStatus::Running if !announced => {
                        announced = true;
                        println!("  {} hub running", "\u{2713}".green());
                        if let Ok(endpoints) = manager.endpoints() {
                            print_endpoints(&endpoints);
                        }
                    }
                    HubStatus::Error => break Err(()),
                    _ => {}
                }
            }
        }
    };

    if let Some(printer) = printer {
        printer.abort();
    }

    match outcome {
        Ok(()) => {
            match manager.stop().await {
                Ok(()) | Err(HubError::NotRunning) => {}
                Err(e) => return Err(e.into()),
            }
            println!("  {} hub stopped", "\u{25a0}".dimmed());
            Ok(())
        }
        Err(()) => {
            if quiet {
                for line in manager.get_logs(tail) {
                    eprintln!("{}", line.render_plain());
                }
            }
            bail!("hub exited unexpectedly")
        }
    }
}

fn print_endpoints(endpoints: &[Endpoint]) {
    let mut table = super::table(&["SERVICE", "KIND", "URL"]);
    for endpoint in endpoints.iter().filter(|e| e.enabled) {
        table.add_row(vec![
            endpoint.name.clone(),
            endpoint.kind.to_string(),
            endpoint.url.clone(),
        ]);
    }
    println!("{table}");
}
