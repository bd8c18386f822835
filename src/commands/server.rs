use anyhow::Result;
use owo_colors::OwoColorize;

use crate::cli::{GlobalOpts, ServerFields};
use crate::config::defaults::supergateway_template;
use crate::config::model::ServiceEntry;

const DEFAULT_HEALTH_ENDPOINT: &str = "/healthz";

fn entry_from(fields: ServerFields) -> ServiceEntry {
    let supergateway_command = fields
        .supergateway_command
        .or_else(|| fields.command.as_deref().map(supergateway_template));
    ServiceEntry {
        enabled: fields.disabled.then_some(false),
        port: fields.port.unwrap_or(0),
        command: fields.command,
        supergateway_command,
        health_endpoint: fields.health_endpoint,
        description: fields.description,
        serve_dir: fields.serve_dir,
        readiness_probe: None,
        labels: fields.labels,
        env_vars: fields.env_vars,
    }
}

pub fn list(global: &GlobalOpts, json: bool) -> Result<()> {
    let manager = super::manager(global)?;
    let endpoints = manager.endpoints()?;
    if json {
        return super::print_json(&endpoints);
    }

    let mut table = super::table(&["NAME", "KIND", "PORT", "ENABLED", "URL", "DESCRIPTION"]);
    for endpoint in &endpoints {
        table.add_row(vec![
            endpoint.name.clone(),
            endpoint.kind.to_string(),
            endpoint.port.to_string(),
            if endpoint.enabled { "yes" } else { "no" }.to_string(),
            endpoint.url.clone(),
            endpoint.description.clone().unwrap_or_default(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn add(global: &GlobalOpts, name: &str, fields: ServerFields) -> Result<()> {
    let manager = super::manager(global)?;
    let mut entry = entry_from(fields);
    if entry.health_endpoint.is_none() {
        entry.health_endpoint = Some(DEFAULT_HEALTH_ENDPOINT.to_string());
    }
    let added = manager.add_server(name, entry)?;
    println!(
        "  {} Added {} on port {}",
        "\u{2713}".green(),
        name,
        added.port
    );
    print_missing_env(&added);
    Ok(())
}

pub fn update(global: &GlobalOpts, name: &str, fields: ServerFields) -> Result<()> {
    let manager = super::manager(global)?;
    let updated = manager.update_server(name, entry_from(fields))?;
    println!(
        "  {} Updated {} (port {})",
        "\u{2713}".green(),
        name,
        updated.port
    );
    print_missing_env(&updated);
    Ok(())
}

pub fn remove(global: &GlobalOpts, name: &str) -> Result<()> {
    let manager = super::manager(global)?;
    manager.remove_server(name)?;
    println!("  {} Removed {}", "\u{2713}".green(), name);
    Ok(())
}

pub fn toggle(global: &GlobalOpts, name: &str, enabled: bool) -> Result<()> {
    let manager = super::manager(global)?;
    let enabled = manager.toggle_server(name, enabled)?;
    println!(
        "  {} {} {}",
        "\u{2713}".green(),
        name,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

fn print_missing_env(entry: &ServiceEntry) {
    if entry.env_vars.is_empty() {
        return;
    }
    println!(
        "  Requires: {} (set with `toolhub env set` or `toolhub env secret`)",
        entry.env_vars.join(", ")
    );
}
