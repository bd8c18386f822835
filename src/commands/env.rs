use anyhow::Result;
use owo_colors::OwoColorize;

use crate::cli::GlobalOpts;
use crate::config::secrets::{is_secret_ref, EnvVarStatus};

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn list(global: &GlobalOpts) -> Result<()> {
    let manager = super::manager(global)?;
    let vars = manager.get_env_vars()?;
    if vars.is_empty() {
        println!("  No variables set in {}", manager.workspace().env_file().path().display());
        return Ok(());
    }
    for (key, value) in &vars {
        // Secret references are safe to show; literal values may be tokens.
        let shown = if is_secret_ref(value) {
            value.clone()
        } else if value.is_empty() {
            String::new()
        } else {
            "********".to_string()
        };
        println!("  {}={}", key, shown);
    }
    Ok(())
}

pub fn set(global: &GlobalOpts, key: &str, value: &str) -> Result<()> {
    let manager = super::manager(global)?;
    manager.update_env_var(key, value)?;
    println!("  {} Set {}", "\u{2713}".green(), key);
    Ok(())
}

pub fn set_secret(global: &GlobalOpts, key: &str, secret: &str) -> Result<()> {
    let manager = super::manager(global)?;
    manager.set_env_var_from_secret(key, secret)?;
    println!("  {} {} now reads secret `{}`", "\u{2713}".green(), key, secret);
    Ok(())
}

pub fn status(global: &GlobalOpts, json: bool) -> Result<()> {
    let manager = super::manager(global)?;
    let statuses = manager.get_env_vars_status()?;
    if json {
        return super::print_json(&statuses);
    }

    let mut table = super::table(&["KEY", "SET", "SECRET", "SECRET EXISTS"]);
    for (key, status) in &statuses {
        table.add_row(vec![
            key.clone(),
            yes_no(status.is_set).to_string(),
            secret_label(status),
            if status.is_secret {
                yes_no(status.secret_exists).to_string()
            } else {
                "-".to_string()
            },
        ]);
    }
    println!("{table}");
    Ok(())
}

fn secret_label(status: &EnvVarStatus) -> String {
    status
        .secret_name
        .clone()
        .unwrap_or_else(|| "-".to_string())
}

pub fn required(global: &GlobalOpts, json: bool) -> Result<()> {
    let manager = super::manager(global)?;
    let requirements = manager.get_env_var_requirements()?;
    if json {
        return super::print_json(&requirements);
    }
    if requirements.is_empty() {
        println!("  No enabled tool server requires environment variables.");
        return Ok(());
    }

    let mut table = super::table(&["KEY", "REQUIRED BY", "SET", "SECRET", "SECRET EXISTS"]);
    for req in &requirements {
        table.add_row(vec![
            req.key.clone(),
            req.required_by.join(", "),
            yes_no(req.is_set).to_string(),
            yes_no(req.is_secret).to_string(),
            if req.is_secret {
                yes_no(req.secret_exists).to_string()
            } else {
                "-".to_string()
            },
        ]);
    }
    println!("{table}");

    let missing = requirements
        .iter()
        .filter(|r| !r.is_set || (r.is_secret && !r.secret_exists))
        .count();
    if missing > 0 {
        println!("  {} {} variable(s) still need a value", "!".yellow(), missing);
    }
    Ok(())
}
