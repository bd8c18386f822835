use std::io::Read;

use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;

use crate::cli::GlobalOpts;
use crate::error::HubError;

pub fn set(global: &GlobalOpts, name: &str, value: Option<String>) -> Result<()> {
    let value = match value {
        Some(v) => v,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading secret value from stdin")?;
            buf.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if value.is_empty() {
        bail!("secret value for `{name}` is empty");
    }

    let store = super::secret_store(global)?;
    store.set(name, &value)?;
    println!("  {} Stored secret `{}`", "\u{2713}".green(), name);
    Ok(())
}

pub fn delete(global: &GlobalOpts, name: &str) -> Result<()> {
    let store = super::secret_store(global)?;
    if !store.delete(name)? {
        return Err(HubError::SecretNotFound(name.to_string()).into());
    }
    println!("  {} Deleted secret `{}`", "\u{2713}".green(), name);
    Ok(())
}

pub fn list(global: &GlobalOpts) -> Result<()> {
    let store = super::secret_store(global)?;
    let names = store.list()?;
    if names.is_empty() {
        println!("  No secrets stored in {}", store.path().display());
        return Ok(());
    }
    for name in names {
        println!("  {}", name);
    }
    Ok(())
}
