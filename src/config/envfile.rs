use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{HubError, Result};

pub const MAX_KEY_LEN: usize = 128;
pub const MAX_VALUE_LEN: usize = 4096;

static ENV_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("valid regex"));

pub fn validate_env_key(key: &str) -> Result<()> {
    let invalid = |reason: &str| HubError::InvalidEnvKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid(&format!("longer than {MAX_KEY_LEN} characters")));
    }
    if !ENV_KEY_RE.is_match(key) {
        return Err(invalid(
            "must start with A-Z and contain only A-Z, 0-9 and underscores",
        ));
    }
    Ok(())
}

pub fn validate_env_value(key: &str, value: &str) -> Result<()> {
    let invalid = |reason: String| HubError::InvalidEnvValue {
        key: key.to_string(),
        reason,
    };
    if value.len() > MAX_VALUE_LEN {
        return Err(invalid(format!("longer than {MAX_VALUE_LEN} bytes")));
    }
    if let Some(c) = value.chars().find(|c| matches!(c, '\n' | '\r' | '\0')) {
        return Err(invalid(format!("contains forbidden character {:?}", c)));
    }
    Ok(())
}

/// Parse `.env` content. Malformed lines and invalid keys are dropped.
pub fn parse_env_content(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if validate_env_key(key).is_err() {
            debug!(key, "skipping .env line with invalid key");
            continue;
        }

        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    vars
}

/// Strip one layer of matching single or double quotes.
fn unquote(value: &str) -> &str {
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Render a value so that `parse_env_content` reads back exactly `value`.
fn quote_if_needed(value: &str) -> String {
    if unquote(value.trim()) == value {
        value.to_string()
    } else {
        format!("\"{value}\"")
    }
}

/// Key of an assignment line, active or commented out (`# KEY=...`).
fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let body = trimmed
        .strip_prefix('#')
        .map(str::trim_start)
        .unwrap_or(trimmed);
    let (key, _) = body.split_once('=')?;
    let key = key.trim();
    ENV_KEY_RE.is_match(key).then_some(key)
}

/// The workspace `.env` file. Values may be literals or `@secret:` refs.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all active assignments. A missing file is an empty map.
    pub fn read(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(parse_env_content(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(HubError::io(
                format!("reading {}", self.path.display()),
                e,
            )),
        }
    }

    fn read_raw(&self) -> Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(HubError::io(
                format!("reading {}", self.path.display()),
                e,
            )),
        }
    }

    /// Set `key` to `value`, replacing the existing (or commented-out) line
    /// for that key, else appending. Nothing is written if validation fails.
    pub fn update(&self, key: &str, value: &str) -> Result<()> {
        validate_env_key(key)?;
        validate_env_value(key, value)?;

        let content = self.read_raw()?;
        let assignment = format!("{key}={}", quote_if_needed(value));

        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let existing = lines
            .iter()
            .position(|l| !l.trim_start().starts_with('#') && line_key(l) == Some(key))
            .or_else(|| lines.iter().position(|l| line_key(l) == Some(key)));

        match existing {
            Some(idx) => lines[idx] = assignment,
            None => lines.push(assignment),
        }

        self.write_lines(&lines)?;
        debug!(key, path = %self.path.display(), "updated env var");
        Ok(())
    }

    /// Append commented placeholders for keys that have neither a value nor
    /// a placeholder yet. Returns the keys that were added.
    pub fn ensure_placeholders(&self, keys: &[String], required_by: &str) -> Result<Vec<String>> {
        let content = self.read_raw()?;
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let mut added = Vec::new();

        for key in keys {
            validate_env_key(key)?;
            if lines.iter().any(|l| line_key(l) == Some(key.as_str())) {
                continue;
            }
            lines.push(format!("# {key}=  # required by {required_by}"));
            added.push(key.clone());
        }

        if !added.is_empty() {
            self.write_lines(&lines)?;
        }
        Ok(added)
    }

    /// Create the file with a short header if it does not exist.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.write_lines(&[
            "# toolhub environment".to_string(),
            "# Values may reference stored secrets as @secret:<name>".to_string(),
        ])
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        let mut content = lines.join("\n");
        content.push('\n');
        write_private(&self.path, &content)
    }
}

/// Whole-file atomic write (tmp + rename) readable only by the owner.
pub(crate) fn write_private(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    let io_err = |e| HubError::io(format!("writing {}", path.display()), e);

    {
        use std::io::Write;
        let mut opts = std::fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = opts.open(&tmp_path).map_err(io_err)?;
        file.write_all(content.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }

    std::fs::rename(&tmp_path, path).map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(io_err)?;
    }
    Ok(())
}
