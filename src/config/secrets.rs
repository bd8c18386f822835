use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};

/// Prefix marking an env value as an indirection into the secret store.
pub const SECRET_PREFIX: &str = "@secret:";

pub fn is_secret_ref(value: &str) -> bool {
    value.starts_with(SECRET_PREFIX)
}

/// Name of the referenced secret, if `value` is a secret reference.
pub fn secret_name(value: &str) -> Option<&str> {
    value.strip_prefix(SECRET_PREFIX)
}

pub fn secret_ref(name: &str) -> String {
    format!("{SECRET_PREFIX}{name}")
}

// ---------------------------------------------------------------------------
// SecretStore — the external collaborator
// ---------------------------------------------------------------------------

/// Lookup of named secrets. `Ok(None)` means the secret does not exist;
/// `Err` means the store itself could not be consulted.
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, name: &str) -> AnyResult<Option<String>>;
}

/// In-process store, used for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<BTreeMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secrets<I, K, V>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            secrets: RwLock::new(
                secrets
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn insert(&self, name: &str, value: &str) {
        if let Ok(mut secrets) = self.secrets.write() {
            secrets.insert(name.to_string(), value.to_string());
        }
    }
}

impl SecretStore for MemorySecretStore {
    fn get_secret(&self, name: &str) -> AnyResult<Option<String>> {
        let secrets = self
            .secrets
            .read()
            .map_err(|_| anyhow::anyhow!("secret store lock poisoned"))?;
        Ok(secrets.get(name).cloned())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretFile {
    #[serde(default)]
    secrets: BTreeMap<String, String>,
}

/// JSON-file store under the user's config directory, owner-readable only.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_CONFIG_HOME/toolhub/secrets.json` (or the platform equivalent).
    pub fn default_location() -> AnyResult<Self> {
        let dir = dirs::config_dir().context("no user config directory available")?;
        Ok(Self::new(dir.join("toolhub").join("secrets.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> AnyResult<SecretFile> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SecretFile::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    fn save(&self, file: &SecretFile) -> AnyResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(file)?;
        super::envfile::write_private(&self.path, &content)?;
        Ok(())
    }

    pub fn set(&self, name: &str, value: &str) -> AnyResult<()> {
        let mut file = self.load()?;
        file.secrets.insert(name.to_string(), value.to_string());
        self.save(&file)
    }

    /// Returns whether a secret was removed.
    pub fn delete(&self, name: &str) -> AnyResult<bool> {
        let mut file = self.load()?;
        let removed = file.secrets.remove(name).is_some();
        if removed {
            self.save(&file)?;
        }
        Ok(removed)
    }

    pub fn list(&self) -> AnyResult<Vec<String>> {
        Ok(self.load()?.secrets.into_keys().collect())
    }
}

impl SecretStore for FileSecretStore {
    fn get_secret(&self, name: &str) -> AnyResult<Option<String>> {
        Ok(self.load()?.secrets.get(name).cloned())
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Outcome of resolving a whole env map. Partial success is normal: one
/// missing secret must not keep the other services from launching.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolvedEnv {
    pub vars: BTreeMap<String, String>,
    /// Keys whose secret reference could not be resolved, sorted.
    pub unresolved: Vec<String>,
}

/// Redacted view of one env var. Never carries the literal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarStatus {
    pub is_set: bool,
    pub is_secret: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    pub secret_exists: bool,
}

pub struct SecretResolver<'a> {
    store: &'a dyn SecretStore,
}

impl<'a> SecretResolver<'a> {
    pub fn new(store: &'a dyn SecretStore) -> Self {
        Self { store }
    }

    /// Resolve one value. Plain values pass through unchanged; a reference
    /// resolves to `Ok(None)` when the secret does not exist.
    pub fn resolve_ref(&self, value: &str) -> Result<Option<String>> {
        match secret_name(value) {
            None => Ok(Some(value.to_string())),
            Some(name) => self.store.get_secret(name).map_err(HubError::SecretStore),
        }
    }

    pub fn resolve_env_vars(&self, vars: &BTreeMap<String, String>) -> ResolvedEnv {
        let mut resolved = ResolvedEnv::default();
        for (key, value) in vars {
            match self.resolve_ref(value) {
                Ok(Some(v)) => {
                    resolved.vars.insert(key.clone(), v);
                }
                Ok(None) => resolved.unresolved.push(key.clone()),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "secret lookup failed");
                    resolved.unresolved.push(key.clone());
                }
            }
        }
        resolved
    }

    pub fn env_vars_status(&self, vars: &BTreeMap<String, String>) -> BTreeMap<String, EnvVarStatus> {
        vars.iter()
            .map(|(key, value)| (key.clone(), self.status_of(Some(value))))
            .collect()
    }

    /// Status for a possibly-missing value.
    pub fn status_of(&self, value: Option<&str>) -> EnvVarStatus {
        let Some(value) = value else {
            return EnvVarStatus {
                is_set: false,
                is_secret: false,
                secret_name: None,
                secret_exists: false,
            };
        };
        match secret_name(value) {
            Some(name) => EnvVarStatus {
                is_set: true,
                is_secret: true,
                secret_name: Some(name.to_string()),
                secret_exists: matches!(self.store.get_secret(name), Ok(Some(_))),
            },
            None => EnvVarStatus {
                is_set: !value.is_empty(),
                is_secret: false,
                secret_name: None,
                secret_exists: false,
            },
        }
    }
}
