use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the hub supervisor and its configuration layer.
///
/// Variants are matched by callers (the CLI, an RPC layer) to decide what
/// to show the user, so they stay flat and carry only plain data.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("required binary `{binary}` was not found on PATH or in common install locations")]
    MissingPrerequisite { binary: String },

    #[error("hub is already running")]
    AlreadyRunning,

    #[error("hub is not running")]
    NotRunning,

    #[error("failed to start hub: {0}")]
    StartFailed(String),

    #[error("failed to stop hub: {0}")]
    StopFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("workspace not found at {} (run `toolhub init` first)", .0.display())]
    WorkspaceNotFound(PathBuf),

    #[error("failed to initialise workspace {}: {source}", path.display())]
    WorkspaceInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("port {port} is already in use{}", owner.as_ref().map(|o| format!(" by {o}")).unwrap_or_default())]
    PortInUse { port: u16, owner: Option<String> },

    #[error("failed to generate configuration: {0}")]
    ConfigGeneration(String),

    #[error("server `{name}` not found{}", suggestion.as_ref().map(|s| format!(" (did you mean `{s}`?)")).unwrap_or_default())]
    ServerNotFound {
        name: String,
        suggestion: Option<String>,
    },

    #[error("server `{0}` already exists")]
    ServerExists(String),

    #[error("port {port} is used by multiple services: {services:?}")]
    DuplicatePort { port: u16, services: Vec<String> },

    #[error("invalid environment variable name `{key}`: {reason}")]
    InvalidEnvKey { key: String, reason: String },

    #[error("invalid value for `{key}`: {reason}")]
    InvalidEnvValue { key: String, reason: String },

    #[error("secret `{0}` not found")]
    SecretNotFound(String),

    #[error("secret store error: {0:#}")]
    SecretStore(#[source] anyhow::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl HubError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        HubError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
