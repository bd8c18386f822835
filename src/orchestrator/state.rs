use std::fmt;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::config::model::ServiceKind;
use crate::config::settings::PortConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl HubStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HubStatus::Stopped => "stopped",
            HubStatus::Starting => "starting",
            HubStatus::Running => "running",
            HubStatus::Stopping => "stopping",
            HubStatus::Error => "error",
        }
    }

    /// Whether a new run may not be started from this state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            HubStatus::Starting | HubStatus::Running | HubStatus::Stopping
        )
    }
}

impl fmt::Display for HubStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single authoritative hub status plus the generation of the run that
/// owns it. Background tasks only ever write through [`StatusCell::transition`]
/// with their own generation, so a task left over from an earlier run cannot
/// clobber a newer one.
#[derive(Debug)]
pub struct StatusCell {
    inner: RwLock<(HubStatus, u64)>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new((HubStatus::Stopped, 0)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, (HubStatus, u64)> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, (HubStatus, u64)> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self) -> HubStatus {
        self.read().0
    }

    /// Unconditional write, used by the foreground start/stop paths.
    pub fn set(&self, status: HubStatus) {
        self.write().0 = status;
    }

    /// Begin a new run: bump the generation and enter `status`.
    pub fn begin_run(&self, status: HubStatus) -> u64 {
        let mut guard = self.write();
        guard.1 += 1;
        guard.0 = status;
        guard.1
    }

    /// Compare-and-set on behalf of run `generation`. Applies only when the
    /// generation still matches and the current status is one of `from`.
    pub fn transition(&self, generation: u64, from: &[HubStatus], to: HubStatus) -> bool {
        let mut guard = self.write();
        if guard.1 != generation || !from.contains(&guard.0) {
            return false;
        }
        guard.0 = to;
        true
    }

    /// Compare-and-set regardless of generation.
    pub fn replace_if(&self, from: &[HubStatus], to: HubStatus) -> bool {
        let mut guard = self.write();
        if !from.contains(&guard.0) {
            return false;
        }
        guard.0 = to;
        true
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Running,
    Error,
    Disabled,
    Unknown,
}

impl EndpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointStatus::Running => "running",
            EndpointStatus::Error => "error",
            EndpointStatus::Disabled => "disabled",
            EndpointStatus::Unknown => "unknown",
        }
    }
}

/// A service as seen from outside the hub. Derived from the manifest on
/// demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub kind: ServiceKind,
    pub port: u16,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    pub status: EndpointStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSnapshot {
    pub status: HubStatus,
    pub running: bool,
    pub ports: PortConfig,
    pub workspace_dir: PathBuf,
    pub endpoints: Vec<Endpoint>,
    pub log_lines: usize,
}

/// One env var as required by the enabled tool servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarRequirement {
    pub key: String,
    pub required_by: Vec<String>,
    pub is_set: bool,
    pub is_secret: bool,
    pub secret_exists: bool,
}
