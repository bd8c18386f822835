use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONTROL_PLANE_PORT: u16 = 10350;
pub const DEFAULT_ADMIN_API_PORT: u16 = 8001;
pub const DEFAULT_PROXY_PORT: u16 = 8000;
pub const DEFAULT_INSPECTOR_UI_PORT: u16 = 6274;
pub const DEFAULT_INSPECTOR_PROXY_PORT: u16 = 6277;
pub const DEFAULT_SERVICE_START_PORT: u16 = 9001;

/// Ports the hub binds. Fixed for the lifetime of one supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub control_plane: u16,
    pub admin_api: u16,
    pub proxy: u16,
    pub inspector_ui: u16,
    pub inspector_proxy: u16,
    pub service_start: u16,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            control_plane: DEFAULT_CONTROL_PLANE_PORT,
            admin_api: DEFAULT_ADMIN_API_PORT,
            proxy: DEFAULT_PROXY_PORT,
            inspector_ui: DEFAULT_INSPECTOR_UI_PORT,
            inspector_proxy: DEFAULT_INSPECTOR_PROXY_PORT,
            service_start: DEFAULT_SERVICE_START_PORT,
        }
    }
}

impl PortConfig {
    /// Environment overrides handed to the orchestrator process.
    pub fn env_overrides(&self) -> Vec<(String, String)> {
        vec![
            ("TILT_PORT".to_string(), self.control_plane.to_string()),
            (
                "TOOLHUB_CONTROL_PLANE_PORT".to_string(),
                self.control_plane.to_string(),
            ),
            ("TOOLHUB_ADMIN_API_PORT".to_string(), self.admin_api.to_string()),
            ("TOOLHUB_PROXY_PORT".to_string(), self.proxy.to_string()),
            (
                "TOOLHUB_INSPECTOR_UI_PORT".to_string(),
                self.inspector_ui.to_string(),
            ),
            (
                "TOOLHUB_INSPECTOR_PROXY_PORT".to_string(),
                self.inspector_proxy.to_string(),
            ),
            (
                "TOOLHUB_SERVICE_START_PORT".to_string(),
                self.service_start.to_string(),
            ),
        ]
    }
}

/// Delays and deadlines used by the supervisor.
#[derive(Debug, Clone)]
pub struct Timings {
    /// Grace period after spawn before readiness polling begins.
    pub settle_delay: Duration,
    pub readiness_timeout: Duration,
    pub readiness_interval: Duration,
    /// Per-request timeout for health probes.
    pub probe_timeout: Duration,
    /// Wait after stale-process cleanup for ports to be released.
    pub cleanup_settle: Duration,
    /// Pause between stop and start during a restart.
    pub restart_settle: Duration,
    /// Upper bound on the orchestrator's own `down` command.
    pub teardown_timeout: Duration,
    /// Upper bound on waiting for supervision tasks to drain during stop.
    pub drain_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            readiness_timeout: Duration::from_secs(30),
            readiness_interval: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(2),
            cleanup_settle: Duration::from_secs(2),
            restart_settle: Duration::from_secs(1),
            teardown_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything the supervisor needs to know before it can start.
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// Directory holding the manifest, `.env` and orchestrator files.
    pub workspace_dir: PathBuf,
    /// Orchestrator binary that owns the process tree (`up`/`down`).
    pub orchestrator_bin: String,
    /// Reverse proxy binary; only checked for presence.
    pub proxy_bin: String,
    pub ports: PortConfig,
    pub timings: Timings,
    pub log_capacity: usize,
}

impl HubSettings {
    pub fn new(workspace_dir: PathBuf) -> Self {
        Self {
            workspace_dir,
            orchestrator_bin: "tilt".to_string(),
            proxy_bin: "traefik".to_string(),
            ports: PortConfig::default(),
            timings: Timings::default(),
            log_capacity: crate::ui::buffer::DEFAULT_LOG_CAPACITY,
        }
    }
}
