pub mod discovery;
pub mod health;
pub mod ports;
pub mod state;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, RwLock};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config;
use crate::config::model::{HubManifest, ServiceEntry, ServiceKind};
use crate::config::secrets::{secret_ref, EnvVarStatus, SecretResolver, SecretStore};
use crate::config::servers;
use crate::config::settings::{HubSettings, PortConfig};
use crate::config::workspace::Workspace;
use crate::error::{HubError, Result};
use crate::platform;
use crate::ui::buffer::LogBuffer;
use crate::ui::logs::{LogLine, LogSource};

use discovery::{augmented_path, find_executable};
use ports::{check_port_available, cleanup_stale_instance, identify_port_owner, run_teardown};
use state::{Endpoint, EndpointStatus, EnvVarRequirement, HubSnapshot, HubStatus, StatusCell};

/// Grace period between SIGTERM and SIGKILL when killing the process tree.
const KILL_GRACE: std::time::Duration = std::time::Duration::from_secs(5);
/// Capture tasks read the child's pipes in chunks of this size.
const CAPTURE_CHUNK: usize = 4096;

/// Handles owned by one supervised run. Dropped or replaced when the run ends.
struct RunHandle {
    generation: u64,
    orchestrator: PathBuf,
    /// Fired by `stop`: every exit after this point is expected.
    stop: CancellationToken,
    /// Fired once teardown has had its chance; the exit watch then kills the
    /// process group.
    kill: CancellationToken,
    tracker: TaskTracker,
}

impl RunHandle {
    fn abandon(self) {
        self.stop.cancel();
        self.kill.cancel();
        self.tracker.close();
    }
}

/// Supervises the hub's process tree: one orchestrator child that owns the
/// reverse proxy and every tool server.
///
/// Lifecycle: `Stopped → Starting → Running → Stopping → Stopped`, with
/// `Error` reachable from `Starting`/`Running` when the child dies on its
/// own. `start` and `stop` return without waiting for readiness or exit;
/// four background tasks per run capture output, poll readiness and watch
/// for exit.
pub struct HubManager {
    settings: HubSettings,
    ports: RwLock<PortConfig>,
    workspace: Workspace,
    secrets: Arc<dyn SecretStore>,
    status: Arc<StatusCell>,
    logs: Arc<LogBuffer>,
    client: reqwest::Client,
    run: Mutex<Option<RunHandle>>,
}

impl HubManager {
    pub fn new(settings: HubSettings, secrets: Arc<dyn SecretStore>) -> Self {
        let client = health::probe_client(settings.timings.probe_timeout);
        Self {
            ports: RwLock::new(settings.ports),
            workspace: Workspace::new(settings.workspace_dir.clone()),
            logs: Arc::new(LogBuffer::new(settings.log_capacity)),
            status: Arc::new(StatusCell::new()),
            settings,
            secrets,
            client,
            run: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn ports(&self) -> PortConfig {
        *self.ports.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the port configuration used by the next `start`.
    pub fn set_ports(&self, ports: PortConfig) -> Result<()> {
        if self.status.get().is_active() {
            return Err(HubError::AlreadyRunning);
        }
        *self.ports.write().unwrap_or_else(|e| e.into_inner()) = ports;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Launch the hub. Returns once the child is spawned; readiness is
    /// tracked in the background and surfaces through [`Self::status`].
    pub async fn start(&self) -> Result<()> {
        let mut run = self.run.lock().await;

        if self.status.get().is_active() {
            return Err(HubError::AlreadyRunning);
        }
        if let Some(previous) = run.take() {
            debug!(generation = previous.generation, "discarding handles of finished run");
            previous.abandon();
        }

        let orchestrator = require_binary(&self.settings.orchestrator_bin)?;
        require_binary(&self.settings.proxy_bin)?;

        let ports = self.ports();
        self.workspace.init(&ports)?;

        if !check_port_available(ports.control_plane) {
            warn!(port = ports.control_plane, "control plane port busy, attempting cleanup");
            cleanup_stale_instance(
                &orchestrator,
                self.workspace.root(),
                self.settings.timings.teardown_timeout,
                self.settings.timings.cleanup_settle,
            )
            .await;
            if !check_port_available(ports.control_plane) {
                self.status.set(HubStatus::Error);
                return Err(HubError::PortInUse {
                    port: ports.control_plane,
                    owner: identify_port_owner(ports.control_plane),
                });
            }
        }

        self.logs.clear();
        let env = self.child_env(&ports)?;

        let mut cmd = Command::new(&orchestrator);
        cmd.arg("up")
            .arg("--port")
            .arg(ports.control_plane.to_string())
            .arg("--host")
            .arg("localhost")
            .current_dir(self.workspace.root())
            .env("PATH", augmented_path())
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        platform::configure_process_group(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.status.set(HubStatus::Error);
                error!(bin = %orchestrator.display(), error = %e, "failed to spawn orchestrator");
                return Err(HubError::StartFailed(format!(
                    "spawning {}: {e}",
                    orchestrator.display()
                )));
            }
        };

        let generation = self.status.begin_run(HubStatus::Starting);
        let pid = child.id();
        info!(pid = ?pid, generation, bin = %orchestrator.display(), "hub starting");

        let handle = RunHandle {
            generation,
            orchestrator,
            stop: CancellationToken::new(),
            kill: CancellationToken::new(),
            tracker: TaskTracker::new(),
        };
        let exited = CancellationToken::new();

        if let Some(stdout) = child.stdout.take() {
            handle.tracker.spawn(capture_output(
                stdout,
                LogSource::Stdout,
                self.logs.clone(),
                handle.stop.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            handle.tracker.spawn(capture_output(
                stderr,
                LogSource::Stderr,
                self.logs.clone(),
                handle.stop.clone(),
            ));
        }

        handle.tracker.spawn(watch_readiness(ReadinessWatch {
            generation,
            url: format!("http://localhost:{}/health", ports.proxy),
            client: self.client.clone(),
            status: self.status.clone(),
            logs: self.logs.clone(),
            settle: self.settings.timings.settle_delay,
            interval: self.settings.timings.readiness_interval,
            timeout: self.settings.timings.readiness_timeout,
            stop: handle.stop.clone(),
            exited: exited.clone(),
        }));

        handle.tracker.spawn(watch_exit(ExitWatch {
            child,
            pid,
            generation,
            name: discovery::binary_basename(&self.settings.orchestrator_bin).to_string(),
            status: self.status.clone(),
            logs: self.logs.clone(),
            stop: handle.stop.clone(),
            kill: handle.kill.clone(),
            exited,
        }));

        *run = Some(handle);
        Ok(())
    }

    /// Tear the hub down. Always ends in `Stopped`; teardown failures are
    /// logged, not returned.
    pub async fn stop(&self) -> Result<()> {
        let mut run = self.run.lock().await;

        let current = self.status.get();
        if !matches!(current, HubStatus::Running | HubStatus::Starting) {
            return Err(HubError::NotRunning);
        }
        self.status.set(HubStatus::Stopping);
        info!(from = %current, "stopping hub");

        let timings = &self.settings.timings;
        match run.take() {
            Some(handle) => {
                handle.stop.cancel();
                run_teardown(
                    &handle.orchestrator,
                    self.workspace.root(),
                    timings.teardown_timeout,
                )
                .await;
                handle.kill.cancel();
                handle.tracker.close();
                if tokio::time::timeout(timings.drain_timeout, handle.tracker.wait())
                    .await
                    .is_err()
                {
                    warn!(
                        timeout_ms = timings.drain_timeout.as_millis() as u64,
                        "supervision tasks did not finish in time"
                    );
                }
            }
            None => {
                // Started outside this manager and adopted by `is_running`.
                let orchestrator = find_executable(&self.settings.orchestrator_bin)
                    .unwrap_or_else(|| PathBuf::from(&self.settings.orchestrator_bin));
                cleanup_stale_instance(
                    &orchestrator,
                    self.workspace.root(),
                    timings.teardown_timeout,
                    std::time::Duration::ZERO,
                )
                .await;
            }
        }

        self.status.set(HubStatus::Stopped);
        info!("hub stopped");
        Ok(())
    }

    pub async fn restart(&self) -> Result<()> {
        if matches!(self.status.get(), HubStatus::Running | HubStatus::Starting) {
            match self.stop().await {
                Ok(()) | Err(HubError::NotRunning) => {}
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.settings.timings.restart_settle).await;
        }
        self.start().await
    }

    pub fn status(&self) -> HubStatus {
        self.status.get()
    }

    /// Probe the orchestrator's control plane. A live hub that this manager
    /// believes stopped (e.g. after a restart of the host application) is
    /// adopted as `Running`.
    pub async fn is_running(&self) -> bool {
        let cached = self.status.get();
        let url = format!("http://localhost:{}/", self.ports().control_plane);
        match health::probe(&self.client, &url).await {
            Ok(()) => {
                if self
                    .status
                    .replace_if(&[HubStatus::Stopped, HubStatus::Error], HubStatus::Running)
                {
                    info!(was = %cached, "hub detected running, adopting");
                }
                true
            }
            Err(e) => {
                debug!(error = %format!("{e:#}"), "control plane probe failed");
                cached == HubStatus::Running
            }
        }
    }

    /// The last `limit` captured lines, oldest first. `0` means all.
    pub fn get_logs(&self, limit: usize) -> Vec<LogLine> {
        self.logs.tail(limit)
    }

    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogLine> {
        self.logs.subscribe()
    }

    pub async fn hub_status(&self) -> Result<HubSnapshot> {
        let running = self.is_running().await;
        let mut endpoints = match self.endpoints() {
            Ok(endpoints) => endpoints,
            Err(HubError::WorkspaceNotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        if running {
            self.probe_endpoints(&mut endpoints).await;
        }
        Ok(HubSnapshot {
            status: self.status.get(),
            running,
            ports: self.ports(),
            workspace_dir: self.workspace.root().to_path_buf(),
            endpoints,
            log_lines: self.logs.len(),
        })
    }

    /// Every manifest entry as an endpoint. Live status is not probed:
    /// disabled entries are `disabled`, everything else `unknown`.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>> {
        let manifest = self.workspace.load_manifest()?;
        Ok(build_endpoints(&manifest, self.ports().proxy))
    }

    async fn probe_endpoints(&self, endpoints: &mut [Endpoint]) {
        let mut probes = JoinSet::new();
        for (idx, endpoint) in endpoints.iter().enumerate() {
            if !endpoint.enabled {
                continue;
            }
            let url = endpoint.health_url.clone().unwrap_or_else(|| endpoint.url.clone());
            let client = self.client.clone();
            probes.spawn(async move { (idx, health::probe(&client, &url).await.is_ok()) });
        }
        while let Some(joined) = probes.join_next().await {
            if let Ok((idx, healthy)) = joined {
                endpoints[idx].status = if healthy {
                    EndpointStatus::Running
                } else {
                    EndpointStatus::Error
                };
            }
        }
    }

    fn child_env(&self, ports: &PortConfig) -> Result<Vec<(String, String)>> {
        let mut env = ports.env_overrides();
        let vars = self.workspace.env_file().read()?;
        let resolved = SecretResolver::new(self.secrets.as_ref()).resolve_env_vars(&vars);
        if !resolved.unresolved.is_empty() {
            warn!(keys = ?resolved.unresolved, "skipping env vars with unresolved secrets");
            self.logs.append(
                LogSource::Hub,
                format!(
                    "skipping env vars with unresolved secrets: {}",
                    resolved.unresolved.join(", ")
                ),
            );
        }
        env.extend(resolved.vars);
        Ok(env)
    }

    // -----------------------------------------------------------------------
    // Manifest and env pass-throughs
    // -----------------------------------------------------------------------

    pub fn add_server(&self, name: &str, entry: ServiceEntry) -> Result<ServiceEntry> {
        servers::add_server(&self.workspace, name, entry, self.ports().service_start)
    }

    pub fn update_server(&self, name: &str, entry: ServiceEntry) -> Result<ServiceEntry> {
        servers::update_server(&self.workspace, name, entry)
    }

    pub fn remove_server(&self, name: &str) -> Result<ServiceEntry> {
        servers::remove_server(&self.workspace, name)
    }

    pub fn toggle_server(&self, name: &str, enabled: bool) -> Result<bool> {
        servers::toggle_server(&self.workspace, name, enabled)
    }

    /// Raw env file contents. Secret references are returned unresolved.
    pub fn get_env_vars(&self) -> Result<BTreeMap<String, String>> {
        self.workspace.env_file().read()
    }

    pub fn update_env_var(&self, key: &str, value: &str) -> Result<()> {
        self.workspace.env_file().update(key, value)
    }

    /// Point `key` at a stored secret. The secret must already exist.
    pub fn set_env_var_from_secret(&self, key: &str, secret_name: &str) -> Result<()> {
        match self.secrets.get_secret(secret_name) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(HubError::SecretNotFound(secret_name.to_string())),
            Err(e) => return Err(HubError::SecretStore(e)),
        }
        self.workspace.env_file().update(key, &secret_ref(secret_name))
    }

    pub fn get_env_vars_status(&self) -> Result<BTreeMap<String, EnvVarStatus>> {
        let vars = self.workspace.env_file().read()?;
        Ok(SecretResolver::new(self.secrets.as_ref()).env_vars_status(&vars))
    }

    pub fn get_required_env_vars(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let manifest = self.workspace.load_manifest()?;
        Ok(config::required_env_vars(&manifest))
    }

    pub fn get_env_var_requirements(&self) -> Result<Vec<EnvVarRequirement>> {
        let required = self.get_required_env_vars()?;
        let vars = self.workspace.env_file().read()?;
        let resolver = SecretResolver::new(self.secrets.as_ref());
        Ok(required
            .into_iter()
            .map(|(key, required_by)| {
                let status = resolver.status_of(vars.get(&key).map(String::as_str));
                EnvVarRequirement {
                    key,
                    required_by,
                    is_set: status.is_set,
                    is_secret: status.is_secret,
                    secret_exists: status.secret_exists,
                }
            })
            .collect())
    }
}

fn require_binary(name: &str) -> Result<PathBuf> {
    find_executable(name).ok_or_else(|| HubError::MissingPrerequisite {
        binary: name.to_string(),
    })
}

fn build_endpoints(manifest: &HubManifest, proxy_port: u16) -> Vec<Endpoint> {
    manifest
        .entries()
        .map(|(kind, name, entry)| {
            let url = match kind {
                ServiceKind::McpServer => config::endpoint_url(proxy_port, name),
                ServiceKind::Infrastructure | ServiceKind::Tool => {
                    format!("http://localhost:{}", entry.port)
                }
            };
            let health_url = entry
                .health_path()
                .filter(|_| entry.port != 0)
                .map(|path| format!("http://localhost:{}{}", entry.port, normalize_path(path)));
            let enabled = entry.is_enabled();
            Endpoint {
                name: name.clone(),
                kind,
                port: entry.port,
                url,
                health_url,
                description: entry.description.clone(),
                enabled,
                status: if enabled {
                    EndpointStatus::Unknown
                } else {
                    EndpointStatus::Disabled
                },
            }
        })
        .collect()
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Splits a byte stream into lines, carrying partial lines across chunks.
#[derive(Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let rest = self.pending.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.pending, rest);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}

async fn capture_output<R>(mut reader: R, source: LogSource, logs: Arc<LogBuffer>, stop: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::default();
    let mut buf = vec![0u8; CAPTURE_CHUNK];
    loop {
        let read = tokio::select! {
            _ = stop.cancelled() => {
                debug!(source = source.as_str(), "capture stopped");
                return;
            }
            read = reader.read(&mut buf) => read,
        };
        match read {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    logs.append(source, line);
                }
            }
            Err(e) => {
                warn!(source = source.as_str(), error = %e, "read error on hub output");
                logs.append(LogSource::Hub, format!("{} read error: {e}", source.as_str()));
                return;
            }
        }
    }
    if let Some(rest) = splitter.finish() {
        logs.append(source, rest);
    }
}

struct ReadinessWatch {
    generation: u64,
    url: String,
    client: reqwest::Client,
    status: Arc<StatusCell>,
    logs: Arc<LogBuffer>,
    settle: std::time::Duration,
    interval: std::time::Duration,
    timeout: std::time::Duration,
    stop: CancellationToken,
    exited: CancellationToken,
}

async fn watch_readiness(w: ReadinessWatch) {
    tokio::select! {
        _ = tokio::time::sleep(w.settle) => {}
        _ = w.stop.cancelled() => return,
        _ = w.exited.cancelled() => return,
    }

    let outcome = tokio::select! {
        r = health::wait_until_healthy(&w.client, &w.url, w.interval, w.timeout) => r,
        _ = w.stop.cancelled() => return,
        _ = w.exited.cancelled() => return,
    };

    if let Err(e) = outcome {
        warn!(url = %w.url, error = %format!("{e:#}"), "readiness timed out, assuming running");
        w.logs.append(
            LogSource::Hub,
            format!("health check did not pass within {:?}; assuming running", w.timeout),
        );
    }

    if w
        .status
        .transition(w.generation, &[HubStatus::Starting], HubStatus::Running)
    {
        info!(generation = w.generation, "hub running");
    }
}

struct ExitWatch {
    child: Child,
    pid: Option<u32>,
    generation: u64,
    name: String,
    status: Arc<StatusCell>,
    logs: Arc<LogBuffer>,
    stop: CancellationToken,
    kill: CancellationToken,
    exited: CancellationToken,
}

async fn watch_exit(mut w: ExitWatch) {
    let waited = tokio::select! {
        r = w.child.wait() => Some(r),
        _ = w.kill.cancelled() => None,
    };

    let Some(result) = waited else {
        debug!(pid = ?w.pid, "terminating hub process group");
        platform::terminate_child(&mut w.child, w.pid, KILL_GRACE).await;
        w.exited.cancel();
        return;
    };
    w.exited.cancel();

    if w.stop.is_cancelled() {
        info!(pid = ?w.pid, "hub process exited after stop");
        return;
    }

    let detail = match result {
        Ok(status) => status.to_string(),
        Err(e) => format!("wait failed: {e}"),
    };
    error!(pid = ?w.pid, detail = %detail, "hub process exited unexpectedly");
    w.logs.append(
        LogSource::Hub,
        format!("{} exited unexpectedly ({detail})", w.name),
    );
    w.status.transition(
        w.generation,
        &[HubStatus::Starting, HubStatus::Running],
        HubStatus::Error,
    );
}
