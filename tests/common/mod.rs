#![allow(dead_code)]
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use toolhub::config::secrets::MemorySecretStore;
use toolhub::config::settings::HubSettings;
use toolhub::orchestrator::state::HubStatus;
use toolhub::HubManager;

/// A scratch directory holding fake orchestrator/proxy binaries and a hub
/// workspace.
pub struct TestHub {
    pub dir: TempDir,
    pub orchestrator: PathBuf,
    pub proxy: PathBuf,
}

impl TestHub {
    /// `up_body` is the shell run for `<orchestrator> up ...`. `down` always
    /// drops a `down.called` marker in the working directory.
    pub fn new(name: &str, up_body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();

        let orchestrator = write_script(
            &bin,
            &format!("fake-orch-{name}"),
            &format!(
                "#!/bin/sh\ncase \"$1\" in\n  up)\n{up_body}\n    ;;\n  down)\n    touch \"$PWD/down.called\"\n    exit 0\n    ;;\nesac\n"
            ),
        );
        let proxy = write_script(&bin, &format!("fake-proxy-{name}"), "#!/bin/sh\nexit 0\n");

        Self {
            dir,
            orchestrator,
            proxy,
        }
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.dir.path().join(".toolhub")
    }

    /// Settings with free ports and short timings.
    pub fn settings(&self) -> HubSettings {
        let mut settings = HubSettings::new(self.workspace_dir());
        settings.orchestrator_bin = self.orchestrator.to_string_lossy().into_owned();
        settings.proxy_bin = self.proxy.to_string_lossy().into_owned();

        let ports = free_ports(2);
        settings.ports.control_plane = ports[0];
        settings.ports.proxy = ports[1];

        settings.timings.settle_delay = Duration::from_millis(100);
        settings.timings.readiness_interval = Duration::from_millis(50);
        settings.timings.readiness_timeout = Duration::from_millis(400);
        settings.timings.cleanup_settle = Duration::from_millis(50);
        settings.timings.restart_settle = Duration::from_millis(50);
        settings.timings.teardown_timeout = Duration::from_secs(5);
        settings.timings.drain_timeout = Duration::from_secs(10);
        settings
    }

    pub fn manager(&self) -> HubManager {
        self.manager_with(self.settings(), MemorySecretStore::new())
    }

    pub fn manager_with(&self, settings: HubSettings, secrets: MemorySecretStore) -> HubManager {
        HubManager::new(settings, Arc::new(secrets))
    }

    pub fn marker(&self, name: &str) -> PathBuf {
        self.workspace_dir().join(name)
    }
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn free_ports(count: usize) -> Vec<u16> {
    // Bind all at once to avoid reuse, then drop
    let listeners: Vec<_> = (0..count)
        .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();
    let ports: Vec<_> = listeners
        .iter()
        .map(|l| l.local_addr().unwrap().port())
        .collect();
    drop(listeners);
    ports
}

pub async fn wait_for_status(manager: &HubManager, want: HubStatus, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if manager.status() == want {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

pub async fn wait_for_log(manager: &HubManager, needle: &str, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if manager.get_logs(0).iter().any(|l| l.text.contains(needle)) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

/// Answer every HTTP request on `port` with 200 until the task is aborted.
pub async fn serve_ok(port: u16) -> tokio::task::JoinHandle<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            let _ = sock
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;
            let _ = sock.shutdown().await;
        }
    })
}

pub fn process_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}
