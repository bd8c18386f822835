use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::discovery::binary_basename;

/// Whether a TCP port on localhost can currently be bound.
pub fn check_port_available(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Identify which process owns a given port.
pub fn identify_port_owner(port: u16) -> Option<String> {
    crate::platform::identify_port_owner(port)
}

/// Run the orchestrator's own teardown in the workspace. Best-effort:
/// failures and timeouts are logged, never returned.
pub async fn run_teardown(orchestrator: &Path, workspace_dir: &Path, timeout: Duration) -> bool {
    let mut cmd = Command::new(orchestrator);
    cmd.arg("down")
        .current_dir(workspace_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            debug!(bin = %orchestrator.display(), "teardown completed");
            true
        }
        Ok(Ok(output)) => {
            warn!(
                bin = %orchestrator.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "teardown command failed"
            );
            false
        }
        Ok(Err(e)) => {
            warn!(bin = %orchestrator.display(), error = %e, "failed to run teardown command");
            false
        }
        Err(_) => {
            warn!(
                bin = %orchestrator.display(),
                timeout_ms = timeout.as_millis() as u64,
                "teardown command timed out"
            );
            false
        }
    }
}

/// Clear out a hub left behind by an earlier session: orchestrator teardown,
/// kill any remaining orchestrator process by name, then give the OS time to
/// release the ports.
pub async fn cleanup_stale_instance(
    orchestrator: &Path,
    workspace_dir: &Path,
    teardown_timeout: Duration,
    settle: Duration,
) {
    info!("cleaning up stale hub instance");
    run_teardown(orchestrator, workspace_dir, teardown_timeout).await;

    let name = binary_basename(orchestrator.to_str().unwrap_or_default());
    match crate::platform::kill_by_name(name).await {
        Ok(true) => info!(process = %name, "killed stale orchestrator processes"),
        Ok(false) => debug!(process = %name, "no stale orchestrator processes"),
        Err(e) => warn!(process = %name, error = %e, "kill by name failed"),
    }

    tokio::time::sleep(settle).await;
}
