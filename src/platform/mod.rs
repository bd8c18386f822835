use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;

#[cfg(not(unix))]
mod fallback;
#[cfg(unix)]
mod unix;

#[cfg(not(unix))]
use fallback as imp;
#[cfg(unix)]
use unix as imp;

/// Configure the command to run in its own process group so the whole
/// orchestrator tree can be signalled at once.
pub fn configure_process_group(cmd: &mut Command) {
    imp::configure_process_group(cmd)
}

/// Terminate a child and its descendants: graceful signal first, then a
/// forced kill once `grace` has elapsed.
pub async fn terminate_child(child: &mut tokio::process::Child, child_pid: Option<u32>, grace: Duration) {
    imp::terminate_child(child, child_pid, grace).await
}

/// Kill every process whose executable name is exactly `name`.
/// Returns whether anything matched.
pub async fn kill_by_name(name: &str) -> anyhow::Result<bool> {
    imp::kill_by_name(name).await
}

/// Identify which process owns a given TCP port.
pub fn identify_port_owner(port: u16) -> Option<String> {
    imp::identify_port_owner(port)
}

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &std::path::Path) -> bool {
    imp::is_executable(path)
}

/// Get the current user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}
