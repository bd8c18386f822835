use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

pub fn configure_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

/// SIGTERM the child's process group, then SIGKILL it if `grace` passes.
pub async fn terminate_child(child: &mut tokio::process::Child, child_pid: Option<u32>, grace: Duration) {
    let Some(pid) = child_pid else {
        let _ = child.kill().await;
        return;
    };
    let group = Pid::from_raw(pid as i32);

    if let Err(errno) = killpg(group, Signal::SIGTERM) {
        if errno == nix::errno::Errno::ESRCH {
            debug!(pid, "hub process group already gone");
            let _ = child.wait().await;
        } else {
            warn!(pid, error = %errno, "could not signal hub process group, killing leader");
            let _ = child.kill().await;
        }
        return;
    }
    debug!(pid, "sent SIGTERM to hub process group");

    if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
        debug!(pid, %status, "hub exited after SIGTERM");
        return;
    }
    warn!(pid, grace_ms = grace.as_millis() as u64, "hub ignored SIGTERM, sending SIGKILL");
    let _ = killpg(group, Signal::SIGKILL);
    let _ = child.kill().await;
    let _ = child.wait().await;
}

pub async fn kill_by_name(name: &str) -> anyhow::Result<bool> {
    let output = Command::new("pkill")
        .args(["-KILL", "-x", name])
        .output()
        .await?;
    // 1 means no process matched.
    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => anyhow::bail!(
            "pkill {} failed: {}",
            name,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
    }
}

pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Inode of the socket bound to `port`, from the kernel's TCP tables.
#[cfg(target_os = "linux")]
fn socket_inode(port: u16) -> Option<String> {
    let local_suffix = format!(":{port:04X}");
    ["/proc/net/tcp", "/proc/net/tcp6"]
        .iter()
        .filter_map(|table| std::fs::read_to_string(table).ok())
        .flat_map(|content| {
            content
                .lines()
                .skip(1)
                .filter_map(|row| {
                    let cols: Vec<&str> = row.split_whitespace().collect();
                    let bound = cols.get(1)?.ends_with(&local_suffix);
                    bound.then(|| cols.get(9).map(|inode| inode.to_string()))?
                })
                .collect::<Vec<_>>()
        })
        .find(|inode| inode != "0")
}

#[cfg(target_os = "linux")]
fn describe_pid(pid: &str) -> String {
    let cmdline = std::fs::read(format!("/proc/{pid}/cmdline"))
        .map(|raw| String::from_utf8_lossy(&raw).replace('\0', " ").trim().to_string())
        .unwrap_or_default();
    match cmdline.chars().count() {
        0 => format!("PID {pid}"),
        n if n > 60 => {
            let head: String = cmdline.chars().take(57).collect();
            format!("{head}... (PID {pid})")
        }
        _ => format!("{cmdline} (PID {pid})"),
    }
}

/// Walk `/proc/<pid>/fd` looking for the process holding `port`.
#[cfg(target_os = "linux")]
pub fn identify_port_owner(port: u16) -> Option<String> {
    let target = format!("socket:[{}]", socket_inode(port)?);

    std::fs::read_dir("/proc")
        .ok()?
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.bytes().all(|b| b.is_ascii_digit()))
        .find(|pid| {
            std::fs::read_dir(format!("/proc/{pid}/fd"))
                .map(|fds| {
                    fds.flatten().any(|fd| {
                        std::fs::read_link(fd.path())
                            .map(|link| link.to_string_lossy() == target)
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false)
        })
        .map(|pid| describe_pid(&pid))
}

#[cfg(not(target_os = "linux"))]
pub fn identify_port_owner(_port: u16) -> Option<String> {
    None
}
