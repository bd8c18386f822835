use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

pub fn configure_process_group(_cmd: &mut Command) {}

pub async fn terminate_child(child: &mut tokio::process::Child, _child_pid: Option<u32>, grace: Duration) {
    let _ = child.start_kill();
    let _ = tokio::time::timeout(grace, child.wait()).await;
}

pub async fn kill_by_name(name: &str) -> anyhow::Result<bool> {
    let image = if name.ends_with(".exe") {
        name.to_string()
    } else {
        format!("{name}.exe")
    };
    let output = Command::new("taskkill")
        .args(["/F", "/T", "/IM", &image])
        .output()
        .await?;
    Ok(output.status.success())
}

pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

pub fn identify_port_owner(_port: u16) -> Option<String> {
    None
}
