use std::path::{Path, PathBuf};

use crate::config::workspace::MANIFEST_FILENAME;

pub const WORKSPACE_DIRNAME: &str = ".toolhub";

/// Walk up the directory tree from `start`, looking for a workspace
/// directory that already holds a manifest.
pub fn find_workspace(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(WORKSPACE_DIRNAME);
        if candidate.join(MANIFEST_FILENAME).is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolve the workspace directory. An explicit path wins (it need not exist
/// yet, `init` creates it). Otherwise search upward from the current
/// directory, falling back to `./.toolhub`.
pub fn resolve_workspace(cli_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = cli_dir {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir()?;
    Ok(find_workspace(&cwd).unwrap_or_else(|| cwd.join(WORKSPACE_DIRNAME)))
}
