use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::platform;

/// Install locations checked after `PATH`. GUI-launched processes often get a
/// minimal `PATH` that misses these.
const SYSTEM_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin"];
const HOME_DIRS: &[&str] = &[
    ".local/bin",
    ".cargo/bin",
    "go/bin",
    ".npm-global/bin",
    ".bun/bin",
    ".deno/bin",
];
const FALLBACK_DIRS: &[&str] = &["/usr/bin", "/bin"];

/// The ordered list of extra directories searched for executables.
pub fn extra_search_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = SYSTEM_DIRS.iter().map(PathBuf::from).collect();
    if let Some(home) = platform::home_dir() {
        dirs.extend(HOME_DIRS.iter().map(|d| home.join(d)));
    }
    dirs.extend(FALLBACK_DIRS.iter().map(PathBuf::from));
    dirs
}

/// Locate an executable by name.
///
/// A name containing a path separator is checked as-is. Otherwise `PATH` is
/// searched first, then [`extra_search_dirs`].
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        let path = PathBuf::from(name);
        return platform::is_executable(&path).then_some(path);
    }

    if let Ok(found) = which::which(name) {
        return Some(found);
    }

    find_in_dirs(name, &extra_search_dirs())
}

fn find_in_dirs(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(name))
        .find(|candidate| platform::is_executable(candidate))
}

/// `PATH` for child processes: the current value followed by every existing
/// extra directory not already on it.
pub fn augmented_path() -> OsString {
    let current = std::env::var_os("PATH").unwrap_or_default();
    augment(&current, &extra_search_dirs())
}

fn augment(current: &OsString, extra: &[PathBuf]) -> OsString {
    let mut entries: Vec<PathBuf> = std::env::split_paths(current).collect();
    for dir in extra {
        if dir.is_dir() && !entries.iter().any(|e| e == dir) {
            entries.push(dir.clone());
        }
    }
    std::env::join_paths(entries).unwrap_or_else(|_| current.clone())
}

/// File name of a binary reference, for kill-by-name.
pub fn binary_basename(bin: &str) -> &str {
    Path::new(bin)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(bin)
}
