use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::defaults::default_manifest;
use crate::config::envfile::EnvFile;
use crate::config::model::HubManifest;
use crate::config::settings::PortConfig;
use crate::config::{load_manifest, save_manifest};
use crate::error::{HubError, Result};

pub const MANIFEST_FILENAME: &str = "hub.yaml";
pub const ENV_FILENAME: &str = ".env";
pub const LOGS_DIRNAME: &str = "logs";

/// File layout of a hub workspace directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILENAME)
    }

    pub fn env_file(&self) -> EnvFile {
        EnvFile::new(self.root.join(ENV_FILENAME))
    }

    pub fn exists(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Create directories, a default manifest and an env file if absent.
    /// Safe to call repeatedly; existing files are never touched.
    /// Returns whether the manifest was freshly generated.
    pub fn init(&self, ports: &PortConfig) -> Result<bool> {
        for dir in [self.root.clone(), self.root.join(LOGS_DIRNAME)] {
            std::fs::create_dir_all(&dir).map_err(|source| HubError::WorkspaceInit {
                path: dir.clone(),
                source,
            })?;
        }

        let created = if self.exists() {
            false
        } else {
            let manifest = default_manifest(ports);
            save_manifest(&self.manifest_path(), &manifest)
                .map_err(|e| HubError::ConfigGeneration(e.to_string()))?;
            info!(path = %self.manifest_path().display(), "generated default manifest");
            true
        };

        self.env_file().ensure_exists()?;
        Ok(created)
    }

    pub fn load_manifest(&self) -> Result<HubManifest> {
        if !self.exists() {
            return Err(HubError::WorkspaceNotFound(self.root.clone()));
        }
        load_manifest(&self.manifest_path())
    }

    pub fn save_manifest(&self, manifest: &HubManifest) -> Result<()> {
        if !self.root.is_dir() {
            return Err(HubError::WorkspaceNotFound(self.root.clone()));
        }
        save_manifest(&self.manifest_path(), manifest)
    }
}
