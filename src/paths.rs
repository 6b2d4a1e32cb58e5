//! Path resolution for the registry file and installation directories.
//!
//! Uses env vars when set, otherwise XDG defaults.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const SERVER_JAR_FILE: &str = "fabric-server-launch.jar";
pub const SERVER_PROPERTIES_FILE: &str = "server.properties";
pub const LAUNCH_SCRIPT_FILE: &str = "fabricdw";
pub const EULA_FILE: &str = "eula.txt";

/// Resolved location of the installation registry.
#[derive(Debug, Clone)]
pub struct Paths {
    pub registry_file: PathBuf,
}

impl Paths {
    /// Resolve paths from environment, falling back to XDG/defaults.
    pub fn resolve() -> Self {
        let registry_file = resolve_path(
            "FABRICDW_CONFIG",
            dirs::config_dir().map(|p| p.join("fabricdw.json")),
            "~/.config/fabricdw.json",
        );

        Self { registry_file }
    }

    pub fn registry_file(&self) -> &Path {
        &self.registry_file
    }
}

/// The files an installation directory is made of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationLayout {
    root: PathBuf,
}

impl InstallationLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn server_jar(&self) -> PathBuf {
        self.root.join(SERVER_JAR_FILE)
    }

    pub fn properties_file(&self) -> PathBuf {
        self.root.join(SERVER_PROPERTIES_FILE)
    }

    pub fn launch_script(&self) -> PathBuf {
        self.root.join(LAUNCH_SCRIPT_FILE)
    }

    pub fn eula_file(&self) -> PathBuf {
        self.root.join(EULA_FILE)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("backup")
    }

    /// Files owned by the tool, in the order they are evacuated during an update.
    pub fn managed_files(&self) -> [PathBuf; 4] {
        [
            self.server_jar(),
            self.properties_file(),
            self.launch_script(),
            self.eula_file(),
        ]
    }
}

/// Expand `~` and make the path absolute against the current directory.
pub fn absolute_path(path: &str) -> Result<PathBuf> {
    let expanded = expand_tilde(path);
    std::path::absolute(&expanded)
        .map_err(|e| Error::io(format!("failed to resolve {}", expanded.display()), e))
}

fn resolve_path(env_var: &str, xdg_default: Option<PathBuf>, fallback: &str) -> PathBuf {
    if let Ok(val) = std::env::var(env_var) {
        let trimmed = val.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }
    xdg_default.unwrap_or_else(|| expand_tilde(fallback))
}

fn expand_tilde(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}
