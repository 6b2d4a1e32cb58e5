//! Persistent registry of installations.
//!
//! Loaded once at startup and written back by the caller before the process
//! exits, whether the operation succeeded or not.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{Defaults, Installation, RegistryFile};

#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    file: RegistryFile,
}

impl Registry {
    /// Load the registry file. A missing file yields an empty registry that is
    /// created on the first [`Registry::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let file = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| Error::Json {
                path: path.to_path_buf(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("registry file {} missing, creating new", path.display());
                RegistryFile::default()
            }
            Err(e) => {
                return Err(Error::io(
                    format!("failed to read registry {}", path.display()),
                    e,
                ))
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("failed to create {}", parent.display()), e))?;
        }
        let output = serde_json::to_string_pretty(&self.file).map_err(|e| Error::Json {
            path: self.path.clone(),
            source: e,
        })?;
        std::fs::write(&self.path, output).map_err(|e| {
            Error::io(format!("failed to write registry {}", self.path.display()), e)
        })?;
        tracing::debug!("registry written to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> &Defaults {
        &self.file.defaults
    }

    pub fn get(&self, name: &str) -> Option<&Installation> {
        self.file.installations.iter().find(|i| i.name == name)
    }

    pub fn ensure_exists(&self, name: &str) -> Result<Installation> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::InstallationDoesNotExist(name.to_string()))
    }

    pub fn ensure_does_not_exist(&self, name: &str) -> Result<()> {
        match self.get(name) {
            Some(_) => Err(Error::InstallationAlreadyExists(name.to_string())),
            None => Ok(()),
        }
    }

    /// Register a new installation. Re-checks the name so the registry can
    /// never hold two entries with the same name.
    pub fn add(&mut self, name: &str, root: &Path) -> Result<Installation> {
        self.ensure_does_not_exist(name)?;
        let installation = Installation {
            name: name.to_string(),
            root: root.to_path_buf(),
        };
        self.file.installations.push(installation.clone());
        Ok(installation)
    }

    pub fn remove(&mut self, installation: &Installation) {
        self.file
            .installations
            .retain(|i| i.name != installation.name);
    }

    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<Installation> {
        self.ensure_exists(name)?;
        self.ensure_does_not_exist(new_name)?;
        let entry = self.entry_mut(name)?;
        entry.name = new_name.to_string();
        Ok(entry.clone())
    }

    pub fn set_root(&mut self, name: &str, root: &Path) -> Result<Installation> {
        let entry = self.entry_mut(name)?;
        entry.root = root.to_path_buf();
        Ok(entry.clone())
    }

    pub fn list(&self) -> &[Installation] {
        &self.file.installations
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Installation> {
        self.file
            .installations
            .iter_mut()
            .find(|i| i.name == name)
            .ok_or_else(|| Error::InstallationDoesNotExist(name.to_string()))
    }
}
