//! Transactional re-provisioning of an existing installation.
//!
//! Managed files are moved aside, provisioning runs against the cleared
//! directory, and the transaction either commits (backups dropped or kept)
//! or rolls back by moving every backup over its original again.
//!
//! ```text
//! Evacuated -> Provisioning -> Committed
//!                          \-> RolledBack
//! ```

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::context::{Context, LaunchSettings};
use crate::error::{Error, Result};
use crate::guard::DirectoryGuard;
use crate::install::{ArtifactInstaller, ProvisionReport, ProvisionRequest};
use crate::paths::InstallationLayout;
use crate::versions::VersionSelection;

const BACKUP_SUFFIX: &str = "-bak";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Evacuated,
    Provisioning,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub original: PathBuf,
    pub backup: PathBuf,
}

#[derive(Debug)]
pub struct UpdateTransaction {
    managed: Vec<PathBuf>,
    pending: Vec<BackupEntry>,
    keep_backups: bool,
    state: TransactionState,
}

pub fn backup_path(original: &Path) -> PathBuf {
    let mut name = OsString::from(original.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

impl UpdateTransaction {
    /// Move every existing managed file to its backup path. Absent files are
    /// skipped. If a move fails, the files moved so far are put back.
    pub fn evacuate(layout: &InstallationLayout, keep_backups: bool) -> Result<Self> {
        let mut tx = Self {
            managed: layout.managed_files().to_vec(),
            pending: Vec::new(),
            keep_backups,
            state: TransactionState::Evacuated,
        };

        for original in layout.managed_files() {
            if std::fs::symlink_metadata(&original).is_err() {
                tracing::debug!("{} absent, no backup", original.display());
                continue;
            }
            let backup = backup_path(&original);
            if let Err(e) = std::fs::rename(&original, &backup) {
                let err = Error::io(format!("failed to back up {}", original.display()), e);
                if let Err(restore_err) = tx.restore() {
                    tracing::error!("failed to restore after aborted backup: {restore_err}");
                }
                return Err(err);
            }
            tracing::debug!("{} -> {}", original.display(), backup.display());
            tx.pending.push(BackupEntry { original, backup });
        }

        Ok(tx)
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn pending(&self) -> &[BackupEntry] {
        &self.pending
    }

    pub fn backup_of(&self, original: &Path) -> Option<&Path> {
        self.pending
            .iter()
            .find(|entry| entry.original == original)
            .map(|entry| entry.backup.as_path())
    }

    pub fn begin_provisioning(&mut self) {
        self.state = TransactionState::Provisioning;
    }

    /// Finish successfully, deleting the backups unless they are kept. The new
    /// files are already in place, so a backup that cannot be deleted is only
    /// reported.
    pub fn commit(mut self) {
        self.state = TransactionState::Committed;
        if self.keep_backups {
            println!("Keeping backups");
            return;
        }
        let mut left = 0;
        for entry in &self.pending {
            if let Err(e) = std::fs::remove_file(&entry.backup) {
                tracing::warn!("backup left at {}: {e}", entry.backup.display());
                left += 1;
            }
        }
        if left == 0 {
            println!("Deleted backups");
        }
    }

    /// Restore the exact pre-update file set.
    pub fn rollback(mut self) -> Result<()> {
        self.restore()
    }

    /// Files provisioning created where none existed before are removed,
    /// then every backup is moved back over its original.
    fn restore(&mut self) -> Result<()> {
        let mut first_error = None;

        for original in &self.managed {
            if self.pending.iter().any(|entry| &entry.original == original) {
                continue;
            }
            if std::fs::symlink_metadata(original).is_ok() {
                if let Err(e) = std::fs::remove_file(original) {
                    tracing::error!("failed to remove {}: {e}", original.display());
                    first_error.get_or_insert(Error::io(
                        format!("failed to remove {}", original.display()),
                        e,
                    ));
                }
            }
        }

        for entry in &self.pending {
            if std::fs::symlink_metadata(&entry.backup).is_err() {
                continue;
            }
            if let Err(e) = std::fs::rename(&entry.backup, &entry.original) {
                tracing::error!("failed to restore {}: {e}", entry.original.display());
                first_error.get_or_insert(Error::io(
                    format!("failed to restore {}", entry.original.display()),
                    e,
                ));
            }
        }

        self.state = TransactionState::RolledBack;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for UpdateTransaction {
    fn drop(&mut self) {
        if matches!(
            self.state,
            TransactionState::Evacuated | TransactionState::Provisioning
        ) {
            if let Err(e) = self.restore() {
                tracing::error!("rollback failed: {e}");
            }
        }
    }
}

/// Inputs of an update run.
pub struct UpdateRequest<'a> {
    pub name: &'a str,
    pub layout: &'a InstallationLayout,
    pub versions: &'a VersionSelection,
    pub properties: &'a BTreeMap<String, String>,
    pub launch: &'a LaunchSettings,
    pub keep_backups: bool,
}

/// Re-provision an installation inside an [`UpdateTransaction`]. The old
/// `server.properties` and `eula.txt` are carried over from their backups.
pub fn reprovision(ctx: &Context<'_>, req: &UpdateRequest<'_>) -> Result<ProvisionReport> {
    let mut tx = UpdateTransaction::evacuate(req.layout, req.keep_backups)?;

    let carry_over: Vec<(PathBuf, PathBuf)> = [req.layout.properties_file(), req.layout.eula_file()]
        .into_iter()
        .filter_map(|original| {
            tx.backup_of(&original)
                .map(|backup| (backup.to_path_buf(), original.clone()))
        })
        .collect();

    tx.begin_provisioning();
    let mut guard = DirectoryGuard::new(ctx.prompt, true);
    let result = ArtifactInstaller::new(ctx).provision(
        &mut guard,
        &ProvisionRequest {
            name: req.name,
            layout: req.layout,
            versions: req.versions,
            properties: req.properties,
            launch: req.launch,
            init_server: true,
            directory_may_be_filled: true,
            carry_over: &carry_over,
        },
    );

    match result {
        Ok(report) => {
            tx.commit();
            Ok(report)
        }
        Err(err) => {
            println!("An error occurred ({err})! Undoing update...");
            if let Err(restore_err) = tx.rollback() {
                tracing::error!("rollback incomplete: {restore_err}");
            }
            Err(Error::UpdateFailed {
                name: req.name.to_string(),
                source: Box::new(err),
            })
        }
    }
}
