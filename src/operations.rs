//! The installation verbs: create, copy, move, rename, update, delete,
//! import and list.
//!
//! Every verb takes the registry by reference and mutates it in memory only.
//! The caller saves it once the verb returns, on success and failure alike.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::context::{Context, LaunchSettings};
use crate::error::{Error, Result};
use crate::guard::DirectoryGuard;
use crate::install::{ArtifactInstaller, ProvisionReport, ProvisionRequest};
use crate::launch_script;
use crate::models::Installation;
use crate::paths::InstallationLayout;
use crate::prompt::confirm;
use crate::properties::{
    self, DEFAULT_LEVEL_NAME, DEFAULT_SERVER_PORT, LEVEL_NAME, QUERY_PORT, SERVER_PORT,
};
use crate::registry::Registry;
use crate::update::{self, UpdateRequest};
use crate::versions::VersionSelection;

pub struct CreateRequest {
    pub name: String,
    pub dir: PathBuf,
    pub properties: BTreeMap<String, String>,
    pub versions: VersionSelection,
    pub launch: LaunchSettings,
}

pub struct CopyRequest {
    pub source: String,
    pub target: String,
    pub dir: PathBuf,
    pub properties: BTreeMap<String, String>,
    pub launch: LaunchSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyReport {
    pub installation: Installation,
    /// Property keys whose value is the same as in the source installation.
    pub port_conflicts: Vec<String>,
    pub unused_properties: BTreeMap<String, String>,
}

pub struct UpdateOptions {
    pub versions: VersionSelection,
    pub properties: BTreeMap<String, String>,
    pub launch: LaunchSettings,
    pub keep_backups: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub installation: Installation,
    /// `Some(ok)` when verification was requested.
    pub verified: Option<bool>,
}

impl std::fmt::Display for ListEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.verified {
            Some(true) => write!(f, "[ OK ] {}", self.installation),
            Some(false) => write!(f, "[FAIL] {}", self.installation),
            None => write!(f, "{}", self.installation),
        }
    }
}

/// Provision a new installation in `req.dir` and register it.
///
/// The name is checked before anything touches the filesystem. On error or
/// cancellation the directory is removed again unless it held foreign
/// content before.
pub fn create(ctx: &Context<'_>, registry: &mut Registry, req: &CreateRequest) -> Result<Installation> {
    registry.ensure_does_not_exist(&req.name)?;

    let mut guard = DirectoryGuard::new(ctx.prompt, ctx.options.allow_non_empty);
    guard.ensure_okay_to_write_into(&req.dir, "cancelling installation")?;
    create_dir(&req.dir)?;

    let mut properties = req.properties.clone();
    properties
        .entry(LEVEL_NAME.to_string())
        .or_insert_with(|| DEFAULT_LEVEL_NAME.to_string());
    properties
        .entry(SERVER_PORT.to_string())
        .or_insert_with(|| DEFAULT_SERVER_PORT.to_string());

    let layout = InstallationLayout::new(&req.dir);
    let result = ArtifactInstaller::new(ctx).provision(
        &mut guard,
        &ProvisionRequest {
            name: &req.name,
            layout: &layout,
            versions: &req.versions,
            properties: &properties,
            launch: &req.launch,
            init_server: true,
            directory_may_be_filled: true,
            carry_over: &[],
        },
    );
    clean_up_on_failure(&guard, &req.dir, result)?;

    let installation = registry.add(&req.name, &req.dir)?;
    println!("installation '{}' created! ({})", installation.name, installation.root.display());
    Ok(installation)
}

/// Copy an installation to a new directory under a new name.
///
/// A changed `level-name` renames the world directory and its `_nether` and
/// `_the_end` siblings. Ports equal to the source's are reported.
pub fn copy(ctx: &Context<'_>, registry: &mut Registry, req: &CopyRequest) -> Result<CopyReport> {
    let source = registry.ensure_exists(&req.source)?;
    registry.ensure_does_not_exist(&req.target)?;
    // copying into the source itself truncates its files or never terminates
    if req.dir.starts_with(&source.root) {
        return Err(Error::InvalidPath(req.dir.clone()));
    }

    let mut guard = DirectoryGuard::new(ctx.prompt, ctx.options.allow_non_empty);
    guard.ensure_okay_to_write_into(&req.dir, "copy cancelled")?;
    create_dir(&req.dir)?;

    let result = copy_into(ctx, &mut guard, &source, req);
    let (port_conflicts, provisioned) = clean_up_on_failure(&guard, &req.dir, result)?;

    let installation = registry.add(&req.target, &req.dir)?;
    println!(
        "Copied {} as {} ('{}' -> '{}')",
        source.name,
        installation.name,
        source.root.display(),
        installation.root.display()
    );
    Ok(CopyReport {
        installation,
        port_conflicts,
        unused_properties: provisioned.unused_properties,
    })
}

fn copy_into(
    ctx: &Context<'_>,
    guard: &mut DirectoryGuard<'_>,
    source: &Installation,
    req: &CopyRequest,
) -> Result<(Vec<String>, ProvisionReport)> {
    tracing::info!("copying {} to {}", source.root.display(), req.dir.display());
    copy_dir_all(&source.root, &req.dir).map_err(|e| {
        Error::io(
            format!("failed to copy {} to {}", source.root.display(), req.dir.display()),
            e,
        )
    })?;
    ctx.cancel.check()?;

    let layout = InstallationLayout::new(&req.dir);
    let current = if layout.properties_file().exists() {
        properties::read(&layout.properties_file(), &[LEVEL_NAME, SERVER_PORT, QUERY_PORT])?
    } else {
        BTreeMap::new()
    };
    let source_value = |key: &str| current.get(key).cloned().flatten();

    let source_world = source_value(LEVEL_NAME).unwrap_or_else(|| DEFAULT_LEVEL_NAME.to_string());
    let source_port = source_value(SERVER_PORT).unwrap_or_else(|| DEFAULT_SERVER_PORT.to_string());

    let mut properties = req.properties.clone();
    let world = properties
        .entry(LEVEL_NAME.to_string())
        .or_insert_with(|| source_world.clone())
        .clone();
    let port = properties
        .entry(SERVER_PORT.to_string())
        .or_insert_with(|| source_port.clone())
        .clone();
    let query_port = properties
        .entry(QUERY_PORT.to_string())
        .or_insert_with(|| port.clone())
        .clone();

    if world != source_world {
        rename_world(&req.dir, &source_world, &world)?;
    }

    let mut port_conflicts = Vec::new();
    if port == source_port {
        tracing::warn!(
            "the server port of '{}' is the same as '{}' ({port})",
            req.target,
            source.name
        );
        port_conflicts.push(SERVER_PORT.to_string());
    }
    if source_value(QUERY_PORT).is_some_and(|source_query| source_query == query_port) {
        tracing::warn!(
            "the query port of '{}' is the same as '{}' ({query_port})",
            req.target,
            source.name
        );
        port_conflicts.push(QUERY_PORT.to_string());
    }
    ctx.cancel.check()?;

    let report = ArtifactInstaller::new(ctx).provision(
        guard,
        &ProvisionRequest {
            name: &req.target,
            layout: &layout,
            versions: &VersionSelection::latest(),
            properties: &properties,
            launch: &req.launch,
            init_server: false,
            directory_may_be_filled: true,
            carry_over: &[],
        },
    )?;
    Ok((port_conflicts, report))
}

/// Some servers keep the nether and the end next to the world directory
/// instead of inside it, so the siblings are renamed only when present.
fn rename_world(dir: &Path, from: &str, to: &str) -> Result<()> {
    for suffix in ["", "_nether", "_the_end"] {
        let old = dir.join(format!("{from}{suffix}"));
        let new = dir.join(format!("{to}{suffix}"));
        if !old.exists() {
            tracing::debug!("{} not present, not renamed", old.display());
            continue;
        }
        if new.exists() {
            tracing::warn!("{} already exists, keeping {}", new.display(), old.display());
            continue;
        }
        std::fs::rename(&old, &new).map_err(|e| {
            Error::io(format!("failed to rename {} to {}", old.display(), new.display()), e)
        })?;
        tracing::info!("renamed {} -> {}", old.display(), new.display());
    }
    Ok(())
}

/// Move an installation's files to `new_root` and point the launch script at
/// the new location. Entries already moved are put back on failure.
pub fn move_installation(
    ctx: &Context<'_>,
    registry: &mut Registry,
    name: &str,
    new_root: &Path,
) -> Result<Installation> {
    let installation = registry.ensure_exists(name)?;
    let old_root = installation.root.clone();
    if old_root == new_root {
        println!("{installation} is already there");
        return Ok(installation);
    }
    if new_root.starts_with(&old_root) {
        return Err(Error::InvalidPath(new_root.to_path_buf()));
    }

    let mut guard = DirectoryGuard::new(ctx.prompt, ctx.options.allow_non_empty);
    guard.ensure_okay_to_write_into(new_root, "move cancelled")?;
    create_dir(new_root)?;

    let mut moved = Vec::new();
    if let Err(err) = move_contents(ctx, &old_root, new_root, &mut moved) {
        report_failure(&err);
        for (from, to) in moved.iter().rev() {
            if let Err(e) = move_entry(to, from) {
                tracing::error!("failed to move {} back: {e}", to.display());
            }
        }
        if let Err(e) = guard.remove_dir(new_root) {
            tracing::error!("{e}");
        }
        return Err(err);
    }

    if let Err(e) = std::fs::remove_dir(&old_root) {
        tracing::warn!("could not remove {}: {e}", old_root.display());
    }

    let installation = registry.set_root(name, new_root)?;
    launch_script::retarget(&InstallationLayout::new(new_root), None)?;
    println!(
        "Moved {} ('{}' -> '{}')",
        installation.name,
        old_root.display(),
        new_root.display()
    );
    Ok(installation)
}

fn move_contents(
    ctx: &Context<'_>,
    from: &Path,
    to: &Path,
    moved: &mut Vec<(PathBuf, PathBuf)>,
) -> Result<()> {
    let entries = std::fs::read_dir(from)
        .map_err(|e| Error::io(format!("failed to read {}", from.display()), e))?;
    for entry in entries {
        ctx.cancel.check()?;
        let entry = entry.map_err(|e| Error::io(format!("failed to read {}", from.display()), e))?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        if std::fs::symlink_metadata(&target).is_ok() {
            return Err(Error::io(
                format!("cannot move {}", source.display()),
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} already exists", target.display()),
                ),
            ));
        }
        move_entry(&source, &target).map_err(|e| {
            Error::io(format!("failed to move {} to {}", source.display(), target.display()), e)
        })?;
        tracing::debug!("{} -> {}", source.display(), target.display());
        moved.push((source, target));
    }
    Ok(())
}

/// `rename`, falling back to copy and delete across filesystems.
fn move_entry(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(nix::libc::EXDEV) => {
            if std::fs::symlink_metadata(from)?.is_dir() {
                copy_dir_all(from, to)?;
                std::fs::remove_dir_all(from)
            } else {
                std::fs::copy(from, to)?;
                std::fs::remove_file(from)
            }
        }
        Err(e) => Err(e),
    }
}

/// Give an installation a new name. The launch script's session name follows.
pub fn rename(registry: &mut Registry, name: &str, new_name: &str) -> Result<Installation> {
    let installation = registry.ensure_exists(name)?;
    registry.ensure_does_not_exist(new_name)?;

    launch_script::retarget(&InstallationLayout::new(&installation.root), Some(new_name))?;
    let renamed = registry.rename(name, new_name)?;
    println!("Renamed '{name}' to '{new_name}'");
    Ok(renamed)
}

/// Re-provision an installation with new versions, keeping its settings.
pub fn update(
    ctx: &Context<'_>,
    registry: &Registry,
    name: &str,
    opts: &UpdateOptions,
) -> Result<ProvisionReport> {
    let installation = registry.ensure_exists(name)?;
    let layout = InstallationLayout::new(&installation.root);

    let report = update::reprovision(
        ctx,
        &UpdateRequest {
            name,
            layout: &layout,
            versions: &opts.versions,
            properties: &opts.properties,
            launch: &opts.launch,
            keep_backups: opts.keep_backups,
        },
    )?;
    println!("installation '{name}' updated!");
    Ok(report)
}

/// Delete an installation's directory and drop it from the registry.
/// Returns `false` when the user declined.
pub fn delete(ctx: &Context<'_>, registry: &mut Registry, name: &str, skip_confirm: bool) -> Result<bool> {
    let installation = registry.ensure_exists(name)?;

    if !skip_confirm {
        let question = format!(
            "Remove installation '{}' ({})? This will delete all files!",
            installation.name,
            installation.root.display()
        );
        if !confirm(ctx.prompt, &question)? {
            println!("nothing deleted");
            return Ok(false);
        }
    }

    let guard = DirectoryGuard::new(ctx.prompt, false);
    if !guard.remove_dir(&installation.root)? {
        println!(
            "{} no longer exists, removing the entry only",
            installation.root.display()
        );
    }
    registry.remove(&installation);
    println!("installation {installation} deleted!");
    Ok(true)
}

/// Register an existing directory without touching its files.
pub fn import(registry: &mut Registry, name: &str, dir: &Path) -> Result<Installation> {
    registry.ensure_does_not_exist(name)?;
    if !dir.is_dir() {
        return Err(Error::InvalidPath(dir.to_path_buf()));
    }
    let installation = registry.add(name, dir)?;
    println!("Imported {installation}");
    Ok(installation)
}

pub fn list(registry: &Registry, verify: bool) -> Vec<ListEntry> {
    registry
        .list()
        .iter()
        .map(|installation| ListEntry {
            installation: installation.clone(),
            verified: verify.then(|| installation.root.is_dir()),
        })
        .collect()
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::io(format!("failed to create {}", dir.display()), e))
}

fn report_failure(err: &Error) {
    if err.is_cancelled() {
        println!("Interrupted! Cleaning up...");
    } else {
        println!("An error occurred ({err}), cleaning up...");
    }
}

fn clean_up_on_failure<T>(guard: &DirectoryGuard<'_>, dir: &Path, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        report_failure(err);
        if let Err(e) = guard.remove_dir(dir) {
            tracing::error!("{e}");
        }
    }
    result
}

fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let dst_path = dst.join(entry.file_name());
        if ty.is_dir() {
            copy_dir_all(&entry.path(), &dst_path)?;
        } else {
            std::fs::copy(entry.path(), dst_path)?;
        }
    }
    Ok(())
}
