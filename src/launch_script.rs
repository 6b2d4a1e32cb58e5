//! The generated `fabricdw` launch script.
//!
//! The script exports the launcher's environment and hands over to `fabricd`.
//! Every export is a single `export KEY="value"` line, so existing scripts can
//! be retargeted with the properties engine.

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::context::LaunchSettings;
use crate::error::{Error, Result};
use crate::paths::{InstallationLayout, SERVER_JAR_FILE};
use crate::properties;

const LAUNCHER: &str = "fabricd";
const DEFAULT_IDLE_TIME: u64 = 900;

pub struct LaunchScript<'a> {
    pub session_name: &'a str,
    pub layout: &'a InstallationLayout,
    pub world_name: &'a str,
    pub port: &'a str,
    pub settings: &'a LaunchSettings,
}

impl LaunchScript<'_> {
    pub fn render(&self) -> String {
        let root = self.layout.root().display().to_string();
        let backup_dest = self.layout.backup_dir().display().to_string();
        let world = self.world_name;
        let idle_time = if self.settings.idle_time == 0 {
            DEFAULT_IDLE_TIME
        } else {
            self.settings.idle_time
        };

        let exports = [
            ("GAME_USER", self.settings.user.clone()),
            ("IDLE_SERVER", (self.settings.idle_time != 0).to_string()),
            ("IDLE_IF_TIME", idle_time.to_string()),
            ("SERVER_ROOT", root),
            ("BACKUP_DEST", backup_dest),
            ("BACKUP_PATHS", format!("{world} {world}_nether {world}_the_end")),
            ("KEEP_BACKUPS", self.settings.backups.to_string()),
            ("SESSION_NAME", self.session_name.to_string()),
            ("GAME_PORT", self.port.to_string()),
            ("SERVER_START_CMD", launch_command(self.settings)),
        ];

        let mut script = String::from("#!/bin/sh\n");
        for (key, value) in exports {
            script.push_str(&format!("export {key}={}\n", quote(&value)));
        }
        script.push_str(&format!("exec {LAUNCHER} \"$@\"\n"));
        script
    }

    /// Write the script and mark it executable.
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())
            .map_err(|e| Error::io(format!("failed to write {}", path.display()), e))?;
        let mut perms = std::fs::metadata(path)
            .map_err(|e| Error::io(format!("failed to stat {}", path.display()), e))?
            .permissions();
        perms.set_mode(perms.mode() | 0o111);
        std::fs::set_permissions(path, perms)
            .map_err(|e| Error::io(format!("failed to chmod {}", path.display()), e))?;
        Ok(())
    }
}

pub fn launch_command(settings: &LaunchSettings) -> String {
    let mut parts = vec![
        settings.java.clone(),
        "-Dlog4j2.formatMsgNoLookups=true".to_string(),
        format!("-Xms{}M", gib_to_mib(settings.min_ram)),
        format!("-Xmx{}M", gib_to_mib(settings.max_ram)),
    ];
    parts.extend(settings.java_args.iter().cloned());
    parts.extend([
        "-jar".to_string(),
        format!("./{SERVER_JAR_FILE}"),
        "nogui".to_string(),
    ]);
    parts.join(" ")
}

/// Point an existing script at a new root and/or session name. A missing
/// script is left alone.
pub fn retarget(layout: &InstallationLayout, session_name: Option<&str>) -> Result<()> {
    let path = layout.launch_script();
    if !path.exists() {
        tracing::warn!("no launch script at {}, nothing to update", path.display());
        return Ok(());
    }

    let mut replacements = BTreeMap::new();
    replacements.insert(
        "export SERVER_ROOT".to_string(),
        quote(&layout.root().display().to_string()),
    );
    replacements.insert(
        "export BACKUP_DEST".to_string(),
        quote(&layout.backup_dir().display().to_string()),
    );
    if let Some(name) = session_name {
        replacements.insert("export SESSION_NAME".to_string(), quote(name));
    }
    properties::modify(&path, &replacements)?;
    Ok(())
}

fn gib_to_mib(gib: f64) -> u64 {
    (gib * 1024.0) as u64
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
