//! Provisioning: download, one-shot server initialization, launch script
//! and `server.properties` patching.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::context::{Context, LaunchSettings};
use crate::error::{Error, Result};
use crate::guard::DirectoryGuard;
use crate::launch_script::LaunchScript;
use crate::paths::InstallationLayout;
use crate::properties::{self, DEFAULT_LEVEL_NAME, DEFAULT_SERVER_PORT, LEVEL_NAME, SERVER_PORT};
use crate::versions::{ResolvedVersions, VersionResolver, VersionSelection};

/// Runs the downloaded server once so it writes its default files.
pub trait ServerInitializer {
    fn initialize(&self, dir: &Path, jar: &Path, show_output: bool) -> Result<()>;
}

/// Runs `<java> -jar <jar> nogui --initSettings`. The server writes
/// `server.properties` and `eula.txt` and exits without loading a world.
#[derive(Debug, Clone)]
pub struct JavaInitializer {
    pub java: String,
}

impl Default for JavaInitializer {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
        }
    }
}

impl ServerInitializer for JavaInitializer {
    fn initialize(&self, dir: &Path, jar: &Path, show_output: bool) -> Result<()> {
        let output = || {
            if show_output {
                Stdio::inherit()
            } else {
                Stdio::null()
            }
        };

        let status = Command::new(&self.java)
            .arg("-jar")
            .arg(jar)
            .args(["nogui", "--initSettings"])
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .status()
            .map_err(|e| Error::io(format!("failed to run {}", self.java), e))?;

        if !status.success() {
            tracing::warn!("server initialization exited with {status}");
        }
        Ok(())
    }
}

/// Inputs of one provisioning run.
pub struct ProvisionRequest<'a> {
    pub name: &'a str,
    pub layout: &'a InstallationLayout,
    pub versions: &'a VersionSelection,
    pub properties: &'a BTreeMap<String, String>,
    pub launch: &'a LaunchSettings,
    /// Download and initialize the server jar.
    pub init_server: bool,
    /// Skip the non-empty directory check.
    pub directory_may_be_filled: bool,
    /// `(from, to)` copies applied right after initialization, before the
    /// launch script is written and properties are patched.
    pub carry_over: &'a [(PathBuf, PathBuf)],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionReport {
    pub versions: Option<ResolvedVersions>,
    pub unused_properties: BTreeMap<String, String>,
}

pub struct ArtifactInstaller<'c, 'a> {
    ctx: &'c Context<'a>,
}

impl<'c, 'a> ArtifactInstaller<'c, 'a> {
    pub fn new(ctx: &'c Context<'a>) -> Self {
        Self { ctx }
    }

    pub fn provision(&self, guard: &mut DirectoryGuard<'_>, req: &ProvisionRequest<'_>) -> Result<ProvisionReport> {
        let root = req.layout.root();
        if !req.directory_may_be_filled {
            guard.ensure_okay_to_write_into(root, "cancelling installation")?;
        }
        self.ctx.cancel.check()?;

        let versions = if req.init_server {
            Some(self.download_and_initialize(req)?)
        } else {
            None
        };

        for (from, to) in req.carry_over {
            std::fs::copy(from, to).map_err(|e| {
                Error::io(
                    format!("failed to restore {} from {}", to.display(), from.display()),
                    e,
                )
            })?;
        }
        self.ctx.cancel.check()?;

        self.generate_launch_script(req)?;
        self.ctx.cancel.check()?;

        tracing::info!("modifying server.properties file...");
        let unused_properties = properties::modify(&req.layout.properties_file(), req.properties)?;

        Ok(ProvisionReport {
            versions,
            unused_properties,
        })
    }

    fn download_and_initialize(&self, req: &ProvisionRequest<'_>) -> Result<ResolvedVersions> {
        let resolver = VersionResolver::new(
            self.ctx.remote,
            self.ctx.prompt,
            self.ctx.options.allow_snapshots,
            self.ctx.options.allow_unstable,
        );
        let resolved = resolver.resolve(req.versions)?;
        self.ctx.cancel.check()?;

        let url = resolved.server_jar_url(self.ctx.remote.base_url());
        let jar = self.ctx.downloader.download(&url, req.layout.root())?;
        self.ctx.cancel.check()?;

        self.initialize_server(req.layout.root(), &jar)?;
        self.ctx.cancel.check()?;
        Ok(resolved)
    }

    pub fn initialize_server(&self, dir: &Path, jar: &Path) -> Result<()> {
        println!("initializing the server...");
        tracing::debug!("running {} in {}", jar.display(), dir.display());
        self.ctx
            .initializer
            .initialize(dir, jar, self.ctx.options.show_init_output)
    }

    /// World name and port come from the overrides, then from the
    /// properties file, then from the server defaults.
    pub fn generate_launch_script(&self, req: &ProvisionRequest<'_>) -> Result<()> {
        let properties_file = req.layout.properties_file();
        let current = if properties_file.exists() {
            properties::read(&properties_file, &[LEVEL_NAME, SERVER_PORT])?
        } else {
            BTreeMap::new()
        };
        let effective = |key: &str, fallback: &str| -> String {
            req.properties
                .get(key)
                .cloned()
                .or_else(|| current.get(key).cloned().flatten())
                .unwrap_or_else(|| fallback.to_string())
        };
        let world_name = effective(LEVEL_NAME, DEFAULT_LEVEL_NAME);
        let port = effective(SERVER_PORT, DEFAULT_SERVER_PORT);

        LaunchScript {
            session_name: req.name,
            layout: req.layout,
            world_name: &world_name,
            port: &port,
            settings: req.launch,
        }
        .write(&req.layout.launch_script())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Fixture;
    use crate::versions::VersionSelection;
    use tempfile::TempDir;

    fn request<'a>(
        layout: &'a InstallationLayout,
        versions: &'a VersionSelection,
        properties: &'a BTreeMap<String, String>,
        launch: &'a LaunchSettings,
    ) -> ProvisionRequest<'a> {
        ProvisionRequest {
            name: "alpha",
            layout,
            versions,
            properties,
            launch,
            init_server: true,
            directory_may_be_filled: false,
            carry_over: &[],
        }
    }

    #[test]
    fn provision_runs_whole_pipeline() {
        let fixture = Fixture::new();
        let ctx = fixture.context();
        let temp = TempDir::new().unwrap();
        let layout = InstallationLayout::new(temp.path());
        let versions = VersionSelection::latest();
        let mut props = BTreeMap::new();
        props.insert("motd".to_string(), "hello".to_string());
        props.insert("bogus".to_string(), "1".to_string());
        let launch = fixture.launch_settings();

        let mut guard = DirectoryGuard::new(ctx.prompt, false);
        let report = ArtifactInstaller::new(&ctx)
            .provision(&mut guard, &request(&layout, &versions, &props, &launch))
            .unwrap();

        let resolved = report.versions.unwrap();
        assert_eq!(resolved.game.version, "1.20.1");
        assert_eq!(
            fixture.downloader.urls(),
            ["https://meta.test/v2/versions/loader/1.20.1/0.14.22/0.11.2/server/jar"]
        );
        assert!(layout.server_jar().exists());
        assert!(layout.eula_file().exists());
        assert_eq!(fixture.initializer.runs(), 1);

        let props_content = std::fs::read_to_string(layout.properties_file()).unwrap();
        assert!(props_content.contains("motd=hello\n"));
        assert_eq!(report.unused_properties.keys().collect::<Vec<_>>(), ["bogus"]);

        let script = std::fs::read_to_string(layout.launch_script()).unwrap();
        assert!(script.contains("export SESSION_NAME=\"alpha\"\n"));
        assert!(script.contains("export GAME_PORT=\"25565\"\n"));
    }

    #[test]
    fn invalid_combination_stops_before_initialization() {
        let fixture = Fixture::new();
        fixture.downloader.fail_with_status();
        let ctx = fixture.context();
        let temp = TempDir::new().unwrap();
        let layout = InstallationLayout::new(temp.path());
        let versions = VersionSelection::latest();
        let props = BTreeMap::new();
        let launch = fixture.launch_settings();

        let mut guard = DirectoryGuard::new(ctx.prompt, false);
        let err = ArtifactInstaller::new(&ctx)
            .provision(&mut guard, &request(&layout, &versions, &props, &launch))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidVersionCombination { .. }));
        assert_eq!(fixture.initializer.runs(), 0);
        assert!(!layout.launch_script().exists());
    }

    #[test]
    fn declined_non_empty_directory_aborts() {
        let fixture = Fixture::with_answers([0]);
        let ctx = fixture.context();
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("foreign"), "x").unwrap();
        let layout = InstallationLayout::new(temp.path());
        let versions = VersionSelection::latest();
        let props = BTreeMap::new();
        let launch = fixture.launch_settings();

        let mut guard = DirectoryGuard::new(ctx.prompt, false);
        let err = ArtifactInstaller::new(&ctx)
            .provision(&mut guard, &request(&layout, &versions, &props, &launch))
            .unwrap_err();

        assert!(matches!(err, Error::DirectoryWriteCancelled { .. }));
        assert!(fixture.downloader.urls().is_empty());
    }

    #[test]
    fn cancellation_is_observed_between_steps() {
        let fixture = Fixture::new();
        let ctx = fixture.context();
        ctx.cancel.cancel();
        let temp = TempDir::new().unwrap();
        let layout = InstallationLayout::new(temp.path());
        let versions = VersionSelection::latest();
        let props = BTreeMap::new();
        let launch = fixture.launch_settings();

        let mut guard = DirectoryGuard::new(ctx.prompt, false);
        let err = ArtifactInstaller::new(&ctx)
            .provision(&mut guard, &request(&layout, &versions, &props, &launch))
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(fixture.downloader.urls().is_empty());
    }

    #[test]
    fn launch_script_reads_world_from_existing_properties() {
        let fixture = Fixture::new();
        let ctx = fixture.context();
        let temp = TempDir::new().unwrap();
        let layout = InstallationLayout::new(temp.path());
        std::fs::write(layout.properties_file(), "level-name=hub\nserver-port=25570\n").unwrap();
        let versions = VersionSelection::latest();
        let props = BTreeMap::new();
        let launch = fixture.launch_settings();

        let mut req = request(&layout, &versions, &props, &launch);
        req.init_server = false;
        req.directory_may_be_filled = true;
        let mut guard = DirectoryGuard::new(ctx.prompt, false);
        ArtifactInstaller::new(&ctx).provision(&mut guard, &req).unwrap();

        let script = std::fs::read_to_string(layout.launch_script()).unwrap();
        assert!(script.contains("export BACKUP_PATHS=\"hub hub_nether hub_the_end\"\n"));
        assert!(script.contains("export GAME_PORT=\"25570\"\n"));
    }
}
