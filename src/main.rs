//! fabricdw - Fabric server installation manager CLI

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use fabricdw::paths::absolute_path;
use fabricdw::properties::parse_overrides;
use fabricdw::{
    cancel, operations, remote, Cancellation, Context, CopyRequest, CreateRequest, Defaults,
    Error, FabricMeta, InquirePrompt, JavaInitializer, LaunchSettings, Options, Paths, Registry, Result,
    UpdateOptions, VersionChoice, VersionSelection,
};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fabricdw")]
#[command(about = "Fabric server installation manager - create, copy, move, update and delete server installations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and set up a new server installation
    Create {
        /// Installation name
        name: String,

        /// Installation directory
        dir: String,

        #[command(flatten)]
        properties: PropertyArgs,

        #[command(flatten)]
        versions: VersionArgs,

        #[command(flatten)]
        launch: LaunchArgs,

        /// Write into a non-empty directory without asking
        #[arg(long)]
        allow_non_empty: bool,
    },

    /// Copy an installation to a new directory under a new name
    Copy {
        /// Installation to copy
        source: String,

        /// Name of the copy
        target: String,

        /// Directory of the copy
        dir: String,

        #[command(flatten)]
        properties: PropertyArgs,

        #[command(flatten)]
        launch: LaunchArgs,

        /// Write into a non-empty directory without asking
        #[arg(long)]
        allow_non_empty: bool,
    },

    /// Move an installation to another directory
    Move {
        /// Installation name
        name: String,

        /// New directory
        dir: String,

        /// Write into a non-empty directory without asking
        #[arg(long)]
        allow_non_empty: bool,
    },

    /// Rename an installation
    Rename {
        /// Current name
        source: String,

        /// New name
        target: String,
    },

    /// Re-download the server and regenerate its files, keeping settings
    Update {
        /// Installation name
        name: String,

        #[command(flatten)]
        properties: PropertyArgs,

        #[command(flatten)]
        versions: VersionArgs,

        #[command(flatten)]
        launch: LaunchArgs,

        /// Keep the previous files as <file>-bak
        #[arg(long)]
        keep_backups: bool,
    },

    /// Delete an installation and all of its files
    Delete {
        /// Installation name
        name: String,

        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Register an existing installation directory
    Import {
        /// Installation name
        name: String,

        /// Existing installation directory
        dir: String,
    },

    /// List registered installations
    List {
        /// Check that every installation directory still exists
        #[arg(long)]
        verify: bool,
    },

    /// Show resolved paths (for debugging)
    Paths,
}

#[derive(Args)]
struct PropertyArgs {
    /// server.properties override (repeatable)
    #[arg(short = 'p', long = "property", value_name = "KEY=VALUE")]
    properties: Vec<String>,
}

#[derive(Args)]
struct VersionArgs {
    /// Game version: ask, latest or an exact version
    #[arg(long, default_value = "ask")]
    game: VersionChoice,

    /// Loader version: ask, latest or an exact version
    #[arg(long, default_value = "latest")]
    loader: VersionChoice,

    /// Installer version: ask, latest or an exact version
    #[arg(long, default_value = "latest")]
    installer: VersionChoice,

    /// Offer game snapshots
    #[arg(long)]
    snapshots: bool,

    /// Offer unstable loader and installer versions
    #[arg(long)]
    unstable: bool,

    /// Show the output of the server initialization
    #[arg(long)]
    show_init_output: bool,
}

impl VersionArgs {
    fn selection(&self) -> VersionSelection {
        VersionSelection {
            game: self.game.clone(),
            loader: self.loader.clone(),
            installer: self.installer.clone(),
        }
    }

    fn apply(&self, options: &mut Options) {
        options.allow_snapshots = self.snapshots;
        options.allow_unstable = self.unstable;
        options.show_init_output = self.show_init_output;
    }
}

#[derive(Args)]
struct LaunchArgs {
    /// User the server runs as (default: current user)
    #[arg(long)]
    user: Option<String>,

    /// Minimum RAM in GiB
    #[arg(long)]
    min_ram: Option<f64>,

    /// Maximum RAM in GiB
    #[arg(long)]
    max_ram: Option<f64>,

    /// Seconds without players before the server idles (0 disables idling)
    #[arg(long)]
    idle_time: Option<u64>,

    /// Number of world backups to keep
    #[arg(long)]
    backups: Option<u32>,

    /// Java executable
    #[arg(long, default_value = "java")]
    java: String,

    /// Extra JVM argument (repeatable)
    #[arg(long = "java-arg", value_name = "ARG", allow_hyphen_values = true)]
    java_args: Vec<String>,
}

impl LaunchArgs {
    fn settings(&self, defaults: &Defaults) -> LaunchSettings {
        let mut settings = LaunchSettings::from_defaults(defaults);
        if let Some(user) = &self.user {
            settings.user = user.clone();
        }
        settings.min_ram = self.min_ram.unwrap_or(settings.min_ram);
        settings.max_ram = self.max_ram.unwrap_or(settings.max_ram);
        settings.idle_time = self.idle_time.unwrap_or(settings.idle_time);
        settings.backups = self.backups.unwrap_or(settings.backups);
        settings.java = self.java.clone();
        settings.java_args = self.java_args.clone();
        settings
    }

    fn initializer(&self) -> JavaInitializer {
        JavaInitializer {
            java: self.java.clone(),
        }
    }
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fabricdw={level}")));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Services for one command, borrowed by its [`Context`].
struct Services {
    meta: FabricMeta,
    initializer: JavaInitializer,
    prompt: InquirePrompt,
}

impl Services {
    fn new(initializer: JavaInitializer) -> Result<Self> {
        Ok(Self {
            meta: FabricMeta::from_env()?,
            initializer,
            prompt: InquirePrompt,
        })
    }

    fn context(&self, options: Options) -> Context<'_> {
        Context {
            remote: &self.meta,
            downloader: &self.meta,
            initializer: &self.initializer,
            prompt: &self.prompt,
            options,
            cancel: Cancellation::interrupt(),
        }
    }
}

fn run(command: Commands, registry: &mut Registry) -> Result<()> {
    match command {
        Commands::Paths => {
            println!("Registry file: {}", registry.path().display());
            println!("Registry exists: {}", registry.path().exists());
            let meta = std::env::var("FABRICDW_META_URL").unwrap_or_else(|_| remote::DEFAULT_META_URL.to_string());
            println!("Meta API: {meta}");
        }
        Commands::Create {
            name,
            dir,
            properties: props,
            versions,
            launch,
            allow_non_empty,
        } => {
            let services = Services::new(launch.initializer())?;
            let mut options = Options {
                allow_non_empty,
                ..Options::default()
            };
            versions.apply(&mut options);
            let req = CreateRequest {
                name,
                dir: absolute_path(&dir)?,
                properties: parse_overrides(&props.properties),
                versions: versions.selection(),
                launch: launch.settings(registry.defaults()),
            };
            operations::create(&services.context(options), registry, &req)?;
        }
        Commands::Copy {
            source,
            target,
            dir,
            properties: props,
            launch,
            allow_non_empty,
        } => {
            let services = Services::new(launch.initializer())?;
            let options = Options {
                allow_non_empty,
                ..Options::default()
            };
            let req = CopyRequest {
                source,
                target,
                dir: absolute_path(&dir)?,
                properties: parse_overrides(&props.properties),
                launch: launch.settings(registry.defaults()),
            };
            let report = operations::copy(&services.context(options), registry, &req)?;
            if !report.port_conflicts.is_empty() {
                println!(
                    "Remember to change {} in server.properties AND in the fabricdw file!",
                    report.port_conflicts.join(" and ")
                );
            }
        }
        Commands::Move {
            name,
            dir,
            allow_non_empty,
        } => {
            let services = Services::new(JavaInitializer::default())?;
            let options = Options {
                allow_non_empty,
                ..Options::default()
            };
            let dir = absolute_path(&dir)?;
            operations::move_installation(&services.context(options), registry, &name, &dir)?;
        }
        Commands::Rename { source, target } => {
            operations::rename(registry, &source, &target)?;
        }
        Commands::Update {
            name,
            properties: props,
            versions,
            launch,
            keep_backups,
        } => {
            let services = Services::new(launch.initializer())?;
            let mut options = Options::default();
            versions.apply(&mut options);
            let opts = UpdateOptions {
                versions: versions.selection(),
                properties: parse_overrides(&props.properties),
                launch: launch.settings(registry.defaults()),
                keep_backups,
            };
            operations::update(&services.context(options), registry, &name, &opts)?;
        }
        Commands::Delete { name, yes } => {
            let services = Services::new(JavaInitializer::default())?;
            operations::delete(&services.context(Options::default()), registry, &name, yes)?;
        }
        Commands::Import { name, dir } => {
            let dir = absolute_path(&dir)?;
            operations::import(registry, &name, &dir)?;
        }
        Commands::List { verify } => {
            let entries = operations::list(registry, verify);
            if entries.is_empty() {
                println!("No installations registered.");
            }
            for entry in entries {
                println!("{entry}");
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(e) = cancel::install_interrupt_handler() {
        tracing::warn!("{e}");
    }

    let paths = Paths::resolve();
    let mut registry = match Registry::load(paths.registry_file()) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(cli.command, &mut registry);

    if let Err(e) = registry.save() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_cancelled() => {
            eprintln!("Cancelled.");
            ExitCode::from(130)
        }
        // already reported by the directory check
        Err(Error::DirectoryWriteCancelled { .. }) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
