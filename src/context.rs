//! Everything an operation needs, built once in `main` and passed down.

use crate::cancel::Cancellation;
use crate::install::ServerInitializer;
use crate::models::Defaults;
use crate::prompt::PromptChoice;
use crate::remote::{ArtifactDownloader, RemoteVersionService};

/// Flags shared by the provisioning verbs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub allow_non_empty: bool,
    pub allow_snapshots: bool,
    pub allow_unstable: bool,
    pub show_init_output: bool,
}

pub struct Context<'a> {
    pub remote: &'a dyn RemoteVersionService,
    pub downloader: &'a dyn ArtifactDownloader,
    pub initializer: &'a dyn ServerInitializer,
    pub prompt: &'a dyn PromptChoice,
    pub options: Options,
    pub cancel: Cancellation,
}

/// Values baked into the generated launch script.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSettings {
    pub user: String,
    /// GiB
    pub min_ram: f64,
    /// GiB
    pub max_ram: f64,
    /// Seconds until the server idles, 0 disables idling.
    pub idle_time: u64,
    pub backups: u32,
    pub java: String,
    pub java_args: Vec<String>,
}

impl LaunchSettings {
    /// Settings for the current user with every other value from `defaults`.
    pub fn from_defaults(defaults: &Defaults) -> Self {
        Self {
            user: current_user(),
            min_ram: defaults.min_ram,
            max_ram: defaults.max_ram,
            idle_time: defaults.idle_time,
            backups: defaults.backups,
            java: "java".to_string(),
            java_args: Vec::new(),
        }
    }
}

/// Name of the invoking Unix user, or `$USER`.
pub fn current_user() -> String {
    nix::unistd::User::from_uid(nix::unistd::Uid::current())
        .ok()
        .flatten()
        .map(|u| u.name)
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "minecraft".to_string())
}
