//! fabricdw - Fabric server installation manager
//!
//! Creates, copies, moves, updates and deletes local Fabric server
//! installations tracked in a small registry file.

pub mod cancel;
pub mod context;
pub mod error;
pub mod guard;
pub mod install;
pub mod launch_script;
pub mod models;
pub mod operations;
pub mod paths;
pub mod prompt;
pub mod properties;
pub mod registry;
pub mod remote;
pub mod update;
pub mod versions;

#[cfg(test)]
mod test_utils;

pub use cancel::Cancellation;
pub use context::{Context, LaunchSettings, Options};
pub use error::{Error, Result};
pub use install::{ArtifactInstaller, JavaInitializer, ServerInitializer};
pub use models::{Defaults, Installation};
pub use operations::{CopyRequest, CreateRequest, ListEntry, UpdateOptions};
pub use paths::{InstallationLayout, Paths};
pub use prompt::{InquirePrompt, PromptChoice};
pub use registry::Registry;
pub use remote::{ArtifactDownloader, FabricMeta, RemoteVersionService};
pub use update::UpdateTransaction;
pub use versions::{Channel, VersionChoice, VersionDescriptor, VersionSelection};
