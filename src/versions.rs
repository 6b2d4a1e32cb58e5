//! Game, loader and installer version selection.

use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::prompt::PromptChoice;
use crate::remote::RemoteVersionService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Game,
    Loader,
    Installer,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Game => "game",
            Channel::Loader => "loader",
            Channel::Installer => "installer",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a channel listing, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionDescriptor {
    pub version: String,
    pub stable: bool,
}

impl VersionDescriptor {
    pub fn new(version: impl Into<String>, stable: bool) -> Self {
        Self {
            version: version.into(),
            stable,
        }
    }
}

/// How a channel's version is picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionChoice {
    Ask,
    Latest,
    Exact(String),
}

impl FromStr for VersionChoice {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim() {
            "ask" => VersionChoice::Ask,
            "latest" => VersionChoice::Latest,
            other => VersionChoice::Exact(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSelection {
    pub game: VersionChoice,
    pub loader: VersionChoice,
    pub installer: VersionChoice,
}

impl Default for VersionSelection {
    fn default() -> Self {
        Self {
            game: VersionChoice::Ask,
            loader: VersionChoice::Latest,
            installer: VersionChoice::Latest,
        }
    }
}

impl VersionSelection {
    pub fn latest() -> Self {
        Self {
            game: VersionChoice::Latest,
            loader: VersionChoice::Latest,
            installer: VersionChoice::Latest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersions {
    pub game: VersionDescriptor,
    pub loader: VersionDescriptor,
    pub installer: VersionDescriptor,
}

impl ResolvedVersions {
    pub fn server_jar_url(&self, base: &str) -> String {
        format!(
            "{}/loader/{}/{}/{}/server/jar",
            base.trim_end_matches('/'),
            self.game.version,
            self.loader.version,
            self.installer.version
        )
    }
}

pub struct VersionResolver<'a> {
    remote: &'a dyn RemoteVersionService,
    prompt: &'a dyn PromptChoice,
    allow_snapshots: bool,
    allow_unstable: bool,
}

impl<'a> VersionResolver<'a> {
    pub fn new(
        remote: &'a dyn RemoteVersionService,
        prompt: &'a dyn PromptChoice,
        allow_snapshots: bool,
        allow_unstable: bool,
    ) -> Self {
        Self {
            remote,
            prompt,
            allow_snapshots,
            allow_unstable,
        }
    }

    pub fn resolve(&self, selection: &VersionSelection) -> Result<ResolvedVersions> {
        tracing::info!("getting latest versions...");
        Ok(ResolvedVersions {
            game: self.resolve_channel(Channel::Game, &selection.game)?,
            loader: self.resolve_channel(Channel::Loader, &selection.loader)?,
            installer: self.resolve_channel(Channel::Installer, &selection.installer)?,
        })
    }

    pub fn resolve_channel(&self, channel: Channel, choice: &VersionChoice) -> Result<VersionDescriptor> {
        if let VersionChoice::Exact(version) = choice {
            println!("Using given {channel} version ({version})");
            return Ok(VersionDescriptor::new(version.clone(), true));
        }

        let versions = self.available(channel)?;
        if versions.is_empty() {
            return Err(Error::NoVersionsAvailable(channel));
        }

        let chosen = match choice {
            VersionChoice::Latest => {
                println!("Using latest {channel} version ({})", versions[0].version);
                versions[0].clone()
            }
            _ => {
                let options: Vec<String> = versions.iter().map(|v| v.version.clone()).collect();
                let index = self.prompt.choose(&format!("select {channel} version"), &options)?;
                let chosen = versions
                    .get(index)
                    .cloned()
                    .ok_or_else(|| Error::Prompt(format!("no option at index {index}")))?;
                println!("Using {channel} version {}", chosen.version);
                chosen
            }
        };
        Ok(chosen)
    }

    /// Channel listing with unstable entries removed unless allowed.
    pub fn available(&self, channel: Channel) -> Result<Vec<VersionDescriptor>> {
        let allow_unstable = match channel {
            Channel::Game => self.allow_snapshots,
            Channel::Loader | Channel::Installer => self.allow_unstable,
        };
        let mut versions = self.remote.versions(channel)?;
        if !allow_unstable {
            versions.retain(|v| v.stable);
        }
        tracing::debug!("{} {channel} versions available", versions.len());
        Ok(versions)
    }
}
