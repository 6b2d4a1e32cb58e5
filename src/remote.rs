//! Fabric meta API access.

use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paths::SERVER_JAR_FILE;
use crate::versions::{Channel, VersionDescriptor};

pub const DEFAULT_META_URL: &str = "https://meta.fabricmc.net/v2/versions";

/// Source of channel listings, newest first.
pub trait RemoteVersionService {
    fn versions(&self, channel: Channel) -> Result<Vec<VersionDescriptor>>;

    /// Base URL the server jar URL is built from.
    fn base_url(&self) -> &str;
}

/// Fetches the server jar.
pub trait ArtifactDownloader {
    /// Download `url` into `destination` and return the jar path. A
    /// non-success status means the versions do not combine into a server.
    fn download(&self, url: &str, destination: &Path) -> Result<PathBuf>;
}

pub struct FabricMeta {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl FabricMeta {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL from `FABRICDW_META_URL`, or the public meta API.
    pub fn from_env() -> Result<Self> {
        let base = std::env::var("FABRICDW_META_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_META_URL.to_string());
        Self::new(base)
    }

    fn channel_url(&self, channel: Channel) -> String {
        format!("{}/{}", self.base_url, channel.as_str())
    }
}

fn build_http_client() -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .user_agent(concat!("fabricdw/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(300))
        .build()?)
}

impl RemoteVersionService for FabricMeta {
    fn versions(&self, channel: Channel) -> Result<Vec<VersionDescriptor>> {
        let url = self.channel_url(channel);
        tracing::debug!("fetching {url}");
        let resp = self.client.get(&url).send()?.error_for_status()?;
        let body = resp.bytes()?;
        parse_versions(&body).map_err(|e| Error::InvalidResponse { url, source: e })
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ArtifactDownloader for FabricMeta {
    fn download(&self, url: &str, destination: &Path) -> Result<PathBuf> {
        tracing::info!("downloading {url}");
        let resp = self.client.get(url).send().map_err(|e| {
            if let Some(s) = e.source() {
                tracing::debug!("caused by: {s}");
            }
            Error::Http(e)
        })?;
        if !resp.status().is_success() {
            tracing::debug!("server jar request returned {}", resp.status());
            return Err(Error::InvalidVersionCombination {
                url: url.to_string(),
            });
        }
        let bytes = resp.bytes()?;

        let jar = destination.join(SERVER_JAR_FILE);
        std::fs::write(&jar, &bytes)
            .map_err(|e| Error::io(format!("failed to write {}", jar.display()), e))?;
        Ok(jar)
    }
}

/// Parse a channel listing. Extra fields such as `maven` or `build` are ignored.
pub fn parse_versions(body: &[u8]) -> std::result::Result<Vec<VersionDescriptor>, serde_json::Error> {
    serde_json::from_slice(body)
}
