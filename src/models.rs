//! Data structures for the registry file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Registry file at `~/.config/fabricdw.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub installations: Vec<Installation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub name: String,
    pub root: PathBuf,
}

impl std::fmt::Display for Installation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.root.display())
    }
}

/// Fallback values for launch settings not given on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(rename = "min-ram", default = "default_min_ram")]
    pub min_ram: f64,
    #[serde(rename = "max-ram", default = "default_max_ram")]
    pub max_ram: f64,
    #[serde(default)]
    pub idle_time: u64,
    #[serde(default = "default_backups")]
    pub backups: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            min_ram: default_min_ram(),
            max_ram: default_max_ram(),
            idle_time: 0,
            backups: default_backups(),
        }
    }
}

fn default_min_ram() -> f64 {
    0.5
}

fn default_max_ram() -> f64 {
    6.0
}

fn default_backups() -> u32 {
    5
}
