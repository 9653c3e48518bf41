use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

const APP_DIR: &str = "wlsync";

/// Live source the persisted store is reconciled against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Transport {
    /// The local NetworkManager
    #[default]
    Nm,
    /// A rooted Android device through adb
    Adb,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AdbConfig {
    #[serde(default = "default_adb_binary")]
    pub binary: String,
    #[serde(default)]
    pub serial: Option<String>,
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            binary: default_adb_binary(),
            serial: None,
        }
    }
}

fn default_adb_binary() -> String {
    "adb".to_string()
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub adb: AdbConfig,
}

impl Config {
    /// Load `~/.config/wlsync/config.toml`, or defaults if it does not exist.
    pub fn new() -> Result<Self> {
        match dirs::config_dir() {
            Some(dir) => Self::from_file(&dir.join(APP_DIR).join("config.toml")),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Can not read {}", path.display())),
        }
    }

    /// Path of the JSON store, with a leading `~/` expanded.
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(expand_home(path)),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR).join("networks.json"))
                .context("Can not determine the data directory, pass --file"),
        }
    }

    /// Origin label for records read from this machine.
    pub fn source_name(&self) -> String {
        self.source_name
            .clone()
            .or_else(hostname)
            .unwrap_or_else(|| "localhost".to_string())
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

pub fn hostname() -> Option<String> {
    gethostname::gethostname()
        .into_string()
        .ok()
        .filter(|name| !name.is_empty())
}
