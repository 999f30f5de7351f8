use log::{debug, warn};
use serde::Deserialize;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid configuration in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    #[default]
    Session,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Bus on which providers and the manager live.
    pub bus: BusType,
    /// Directories scanned for provider descriptor files, in priority order.
    pub directories: Vec<PathBuf>,
    /// Own `org.gtk.CloudProviderManager` so providers can push their changes.
    pub export_manager: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusType::default(),
            directories: default_directories(dirs::data_dir(), &env_var),
            export_manager: true,
        }
    }
}

impl Config {
    /// Sub-directory of every data directory holding descriptor files.
    pub const PROVIDERS_DIR: &'static str = "gtk+/cloud-providers";
    /// Colon-separated list of directories overriding [`Self::directories`].
    pub const DIRS_VAR: &'static str = "CLOUD_PROVIDERS_DIRS";

    /// Default location of the configuration file.
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cloud-providers").join("config.json"))
    }

    pub fn from_json(path: &Path, json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Read the configuration file if there is one, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match Self::path() {
            Some(path) => match fs::read_to_string(&path) {
                Ok(json) => Self::from_json(&path, &json)?,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("No configuration file at {}", path.display());
                    Self::default()
                }
                Err(source) => return Err(ConfigError::Read { path, source }),
            },
            None => Self::default(),
        };

        Ok(config.with_overrides(&env_var))
    }

    /// Like [`Self::load`], but fall back to the defaults on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            warn!("Using default configuration: {e}");
            Self::default().with_overrides(&env_var)
        })
    }

    #[must_use]
    pub fn with_overrides(mut self, var: &dyn Fn(&str) -> Option<String>) -> Self {
        if let Some(dirs) = var(Self::DIRS_VAR) {
            self.directories = split_paths(&dirs);
        }
        self
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn split_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(':')
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// `data_home` first, then every entry of `$XDG_DATA_DIRS`.
fn default_directories(
    data_home: Option<PathBuf>,
    var: &dyn Fn(&str) -> Option<String>,
) -> Vec<PathBuf> {
    let data_dirs = var("XDG_DATA_DIRS").unwrap_or_else(|| "/usr/local/share:/usr/share".to_owned());

    data_home
        .into_iter()
        .chain(split_paths(&data_dirs))
        .map(|dir| dir.join(Config::PROVIDERS_DIR))
        .collect()
}
