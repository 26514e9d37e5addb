use std::{fs, path::Path, path::PathBuf};

use serde::Deserialize;

use crate::{PersistError, Result};

/// Bound on full-save attempts before the temp file is dropped.
pub const MAX_SAVE_TRIES: usize = 3;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// spool directories
    #[serde(default)]
    pub paths: PathsConfig,
    /// flat-file save behaviour
    #[serde(default)]
    pub save: SaveConfig,
    /// database store config
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// job save files, defaults to `/var/spool/pbs/server_priv/jobs`
    #[serde(default = "default_jobs_path")]
    pub jobs: PathBuf,
    /// reservation save files, defaults to `/var/spool/pbs/server_priv/resvs`
    #[serde(default = "default_resvs_path")]
    pub resvs: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveConfig {
    /// attempts per full save, range [1, 16], defaults to 3
    #[serde(default = "default_max_tries")]
    pub max_tries: usize,
    /// fsync files and directories after a full save, defaults to true
    #[serde(default = "default_fsync")]
    pub fsync: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// store type
    #[serde(default)]
    pub store_type: StoreType,
    /// postgres config
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    #[default]
    Mem,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    /// postgres database url
    pub database_url: String,
    /// pool size, defaults to 8
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// seconds to wait for a pooled connection, defaults to 5
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_jobs_path() -> PathBuf {
    PathBuf::from("/var/spool/pbs/server_priv/jobs")
}

fn default_resvs_path() -> PathBuf {
    PathBuf::from("/var/spool/pbs/server_priv/resvs")
}

fn default_max_tries() -> usize {
    MAX_SAVE_TRIES
}

fn default_fsync() -> bool {
    true
}

fn default_max_connections() -> u32 {
    8
}

fn default_acquire_timeout() -> u64 {
    5
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs_path(),
            resvs: default_resvs_path(),
        }
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            max_tries: MAX_SAVE_TRIES,
            fsync: true,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| PersistError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(1..=16).contains(&self.save.max_tries) {
            return Err(PersistError::Config(format!("save.max_tries must be in [1, 16], got {}", self.save.max_tries)));
        }
        if self.store.store_type == StoreType::Postgres && self.store.postgres.is_none() {
            return Err(PersistError::Config("postgres configuration is required when store type is postgres".to_string()));
        }
        Ok(())
    }
}
