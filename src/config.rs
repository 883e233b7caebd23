use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ConfigError;

/// Uploads above this many bytes are rejected. (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// The database file's name, relative to the data directory.
pub const DEFAULT_DATABASE_FILE: &str = "catalog.sqlite";

/// How many pooled SQLite connections we keep around.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Path to the catalog's data directory. The database lives in here.
    pub data_dir: Utf8PathBuf,

    /// Where uploaded files are stored.
    ///
    /// Defaults to `<data_dir>/uploads`.
    #[serde(default)]
    pub upload_dir: Option<Utf8PathBuf>,

    /// The SQLite file name inside `data_dir`.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// The upload size ceiling, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Config {
    /// Creates a config with all the defaults, rooted at `data_dir`.
    pub fn new(data_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            upload_dir: None,
            database_file: default_database_file(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Sets a custom upload directory.
    pub fn with_upload_dir(mut self, upload_dir: impl Into<Utf8PathBuf>) -> Self {
        self.upload_dir = Some(upload_dir.into());
        self
    }

    /// Sets a custom upload ceiling.
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Attempts to read a `Config` from the TOML file at `path`.
    ///
    /// Only `data_dir` is required. Everything else falls back to defaults.
    #[tracing::instrument]
    pub async fn from_disk(path: &Utf8Path) -> Result<Self, ConfigError> {
        // read the config from disk
        let s = tokio::fs::read_to_string(path)
            .await
            .inspect_err(|e| tracing::warn!("Failed to read config file. err: {e}"))
            .map_err(ConfigError::ReadFailed)?;

        Self::from_toml(&s)
    }

    /// Parses and validates a `Config` from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let conf: Self = toml::from_str(s).map_err(ConfigError::ParseFailed)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Checks that the limits make sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_upload_bytes"));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::ZeroLimit("max_connections"));
        }
        Ok(())
    }

    /// Full path to the SQLite database file.
    pub fn database_path(&self) -> Utf8PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Full path to the upload directory.
    pub fn upload_dir(&self) -> Utf8PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("uploads"))
    }
}

fn default_database_file() -> String {
    DEFAULT_DATABASE_FILE.to_string()
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}
