use camino::Utf8PathBuf;
use core::error::Error;
use pisserror::Error;

/// Stick this at the end of bug warnings/errors.
///
/// It helps users find out that what they're seeing shouldn't happen.
pub fn bug_msg() -> String {
    format!(
        "this is a bug in `folio` v{}, so please report it!",
        env!("CARGO_PKG_VERSION")
    )
}

/// The broad kind of a [`CatalogError`].
///
/// Callers (like an HTTP layer) can match on this instead of the full error
/// to pick a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required field was missing or malformed.
    InvalidArgument,
    /// The referenced file, folder, tag, or alias doesn't exist.
    NotFound,
    /// The write would break a uniqueness rule.
    Conflict,
    /// The database failed underneath us.
    StorageFailure,
    /// Saving or removing stored bytes failed.
    IoFailure,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid argument: {_0}")]
    InvalidArgument(String),

    #[error("No {what} exists with id `{id}`.")]
    NotFound { what: &'static str, id: String },

    #[error("Conflict: {_0}")]
    Conflict(String),

    #[error("The database has encountered an error. See: `{_0}`")]
    Database(#[from] sqlx::Error),

    #[error("Failed to migrate the catalog database. See: `{_0}`")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to {action} the stored file at `{path}`. Err: `{err}`.")]
    Io {
        action: &'static str,
        path: Utf8PathBuf,
        err: std::io::Error,
    },

    #[error("The catalog configuration is unusable. See: `{_0}`")]
    Config(#[from] ConfigError),
}

impl CatalogError {
    /// Which kind of failure this is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CatalogError::NotFound { .. } => ErrorKind::NotFound,
            CatalogError::Conflict(_) => ErrorKind::Conflict,
            CatalogError::Database(_) | CatalogError::Migration(_) => ErrorKind::StorageFailure,
            CatalogError::Io { .. } => ErrorKind::IoFailure,
            CatalogError::Config(ConfigError::ReadFailed(_)) => ErrorKind::IoFailure,
            CatalogError::Config(_) => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    /// Turns a unique-index violation into a [`CatalogError::Conflict`].
    ///
    /// We check uniqueness before writing, so this only fires when another
    /// writer beat us to it.
    pub(crate) fn conflict_on_unique(err: sqlx::Error, msg: impl Into<String>) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Self::Conflict(msg.into())
            }
            other => Self::Database(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// during fs read from disk
    #[error("Failed to read config file. See: `{_0}`")]
    ReadFailed(#[from] tokio::io::Error),

    /// parsing
    #[error("Failed to parse config file. See: `{_0}`")]
    ParseFailed(#[from] toml::de::Error),

    /// limits like the upload ceiling can't be zero
    #[error("The config field `{_0}` must be greater than zero.")]
    ZeroLimit(&'static str),
}
