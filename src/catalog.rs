//! The catalog handle. Every operation hangs off of this.

use sqlx::{Pool, Sqlite};

use crate::{config::Config, database, error::CatalogError, storage::BlobStore};

/// An open PDF catalog: the database pool, the blob store, and the config
/// that describes both.
///
/// Clones are cheap and share the same pool.
#[derive(Clone, Debug)]
pub struct Catalog {
    pub(crate) pool: Pool<Sqlite>,
    pub(crate) blobs: BlobStore,
    pub(crate) config: Config,
}

impl Catalog {
    /// Opens the catalog described by `config`, creating the database and
    /// running migrations if needed.
    #[tracing::instrument(skip_all, fields(data_dir = %config.data_dir))]
    pub async fn open(config: Config) -> Result<Self, CatalogError> {
        config.validate()?;

        let pool = database::connect(&config).await?;
        let blobs = BlobStore::new(config.upload_dir());

        tracing::info!("Catalog opened. Uploads go to `{}`.", blobs.root());
        Ok(Self {
            pool,
            blobs,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Waits for every pooled connection to close.
    pub async fn close(&self) {
        self.pool.close().await
    }
}
