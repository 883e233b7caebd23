//! Stores the bytes of uploaded files on the local disk.
//!
//! Files land at `<root>/<YYYY_MM>/<file id>.pdf`, bucketed by upload month.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CatalogError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobStore {
    root: Utf8PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory everything is stored under.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Where the file with the given id, uploaded at `uploaded_at`, lives.
    pub fn path_for(&self, file_id: &Uuid, uploaded_at: DateTime<Utc>) -> Utf8PathBuf {
        self.root
            .join(uploaded_at.format("%Y_%m").to_string())
            .join(format!("{file_id}.pdf"))
    }

    /// Writes `bytes` to disk, returning the path they were written to.
    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn save(
        &self,
        file_id: &Uuid,
        uploaded_at: DateTime<Utc>,
        bytes: &[u8],
    ) -> Result<Utf8PathBuf, CatalogError> {
        let path = self.path_for(file_id, uploaded_at);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .inspect_err(|e| tracing::warn!("Failed to create upload folder. err: {e}"))
                .map_err(|err| CatalogError::Io {
                    action: "create",
                    path: parent.to_path_buf(),
                    err,
                })?;
        }

        tokio::fs::write(&path, bytes)
            .await
            .inspect_err(|e| tracing::warn!("Failed to write uploaded bytes. err: {e}"))
            .map_err(|err| CatalogError::Io {
                action: "save",
                path: path.clone(),
                err,
            })?;

        tracing::debug!("Saved upload to `{path}`.");
        Ok(path)
    }

    /// Removes a stored file.
    ///
    /// Returns `false` if there was nothing there to remove.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, path: &Utf8Path) -> Result<bool, CatalogError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                tracing::warn!("Failed to remove stored file. err: {err}");
                Err(CatalogError::Io {
                    action: "remove",
                    path: path.to_path_buf(),
                    err,
                })
            }
        }
    }
}
