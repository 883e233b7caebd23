//! Uploaded PDF files and everything that happens to them.

use std::collections::HashMap;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use sea_query::{Alias, Expr, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder as _;
use sqlx::{query::Query as SqlxQuery, sqlite::SqliteArguments, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::{
    associations,
    catalog::Catalog,
    database::{
        tables::{FileFolders, FileTags, Tags},
        InsertIntoTable,
    },
    error::{bug_msg, CatalogError},
};

use super::{
    folder::FolderMap,
    tags::{Tag, TagId},
};

/// The only thing we accept.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A row in the files table.
#[derive(
    Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::FromRow,
)]
pub struct FileRecord {
    pub id: Uuid,

    /// The name the file was uploaded with.
    pub name: String,

    /// Where the bytes are stored on disk.
    pub upload_path: String,

    /// How large the file is, in bytes.
    pub size: i64,

    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    /// Grabs the stored path of this file.
    pub fn path(&self) -> Utf8PathBuf {
        self.upload_path.clone().into()
    }
}

impl InsertIntoTable for FileRecord {
    fn make_insertion_query(&self) -> SqlxQuery<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            r#"
        INSERT INTO files
        (id, name, upload_path, size, uploaded_at)
        VALUES
        ($1, $2, $3, $4, $5)
        "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.upload_path)
        .bind(self.size)
        .bind(self.uploaded_at)
    }
}

/// A folder a file sits in, with its full path from the root.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FolderRef {
    pub id: Uuid,
    pub name: String,
    pub full_path: Vec<String>,
}

/// A file with its tags and folders resolved.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CatalogFile {
    #[serde(flatten)]
    pub file: FileRecord,
    pub tags: Vec<Tag>,
    pub folders: Vec<FolderRef>,
}

/// What an upload hands back.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UploadReceipt {
    pub file_id: Uuid,
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct FileTagRow {
    file_id: Uuid,
    #[sqlx(flatten)]
    tag: Tag,
}

#[derive(sqlx::FromRow)]
struct FileFolderRow {
    file_id: Uuid,
    folder_id: Uuid,
}

impl Catalog {
    /// Stores a PDF and records it in the catalog, linked to the given tags
    /// and folders.
    ///
    /// Either all of it happens or none of it does. If any tag or folder is
    /// missing, the stored bytes are removed again before the error comes
    /// back.
    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn upload_file(
        &self,
        name: &str,
        bytes: &[u8],
        tag_ids: &[TagId],
        folder_ids: &[Uuid],
    ) -> Result<UploadReceipt, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "an upload needs a file name".into(),
            ));
        }
        check_upload(bytes, self.config.max_upload_bytes)?;

        let id = Uuid::new_v4();
        let uploaded_at = Utc::now();
        let stored = self.blobs.save(&id, uploaded_at, bytes).await?;

        let record = FileRecord {
            id,
            name: name.to_string(),
            upload_path: stored.to_string(),
            size: bytes.len() as i64,
            uploaded_at,
        };

        if let Err(e) = self.record_upload(&record, tag_ids, folder_ids).await {
            tracing::warn!("Failed to record upload. Removing its stored bytes. err: {e}");

            // the original error is what the caller cares about
            if let Err(remove_err) = self.blobs.remove(&stored).await {
                tracing::error!(
                    "Also failed to remove the stored bytes at `{stored}`! err: {remove_err}"
                );
            }
            return Err(e);
        }

        tracing::debug!("Uploaded `{name}` as `{id}`.");
        Ok(UploadReceipt {
            file_id: id,
            name: record.name,
            uploaded_at,
        })
    }

    /// Grabs one file with its tags and folders.
    #[tracing::instrument(skip(self))]
    pub async fn file(&self, file_id: Uuid) -> Result<CatalogFile, CatalogError> {
        let mut conn = self.pool.acquire().await?;

        let record = file_record(&mut conn, file_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("file", file_id))?;

        let mut enriched = enrich(&mut conn, vec![record]).await?;
        enriched.pop().ok_or_else(|| {
            tracing::error!("Enriching one file gave back nothing. {}", bug_msg());
            CatalogError::not_found("file", file_id)
        })
    }

    /// Replaces both the tags and the folders of a file.
    ///
    /// Pass empty lists to clear them.
    #[tracing::instrument(skip(self))]
    pub async fn update_file_relations(
        &self,
        file_id: Uuid,
        tag_ids: &[TagId],
        folder_ids: &[Uuid],
    ) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await?;

        if file_record(&mut tx, file_id).await?.is_none() {
            return Err(CatalogError::not_found("file", file_id));
        }

        associations::set_file_tags(&mut tx, file_id, tag_ids).await?;
        associations::set_file_folders(&mut tx, file_id, folder_ids).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Replaces the tags of a file.
    #[tracing::instrument(skip(self))]
    pub async fn set_file_tags(&self, file_id: Uuid, tag_ids: &[TagId]) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await?;

        if file_record(&mut tx, file_id).await?.is_none() {
            return Err(CatalogError::not_found("file", file_id));
        }
        associations::set_file_tags(&mut tx, file_id, tag_ids).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Replaces the folders a file sits in.
    #[tracing::instrument(skip(self))]
    pub async fn set_file_folders(
        &self,
        file_id: Uuid,
        folder_ids: &[Uuid],
    ) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await?;

        if file_record(&mut tx, file_id).await?.is_none() {
            return Err(CatalogError::not_found("file", file_id));
        }
        associations::set_file_folders(&mut tx, file_id, folder_ids).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a file: its stored bytes, its links, and its row.
    ///
    /// Stored bytes that are already gone are only worth a warning. Any other
    /// failure to remove them stops the delete, leaving the catalog untouched
    /// so it can be retried.
    #[tracing::instrument(skip(self))]
    pub async fn delete_file(&self, file_id: Uuid) -> Result<Uuid, CatalogError> {
        let record = {
            let mut conn = self.pool.acquire().await?;
            file_record(&mut conn, file_id)
                .await?
                .ok_or_else(|| CatalogError::not_found("file", file_id))?
        };

        let path = record.path();
        if !self.blobs.remove(&path).await? {
            tracing::warn!("Stored bytes for file `{file_id}` were already missing at `{path}`.");
        }

        let mut tx = self.pool.begin().await?;
        associations::remove_file_associations(&mut tx, file_id).await?;
        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!("Deleted file `{file_id}`.");
        Ok(file_id)
    }

    /// Inserts the file row and its links in one transaction.
    async fn record_upload(
        &self,
        record: &FileRecord,
        tag_ids: &[TagId],
        folder_ids: &[Uuid],
    ) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await?;

        record.make_insertion_query().execute(&mut *tx).await?;
        associations::set_file_tags(&mut tx, record.id, tag_ids).await?;
        associations::set_file_folders(&mut tx, record.id, folder_ids).await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Rejects uploads that are too big or aren't PDFs. Runs before anything
/// touches the disk.
pub fn check_upload(bytes: &[u8], max_bytes: u64) -> Result<(), CatalogError> {
    if bytes.len() as u64 > max_bytes {
        return Err(CatalogError::InvalidArgument(format!(
            "the file is too large ({} bytes). the limit is {max_bytes} bytes",
            bytes.len()
        )));
    }

    match infer::get(bytes) {
        Some(kind) if kind.mime_type() == PDF_MIME_TYPE => Ok(()),
        Some(kind) => Err(CatalogError::InvalidArgument(format!(
            "only PDF files can be uploaded, but this one is `{}`",
            kind.mime_type()
        ))),
        None => Err(CatalogError::InvalidArgument(
            "only PDF files can be uploaded, and this one's type is unknown".into(),
        )),
    }
}

pub(crate) async fn file_record(
    conn: &mut SqliteConnection,
    file_id: Uuid,
) -> Result<Option<FileRecord>, CatalogError> {
    sqlx::query_as::<_, FileRecord>(
        "SELECT id, name, upload_path, size, uploaded_at FROM files WHERE id = $1",
    )
    .bind(file_id)
    .fetch_optional(conn)
    .await
    .map_err(CatalogError::from)
}

/// Attaches tags and folders (with full paths) to each file.
///
/// Takes one snapshot of the folder table for all of them, and keeps the
/// order of `files`.
#[tracing::instrument(skip_all, fields(files = files.len()))]
pub(crate) async fn enrich(
    conn: &mut SqliteConnection,
    files: Vec<FileRecord>,
) -> Result<Vec<CatalogFile>, CatalogError> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = files.iter().map(|f| f.id).collect();
    let snapshot = FolderMap::load(&mut *conn).await?;

    // tags
    let (select, values) = Query::select()
        .expr_as(
            Expr::col((FileTags::Table, FileTags::FileId)),
            Alias::new("file_id"),
        )
        .expr_as(Expr::col((Tags::Table, Tags::Id)), Alias::new("id"))
        .expr_as(Expr::col((Tags::Table, Tags::Name)), Alias::new("name"))
        .expr_as(
            Expr::col((Tags::Table, Tags::Category)),
            Alias::new("category"),
        )
        .from(FileTags::Table)
        .inner_join(
            Tags::Table,
            Expr::col((Tags::Table, Tags::Id)).equals((FileTags::Table, FileTags::TagId)),
        )
        .and_where(Expr::col((FileTags::Table, FileTags::FileId)).is_in(ids.iter().copied()))
        .order_by((Tags::Table, Tags::Category), Order::Asc)
        .order_by((Tags::Table, Tags::Name), Order::Asc)
        .build_sqlx(SqliteQueryBuilder);

    let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for row in sqlx::query_as_with::<_, FileTagRow, _>(&select, values)
        .fetch_all(&mut *conn)
        .await?
    {
        tags.entry(row.file_id).or_default().push(row.tag);
    }

    // folders
    let (select, values) = Query::select()
        .columns([FileFolders::FileId, FileFolders::FolderId])
        .from(FileFolders::Table)
        .and_where(Expr::col(FileFolders::FileId).is_in(ids.iter().copied()))
        .build_sqlx(SqliteQueryBuilder);

    let mut folders: HashMap<Uuid, Vec<FolderRef>> = HashMap::new();
    for row in sqlx::query_as_with::<_, FileFolderRow, _>(&select, values)
        .fetch_all(&mut *conn)
        .await?
    {
        let Some(folder) = snapshot.get(&row.folder_id) else {
            // it was deleted between the snapshot and now
            tracing::debug!("Folder `{}` vanished mid-request. Skipping it.", row.folder_id);
            continue;
        };

        folders.entry(row.file_id).or_default().push(FolderRef {
            id: folder.id,
            name: folder.name.clone(),
            full_path: snapshot.resolve_path(&folder.id),
        });
    }

    Ok(files
        .into_iter()
        .map(|file| {
            let mut file_folders = folders.remove(&file.id).unwrap_or_default();
            file_folders.sort_by(|a, b| a.full_path.cmp(&b.full_path));

            CatalogFile {
                tags: tags.remove(&file.id).unwrap_or_default(),
                folders: file_folders,
                file,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY_PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

    #[test]
    fn pdfs_pass() {
        check_upload(TINY_PDF, 1024).expect("a pdf is fine");
    }

    #[test]
    fn too_big_fails_first() {
        let err = check_upload(TINY_PDF, 4).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn non_pdfs_fail() {
        // png magic
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let err = check_upload(&png, 1024).unwrap_err();
        assert!(err.to_string().contains("image/png"));

        let err = check_upload(b"just some text", 1024).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }
}
