//! Folders: a tree for organizing files.
//!
//! Each folder points at its parent, or at nothing when it's a root. Files can
//! sit in any number of folders.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_query::{Expr, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder as _;
use sqlx::{query::Query as SqlxQuery, sqlite::SqliteArguments, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::{
    catalog::Catalog,
    database::{
        like_pattern,
        tables::{FileFolders, Folders},
        ID_CHUNK,
        InsertIntoTable,
    },
    error::CatalogError,
};

use super::file::FileRecord;

pub mod tree;

pub use tree::FolderMap;

/// A folder row.
#[derive(
    Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::FromRow,
)]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    /// `None` for root folders.
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A folder in the tree view, with its children nested inside.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FolderNode {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub children: Vec<FolderNode>,
}

/// The direct contents of one folder.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FolderChildren {
    /// Subfolders, by name.
    pub folders: Vec<Folder>,
    /// Files in this folder, newest first.
    pub files: Vec<FileRecord>,
}

/// A folder that matched a search, plus where it lives.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FolderSearchHit {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    /// Names from the root down to this folder.
    pub full_path: Vec<String>,
}

impl InsertIntoTable for Folder {
    fn make_insertion_query(&self) -> SqlxQuery<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            "INSERT INTO folders (id, name, parent_id, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(self.parent_id)
        .bind(self.created_at)
    }
}

impl Catalog {
    /// Creates a folder under `parent_id`, or as a root when that's `None`.
    ///
    /// The name is trimmed, and must not match a sibling's.
    #[tracing::instrument(skip(self))]
    pub async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Folder, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "a folder needs a `name`".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        if let Some(parent) = parent_id {
            if !folder_exists(&mut tx, &parent).await? {
                return Err(CatalogError::not_found("parent folder", parent));
            }
        }

        // `IS` treats two NULLs as equal, so this covers roots too
        let sibling_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM folders WHERE name = $1 AND parent_id IS $2)",
        )
        .bind(name)
        .bind(parent_id)
        .fetch_one(&mut *tx)
        .await?;
        if sibling_taken {
            return Err(CatalogError::Conflict(format!(
                "a folder named `{name}` already exists at this level"
            )));
        }

        let folder = Folder {
            id: Uuid::new_v4(),
            name: name.to_string(),
            parent_id,
            created_at: Utc::now(),
        };

        folder
            .make_insertion_query()
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                CatalogError::conflict_on_unique(
                    e,
                    format!("a folder named `{name}` already exists at this level"),
                )
            })?;

        tx.commit().await?;

        tracing::debug!("Created folder `{}` ({}).", folder.name, folder.id);
        Ok(folder)
    }

    /// Every folder, arranged as a forest of root folders.
    #[tracing::instrument(skip(self))]
    pub async fn folder_tree(&self) -> Result<Vec<FolderNode>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        Ok(FolderMap::load(&mut conn).await?.tree())
    }

    /// The subfolders and files directly inside a folder. Doesn't recurse.
    #[tracing::instrument(skip(self))]
    pub async fn folder_children(&self, folder_id: Uuid) -> Result<FolderChildren, CatalogError> {
        let mut conn = self.pool.acquire().await?;

        if !folder_exists(&mut conn, &folder_id).await? {
            return Err(CatalogError::not_found("folder", folder_id));
        }

        let folders = sqlx::query_as::<_, Folder>(
            "SELECT id, name, parent_id, created_at FROM folders
            WHERE parent_id = $1
            ORDER BY name",
        )
        .bind(folder_id)
        .fetch_all(&mut *conn)
        .await?;

        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT f.id, f.name, f.upload_path, f.size, f.uploaded_at
            FROM files f
            JOIN file_folders ff ON ff.file_id = f.id
            WHERE ff.folder_id = $1
            ORDER BY f.uploaded_at DESC, f.id DESC",
        )
        .bind(folder_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(FolderChildren { folders, files })
    }

    /// Deletes a folder along with every folder nested inside it.
    ///
    /// Files in those folders stay in the catalog; they just lose their
    /// membership. Returns the ids of every deleted folder, the given one
    /// first.
    #[tracing::instrument(skip(self))]
    pub async fn delete_folder(&self, folder_id: Uuid) -> Result<Vec<Uuid>, CatalogError> {
        let mut tx = self.pool.begin().await?;

        if !folder_exists(&mut tx, &folder_id).await? {
            return Err(CatalogError::not_found("folder", folder_id));
        }

        let closure = descendant_closure(&mut tx, folder_id).await?;
        tracing::debug!("Deleting {} folders.", closure.len());

        let mut unlinked = 0;
        for chunk in closure.chunks(ID_CHUNK) {
            let (delete, values) = Query::delete()
                .from_table(FileFolders::Table)
                .and_where(Expr::col(FileFolders::FolderId).is_in(chunk.iter().copied()))
                .build_sqlx(SqliteQueryBuilder);
            unlinked += sqlx::query_with(&delete, values)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        // children before parents, so no statement leaves a dangling parent
        for chunk in closure.rchunks(ID_CHUNK) {
            let (delete, values) = Query::delete()
                .from_table(Folders::Table)
                .and_where(Expr::col(Folders::Id).is_in(chunk.iter().copied()))
                .build_sqlx(SqliteQueryBuilder);
            sqlx::query_with(&delete, values).execute(&mut *tx).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Deleted folder `{folder_id}` and {} descendants, unlinking {} files.",
            closure.len() - 1,
            unlinked
        );
        Ok(closure)
    }

    /// Finds folders whose name contains `query`, along with their full paths.
    #[tracing::instrument(skip(self))]
    pub async fn search_folders(&self, query: &str) -> Result<Vec<FolderSearchHit>, CatalogError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "a folder search needs a keyword".into(),
            ));
        }

        let mut conn = self.pool.acquire().await?;
        let snapshot = FolderMap::load(&mut conn).await?;

        let matches = sqlx::query_as::<_, Folder>(
            r"SELECT id, name, parent_id, created_at FROM folders
            WHERE name LIKE $1 ESCAPE '\'",
        )
        .bind(like_pattern(query))
        .fetch_all(&mut *conn)
        .await?;

        Ok(matches
            .into_iter()
            .map(|folder| FolderSearchHit {
                full_path: snapshot.resolve_path(&folder.id),
                id: folder.id,
                name: folder.name,
                parent_id: folder.parent_id,
            })
            .collect())
    }

    /// The names from the root down to (and including) the given folder.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_path(&self, folder_id: Uuid) -> Result<Vec<String>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let snapshot = FolderMap::load(&mut conn).await?;

        if snapshot.get(&folder_id).is_none() {
            return Err(CatalogError::not_found("folder", folder_id));
        }
        Ok(snapshot.resolve_path(&folder_id))
    }
}

pub(crate) async fn folder_exists(
    conn: &mut SqliteConnection,
    folder_id: &Uuid,
) -> Result<bool, CatalogError> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM folders WHERE id = $1)")
        .bind(*folder_id)
        .fetch_one(conn)
        .await
        .map_err(CatalogError::from)
}

/// The folder plus everything nested under it, depth-first.
///
/// This asks the database for each folder's children, so it costs one query
/// per folder in the subtree.
async fn descendant_closure(
    conn: &mut SqliteConnection,
    root: Uuid,
) -> Result<Vec<Uuid>, CatalogError> {
    let mut closure = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        closure.push(id);

        let children: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM folders WHERE parent_id = $1 ORDER BY name")
                .bind(id)
                .fetch_all(&mut *conn)
                .await?;

        // reversed, so the first child is popped first
        stack.extend(children.into_iter().rev());
    }

    Ok(closure)
}
