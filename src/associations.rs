//! The links between files and their tags/folders.
//!
//! These functions take a bare connection so they can run inside whatever
//! transaction the caller has open. The replacing ones (`set_*`) aren't atomic
//! on their own: run them in a transaction!

use std::collections::HashSet;

use sea_query::{Expr, Func, Query, SelectStatement, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder as _;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::{
    database::tables::{FileFolders, FileTags},
    error::CatalogError,
    models::tags::TagId,
};

/// Files that carry *every* one of the given tags.
///
/// Repeated ids only count once. An empty list matches nothing.
#[tracing::instrument(skip(conn))]
pub async fn files_matching_all_tags(
    conn: &mut SqliteConnection,
    tag_ids: &[TagId],
) -> Result<Vec<Uuid>, CatalogError> {
    let distinct = dedup(tag_ids);
    if distinct.is_empty() {
        return Ok(Vec::new());
    }

    let (select, values) = all_tags_select(&distinct).build_sqlx(SqliteQueryBuilder);
    let files: Vec<Uuid> = sqlx::query_scalar_with(&select, values)
        .fetch_all(conn)
        .await?;

    tracing::debug!("{} files carry all {} tags.", files.len(), distinct.len());
    Ok(files)
}

/// `SELECT file_id FROM file_tags WHERE tag_id IN (...) GROUP BY file_id
/// HAVING COUNT(tag_id) = n`
///
/// `tag_ids` must already be deduplicated.
pub(crate) fn all_tags_select(tag_ids: &[TagId]) -> SelectStatement {
    // (file_id, tag_id) is the primary key, so counting rows per file counts
    // distinct matching tags
    Query::select()
        .column(FileTags::FileId)
        .from(FileTags::Table)
        .and_where(Expr::col(FileTags::TagId).is_in(tag_ids.iter().copied()))
        .group_by_col(FileTags::FileId)
        .and_having(Expr::expr(Func::count(Expr::col(FileTags::TagId))).eq(tag_ids.len() as i64))
        .to_owned()
}

/// Files that sit in at least one of the given folders.
#[tracing::instrument(skip(conn))]
pub async fn files_in_any_folder(
    conn: &mut SqliteConnection,
    folder_ids: &[Uuid],
) -> Result<Vec<Uuid>, CatalogError> {
    if folder_ids.is_empty() {
        return Ok(Vec::new());
    }

    let (select, values) = any_folder_select(folder_ids).build_sqlx(SqliteQueryBuilder);
    let files: Vec<Uuid> = sqlx::query_scalar_with(&select, values)
        .fetch_all(conn)
        .await?;

    Ok(files)
}

/// `SELECT DISTINCT file_id FROM file_folders WHERE folder_id IN (...)`
pub(crate) fn any_folder_select(folder_ids: &[Uuid]) -> SelectStatement {
    Query::select()
        .distinct()
        .column(FileFolders::FileId)
        .from(FileFolders::Table)
        .and_where(Expr::col(FileFolders::FolderId).is_in(folder_ids.iter().copied()))
        .to_owned()
}

/// Replaces a file's tags with exactly `tag_ids`.
///
/// Every id is checked first; the first unknown one fails the whole thing.
#[tracing::instrument(skip(conn))]
pub async fn set_file_tags(
    conn: &mut SqliteConnection,
    file_id: Uuid,
    tag_ids: &[TagId],
) -> Result<(), CatalogError> {
    let tag_ids = dedup(tag_ids);

    for tag_id in &tag_ids {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tags WHERE id = $1)")
            .bind(*tag_id)
            .fetch_one(&mut *conn)
            .await?;
        if !exists {
            tracing::debug!("Tag {tag_id} doesn't exist.");
            return Err(CatalogError::InvalidArgument(format!(
                "tag id `{tag_id}` does not exist"
            )));
        }
    }

    sqlx::query("DELETE FROM file_tags WHERE file_id = $1")
        .bind(file_id)
        .execute(&mut *conn)
        .await?;

    for tag_id in &tag_ids {
        sqlx::query("INSERT INTO file_tags (file_id, tag_id) VALUES ($1, $2)")
            .bind(file_id)
            .bind(*tag_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Replaces the folders a file sits in with exactly `folder_ids`.
///
/// Every id is checked first; the first unknown one fails the whole thing.
#[tracing::instrument(skip(conn))]
pub async fn set_file_folders(
    conn: &mut SqliteConnection,
    file_id: Uuid,
    folder_ids: &[Uuid],
) -> Result<(), CatalogError> {
    let folder_ids = dedup(folder_ids);

    for folder_id in &folder_ids {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM folders WHERE id = $1)")
                .bind(*folder_id)
                .fetch_one(&mut *conn)
                .await?;
        if !exists {
            tracing::debug!("Folder `{folder_id}` doesn't exist.");
            return Err(CatalogError::InvalidArgument(format!(
                "folder id `{folder_id}` does not exist"
            )));
        }
    }

    sqlx::query("DELETE FROM file_folders WHERE file_id = $1")
        .bind(file_id)
        .execute(&mut *conn)
        .await?;

    for folder_id in &folder_ids {
        sqlx::query("INSERT INTO file_folders (file_id, folder_id) VALUES ($1, $2)")
            .bind(file_id)
            .bind(*folder_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Drops every tag and folder link for a file.
#[tracing::instrument(skip(conn))]
pub async fn remove_file_associations(
    conn: &mut SqliteConnection,
    file_id: Uuid,
) -> Result<(), CatalogError> {
    sqlx::query("DELETE FROM file_tags WHERE file_id = $1")
        .bind(file_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM file_folders WHERE file_id = $1")
        .bind(file_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Removes repeats, keeping the first occurrence of each.
pub(crate) fn dedup<T: Copy + Eq + core::hash::Hash>(ids: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
