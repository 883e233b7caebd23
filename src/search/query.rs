use sea_query::{Cond, Expr, Func, Order, Query, SimpleExpr, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder as _;

use crate::{
    associations::{all_tags_select, any_folder_select, dedup},
    catalog::Catalog,
    database::tables::{FileFolders, Files},
    error::{bug_msg, CatalogError},
    models::file::{enrich, FileRecord},
};

use super::{
    modifiers::{FileModifier, ToQuery},
    FileQuery, FilePage, FolderMatch,
};

impl ToQuery for FileModifier {
    #[tracing::instrument]
    fn to_query(self) -> SimpleExpr {
        match self {
            // a subquery, so the candidates never have to leave the database
            FileModifier::HasAllTags(tag_ids) => {
                Expr::col((Files::Table, Files::Id)).in_subquery(all_tags_select(&tag_ids))
            }

            // one `EXISTS` per folder. stacking these gives us an intersection
            FileModifier::InFolder(folder_id) => Expr::exists(
                Query::select()
                    .expr(Expr::val(1))
                    .from(FileFolders::Table)
                    .and_where(
                        Expr::col((FileFolders::Table, FileFolders::FileId))
                            .equals((Files::Table, Files::Id)),
                    )
                    .and_where(Expr::col((FileFolders::Table, FileFolders::FolderId)).eq(folder_id))
                    .to_owned(),
            ),

            FileModifier::InAnyFolder(folder_ids) => {
                Expr::col((Files::Table, Files::Id)).in_subquery(any_folder_select(&folder_ids))
            }
        }
    }
}

impl FileQuery {
    /// The folder part of this query, as modifiers.
    pub fn folder_modifiers(&self) -> Vec<FileModifier> {
        if self.folder_ids.is_empty() {
            return Vec::new();
        }

        match self.folder_match {
            FolderMatch::All => self
                .folder_ids
                .iter()
                .copied()
                .map(FileModifier::InFolder)
                .collect(),
            FolderMatch::Any => vec![FileModifier::InAnyFolder(self.folder_ids.clone())],
        }
    }
}

impl Catalog {
    /// Lists one page of files matching `query`, newest first.
    ///
    /// Files must carry every tag in `query.tag_ids`. Each file comes back
    /// with its tags and the full paths of its folders.
    #[tracing::instrument(skip(self))]
    pub async fn list_files(&self, query: &FileQuery) -> Result<FilePage, CatalogError> {
        query.validate()?;
        let offset = query.offset().ok_or_else(|| {
            tracing::error!("A validated query had no offset. {}", bug_msg());
            CatalogError::InvalidArgument(format!("page {} is out of range", query.page))
        })?;

        let mut conn = self.pool.acquire().await?;
        let mut modifiers = Vec::new();

        if !query.tag_ids.is_empty() {
            let tag_ids = dedup(&query.tag_ids);

            let (select, values) = Query::select()
                .expr(Expr::exists(all_tags_select(&tag_ids).limit(1).to_owned()))
                .build_sqlx(SqliteQueryBuilder);
            let any_candidates: bool = sqlx::query_scalar_with(&select, values)
                .fetch_one(&mut *conn)
                .await?;

            // nothing has all those tags. no need to keep going
            if !any_candidates {
                tracing::debug!("No files carry all of the requested tags.");
                return Ok(FilePage::empty());
            }
            modifiers.push(FileModifier::HasAllTags(tag_ids));
        }
        modifiers.extend(query.folder_modifiers());

        let cond = modifiers
            .into_iter()
            .fold(Cond::all(), |cond, modifier| cond.add(modifier.to_query()));

        // total, before paging
        let (select, values) = Query::select()
            .expr(Func::count(Expr::col((Files::Table, Files::Id))))
            .from(Files::Table)
            .cond_where(cond.clone())
            .build_sqlx(SqliteQueryBuilder);

        let total: i64 = sqlx::query_scalar_with(&select, values)
            .fetch_one(&mut *conn)
            .await?;

        // the page itself
        let (select, values) = Query::select()
            .columns([
                Files::Id,
                Files::Name,
                Files::UploadPath,
                Files::Size,
                Files::UploadedAt,
            ])
            .from(Files::Table)
            .cond_where(cond)
            .order_by(Files::UploadedAt, Order::Desc)
            .order_by(Files::Id, Order::Desc)
            .limit(u64::from(query.size))
            .offset(offset)
            .build_sqlx(SqliteQueryBuilder);

        let files = sqlx::query_as_with::<_, FileRecord, _>(&select, values)
            .fetch_all(&mut *conn)
            .await?;

        tracing::debug!("Listing {} of {total} matching files.", files.len());
        Ok(FilePage {
            total: u64::try_from(total).unwrap_or_default(),
            items: enrich(&mut conn, files).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn where_clause(modifier: FileModifier) -> String {
        let (select, _) = Query::select()
            .column(Files::Id)
            .from(Files::Table)
            .cond_where(Cond::all().add(modifier.to_query()))
            .build_sqlx(SqliteQueryBuilder);
        select
    }

    #[test]
    fn all_tags_is_a_subquery() {
        let select = where_clause(FileModifier::HasAllTags(vec![1, 2, 3]));

        assert!(
            select.starts_with(r#"SELECT "id" FROM "files" WHERE "files"."id" IN (SELECT "file_id" FROM "file_tags""#),
            "{select}"
        );
        // one bind per tag, plus the count. never one per file
        assert_eq!(select.matches('?').count(), 4, "{select}");
    }

    #[test]
    fn in_folder_is_correlated() {
        let select = where_clause(FileModifier::InFolder(Uuid::from_u128(1)));

        assert!(select.contains("EXISTS"), "{select}");
        assert!(
            select.contains(r#""file_folders"."file_id" = "files"."id""#),
            "{select}"
        );
        assert!(
            select.contains(r#""file_folders"."folder_id" = ?"#),
            "{select}"
        );
    }

    #[test]
    fn folder_match_picks_modifiers() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));

        let all = FileQuery::new().folders([a, b]);
        assert_eq!(
            all.folder_modifiers(),
            [FileModifier::InFolder(a), FileModifier::InFolder(b)]
        );

        let any = all.folder_match(FolderMatch::Any);
        assert_eq!(
            any.folder_modifiers(),
            [FileModifier::InAnyFolder(vec![a, b])]
        );

        assert!(FileQuery::new().tags([1]).folder_modifiers().is_empty());
    }
}
