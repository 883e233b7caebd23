//! Tags, their aliases, and the operations on them.
//!
//! Tag names and alias strings share a single namespace: an alias can't be
//! any tag's name, and a new tag can't be named after an existing alias.

use std::collections::{HashMap, HashSet};

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder as _;
use sqlx::SqliteConnection;

use crate::{
    catalog::Catalog,
    database::{like_pattern, tables::TagAliases, tables::Tags, ID_CHUNK},
    error::CatalogError,
};

pub type TagId = i64;
pub type AliasId = i64;

/// A categorized label for files.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, sqlx::FromRow,
)]
pub struct Tag {
    /// Sequential identifier.
    pub id: TagId,
    pub name: String,
    /// A free-form grouping label, like "composer" or "era".
    pub category: String,
}

/// Another name that resolves to a tag.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, sqlx::FromRow,
)]
pub struct TagAlias {
    pub id: AliasId,
    /// The tag this alias points to.
    pub tag_id: TagId,
    pub alias: String,
}

/// A tag alongside all of its aliases.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TagRecord {
    #[serde(flatten)]
    pub tag: Tag,
    pub aliases: Vec<TagAlias>,
}

impl Catalog {
    /// Creates a new tag.
    ///
    /// Both `name` and `category` are trimmed first. Fails with a conflict if
    /// the pair already exists, or if `name` is already used as an alias.
    #[tracing::instrument(skip(self))]
    pub async fn create_tag(&self, name: &str, category: &str) -> Result<TagRecord, CatalogError> {
        let (name, category) = (name.trim(), category.trim());
        if name.is_empty() || category.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "a tag needs both a `name` and a `category`".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tags WHERE name = $1 AND category = $2)",
        )
        .bind(name)
        .bind(category)
        .fetch_one(&mut *tx)
        .await?;
        if duplicate {
            return Err(CatalogError::Conflict(format!(
                "a tag named `{name}` already exists in category `{category}`"
            )));
        }

        if alias_exists(&mut tx, name).await? {
            return Err(CatalogError::Conflict(format!(
                "`{name}` is already an alias of another tag"
            )));
        }

        let tag = sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (name, category) VALUES ($1, $2) RETURNING id, name, category",
        )
        .bind(name)
        .bind(category)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            CatalogError::conflict_on_unique(e, format!("tag `{name}` ({category}) already exists"))
        })?;

        tx.commit().await?;

        tracing::debug!("Created tag {} (`{}`).", tag.id, tag.name);
        Ok(TagRecord {
            tag,
            aliases: Vec::new(),
        })
    }

    /// Finds tags by name, falling back to their aliases.
    ///
    /// - No query (or a blank one) lists every tag, newest first.
    /// - Otherwise, tags whose name contains the query are returned.
    /// - If no name matches, tags owning an alias that contains the query are
    ///   returned instead. Each tag shows up once, no matter how many of its
    ///   aliases matched.
    #[tracing::instrument(skip(self))]
    pub async fn search_tags(&self, query: Option<&str>) -> Result<Vec<TagRecord>, CatalogError> {
        let mut conn = self.pool.acquire().await?;

        let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            let tags = sqlx::query_as::<_, Tag>(
                "SELECT id, name, category FROM tags ORDER BY id DESC",
            )
            .fetch_all(&mut *conn)
            .await?;

            return with_aliases(&mut conn, tags).await;
        };

        let pattern = like_pattern(query);

        let by_name = sqlx::query_as::<_, Tag>(
            r"SELECT id, name, category FROM tags
            WHERE name LIKE $1 ESCAPE '\'
            ORDER BY id DESC",
        )
        .bind(&pattern)
        .fetch_all(&mut *conn)
        .await?;

        if !by_name.is_empty() {
            tracing::debug!("Found {} tags by name.", by_name.len());
            return with_aliases(&mut conn, by_name).await;
        }

        // no luck with names. let's try aliases
        let owners: Vec<TagId> = sqlx::query_scalar(
            r"SELECT tag_id FROM tag_aliases
            WHERE alias LIKE $1 ESCAPE '\'
            ORDER BY id",
        )
        .bind(&pattern)
        .fetch_all(&mut *conn)
        .await?;

        let mut seen = HashSet::new();
        let owners: Vec<TagId> = owners.into_iter().filter(|id| seen.insert(*id)).collect();
        tracing::debug!("Found {} tags by alias.", owners.len());

        let tags = tags_by_id(&mut conn, &owners).await?;
        with_aliases(&mut conn, tags).await
    }

    /// Adds an alias to a tag.
    #[tracing::instrument(skip(self))]
    pub async fn add_alias(&self, tag_id: TagId, alias: &str) -> Result<TagAlias, CatalogError> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "an alias can't be empty".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        if !tag_exists(&mut tx, tag_id).await? {
            return Err(CatalogError::not_found("tag", tag_id));
        }

        if alias_exists(&mut tx, alias).await? {
            return Err(CatalogError::Conflict(format!(
                "the alias `{alias}` is already taken"
            )));
        }

        let is_tag_name: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tags WHERE name = $1)")
                .bind(alias)
                .fetch_one(&mut *tx)
                .await?;
        if is_tag_name {
            return Err(CatalogError::Conflict(format!(
                "`{alias}` is already the name of a tag"
            )));
        }

        let created = sqlx::query_as::<_, TagAlias>(
            "INSERT INTO tag_aliases (tag_id, alias) VALUES ($1, $2) RETURNING id, tag_id, alias",
        )
        .bind(tag_id)
        .bind(alias)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CatalogError::conflict_on_unique(e, format!("the alias `{alias}` is already taken")))?;

        tx.commit().await?;
        Ok(created)
    }

    /// Deletes a tag, its aliases, and every file's link to it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_tag(&self, tag_id: TagId) -> Result<TagId, CatalogError> {
        let mut tx = self.pool.begin().await?;

        if !tag_exists(&mut tx, tag_id).await? {
            return Err(CatalogError::not_found("tag", tag_id));
        }

        sqlx::query("DELETE FROM tag_aliases WHERE tag_id = $1")
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM file_tags WHERE tag_id = $1")
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!("Deleted tag {tag_id}.");
        Ok(tag_id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_alias(&self, alias_id: AliasId) -> Result<AliasId, CatalogError> {
        let res = sqlx::query("DELETE FROM tag_aliases WHERE id = $1")
            .bind(alias_id)
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 0 {
            return Err(CatalogError::not_found("alias", alias_id));
        }
        Ok(alias_id)
    }
}

async fn tag_exists(conn: &mut SqliteConnection, tag_id: TagId) -> Result<bool, CatalogError> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tags WHERE id = $1)")
        .bind(tag_id)
        .fetch_one(conn)
        .await
        .map_err(CatalogError::from)
}

async fn alias_exists(conn: &mut SqliteConnection, alias: &str) -> Result<bool, CatalogError> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tag_aliases WHERE alias = $1)")
        .bind(alias)
        .fetch_one(conn)
        .await
        .map_err(CatalogError::from)
}

/// Grabs the given tags, keeping the order of `ids`.
async fn tags_by_id(conn: &mut SqliteConnection, ids: &[TagId]) -> Result<Vec<Tag>, CatalogError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut found: HashMap<TagId, Tag> = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(ID_CHUNK) {
        let (select, values) = Query::select()
            .columns([Tags::Id, Tags::Name, Tags::Category])
            .from(Tags::Table)
            .and_where(Expr::col(Tags::Id).is_in(chunk.iter().copied()))
            .build_sqlx(SqliteQueryBuilder);

        for tag in sqlx::query_as_with::<_, Tag, _>(&select, values)
            .fetch_all(&mut *conn)
            .await?
        {
            found.insert(tag.id, tag);
        }
    }

    Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
}

/// Decorates each tag with its aliases, a chunk of tags per query.
pub(crate) async fn with_aliases(
    conn: &mut SqliteConnection,
    tags: Vec<Tag>,
) -> Result<Vec<TagRecord>, CatalogError> {
    if tags.is_empty() {
        return Ok(Vec::new());
    }

    let mut by_tag: HashMap<TagId, Vec<TagAlias>> = HashMap::new();
    for chunk in tags.chunks(ID_CHUNK) {
        let (select, values) = Query::select()
            .columns([TagAliases::Id, TagAliases::TagId, TagAliases::Alias])
            .from(TagAliases::Table)
            .and_where(Expr::col(TagAliases::TagId).is_in(chunk.iter().map(|t| t.id)))
            .order_by(TagAliases::Id, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        for alias in sqlx::query_as_with::<_, TagAlias, _>(&select, values)
            .fetch_all(&mut *conn)
            .await?
        {
            by_tag.entry(alias.tag_id).or_default().push(alias);
        }
    }

    Ok(tags
        .into_iter()
        .map(|tag| TagRecord {
            aliases: by_tag.remove(&tag.id).unwrap_or_default(),
            tag,
        })
        .collect())
}
