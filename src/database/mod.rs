//! Helps to connect to the database.

use sqlx::{
    query::Query,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

use crate::{config::Config, error::CatalogError};

pub mod tables;

/// How many ids go into one `IN (...)` list.
///
/// SQLite caps bound variables per statement (32766 by default), so longer
/// lists get split up.
pub(crate) const ID_CHUNK: usize = 500;

/// A thing that has a row in some table.
pub trait InsertIntoTable {
    /// Makes the `INSERT` query for this value. Run it on a connection (or
    /// transaction) of your choosing.
    fn make_insertion_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>>;
}

/// Opens (creating if missing) the catalog database described by `config`,
/// then brings its schema up to date.
#[tracing::instrument(skip_all)]
pub async fn connect(config: &Config) -> Result<Pool<Sqlite>, CatalogError> {
    let db_path = config.database_path();

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .inspect_err(|e| tracing::error!("Failed to create the data directory. err: {e}"))
        .map_err(|err| CatalogError::Io {
            action: "create",
            path: config.data_dir.clone(),
            err,
        })?;

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .inspect_err(|e| tracing::error!("Failed to connect to the catalog database. err: {e}"))?;

    // we'll also run migrations here real quick
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .inspect_err(|e| {
            tracing::error!(
                "Database connection succeeded, but migrating the database failed! err: {e}"
            )
        })?;

    tracing::debug!("Catalog database is ready at `{db_path}`.");
    Ok(pool)
}

/// Escapes `LIKE` wildcards so `query` only matches itself, then wraps it for
/// substring matching. Use with `ESCAPE '\'`.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut s = String::with_capacity(query.len() + 2);
    s.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            s.push('\\');
        }
        s.push(c);
    }
    s.push('%');
    s
}
