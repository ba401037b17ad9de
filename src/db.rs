use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::error::RepoError;

const UNIQUE_VIOLATION: &str = "23505";

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is not set")?;
    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
        .context("connect to database")?;

    // Run migrations if present
    if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
        warn!(error = %e, "migration failed; continuing");
    }
    Ok(db)
}

/// Maps a driver error to a domain-neutral one, logging the original.
/// Unique-key violations become `AlreadyExists(entity)`.
pub(crate) fn translate(err: sqlx::Error, fallback: RepoError, entity: &'static str) -> RepoError {
    let unique = err
        .as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code == UNIQUE_VIOLATION);
    if unique {
        warn!(entity, "unique constraint violated");
        return RepoError::AlreadyExists(entity);
    }
    error!(error = %err, "{}", fallback);
    fallback
}
