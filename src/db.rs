//! Database connection and schema bootstrap

use crate::app_config::DatabaseConfig;
use crate::orm::*;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    Schema,
};
use std::time::Duration;

/// Open a connection pool to the configured database.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    log::info!("Connected to {:?} database", db.get_database_backend());
    Ok(db)
}

/// Create every table that does not exist yet, parents before children.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    create_table(db, backend, users::Entity).await?;
    create_table(db, backend, categories::Entity).await?;
    create_table(db, backend, tags::Entity).await?;
    create_table(db, backend, articles::Entity).await?;
    create_table(db, backend, article_tags::Entity).await?;
    create_table(db, backend, article_likes::Entity).await?;
    create_table(db, backend, bookmarks::Entity).await?;
    create_table(db, backend, article_views::Entity).await?;
    create_table(db, backend, comments::Entity).await?;
    create_table(db, backend, comment_likes::Entity).await?;
    create_table(db, backend, comment_dislikes::Entity).await?;
    create_table(db, backend, comment_reports::Entity).await?;
    create_table(db, backend, settings::Entity).await?;
    create_table(db, backend, user_preferences::Entity).await?;

    log::debug!("Schema is up to date");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, backend: DbBackend, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}
