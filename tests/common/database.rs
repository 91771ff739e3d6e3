//! Test database setup and management
#![allow(dead_code)]

use newsroom::app_config::DatabaseConfig;
use newsroom::orm::*;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use std::env;
use tempfile::TempDir;

/// A schema-initialized database that lives as long as the value.
///
/// Uses TEST_DATABASE_URL when set, otherwise a throwaway SQLite file.
pub struct TestDatabase {
    pub db: DatabaseConnection,
    _dir: Option<TempDir>,
}

pub async fn setup_test_database() -> Result<TestDatabase, DbErr> {
    let (url, dir) = match env::var("TEST_DATABASE_URL") {
        Ok(url) => (url, None),
        Err(_) => {
            let dir = tempfile::tempdir().map_err(|e| DbErr::Custom(e.to_string()))?;
            let path = dir.path().join("newsroom_test.db");
            (format!("sqlite://{}?mode=rwc", path.display()), Some(dir))
        }
    };

    let config = DatabaseConfig {
        url,
        max_connections: 1,
        ..Default::default()
    };
    let db = newsroom::db::connect(&config).await?;
    newsroom::db::create_schema(&db).await?;

    let test_db = TestDatabase { db, _dir: dir };
    cleanup_test_data(&test_db.db).await?;
    Ok(test_db)
}

/// Remove every row, children before parents.
pub async fn cleanup_test_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    comment_reports::Entity::delete_many().exec(db).await?;
    comment_dislikes::Entity::delete_many().exec(db).await?;
    comment_likes::Entity::delete_many().exec(db).await?;
    comments::Entity::delete_many().exec(db).await?;
    article_views::Entity::delete_many().exec(db).await?;
    bookmarks::Entity::delete_many().exec(db).await?;
    article_likes::Entity::delete_many().exec(db).await?;
    article_tags::Entity::delete_many().exec(db).await?;
    articles::Entity::delete_many().exec(db).await?;
    tags::Entity::delete_many().exec(db).await?;
    categories::Entity::delete_many().exec(db).await?;
    user_preferences::Entity::delete_many().exec(db).await?;
    settings::Entity::delete_many().exec(db).await?;
    users::Entity::delete_many().exec(db).await?;
    Ok(())
}
