//! Test fixtures for creating test data
#![allow(dead_code)]

use chrono::Utc;
use newsroom::articles::view::{NewArticle, NewCategory};
use newsroom::articles::{ArticleRepository, Limits, NewComment, SqlRepository};
use newsroom::docstore::{DocumentRepository, DocumentStore};
use newsroom::orm::articles::{self, ArticleStatus};
use newsroom::orm::comments::{self, CommentStatus};
use newsroom::orm::{categories, users};
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection, DbErr};
use std::sync::Arc;

pub const LONG_CONTENT: &str = "Reporters on the ground confirmed the details late on Tuesday, \
    and officials are expected to publish a full statement after the review concludes.";

pub fn sql_repo(db: &DatabaseConnection) -> Arc<dyn ArticleRepository> {
    Arc::new(SqlRepository::new(db.clone(), Limits::default()))
}

pub fn doc_repo() -> Arc<dyn ArticleRepository> {
    Arc::new(DocumentRepository::new(
        Arc::new(DocumentStore::in_memory()),
        Limits::default(),
    ))
}

/// Insert a user row and mirror it into `repo`.
pub async fn create_test_user(
    db: &DatabaseConnection,
    repo: &dyn ArticleRepository,
    id: &str,
    role: users::Role,
) -> Result<users::Model, DbErr> {
    let now = Utc::now().naive_utc();
    let user = users::ActiveModel {
        id: Set(id.to_owned()),
        email: Set(Some(format!("{}@example.com", id))),
        first_name: Set(Some(capitalize(id))),
        last_name: Set(Some("Tester".to_owned())),
        profile_image_url: Set(None),
        username: Set(None),
        bio: Set(None),
        role: Set(role),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    repo.mirror_user(&user)
        .await
        .map_err(|e| DbErr::Custom(e.to_string()))?;
    Ok(user)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub async fn create_test_category(repo: &dyn ArticleRepository, name: &str) -> categories::Model {
    repo.create_category(&NewCategory {
        name: name.to_owned(),
        description: None,
    })
    .await
    .expect("Failed to create category")
}

pub fn new_article(title: &str, category_id: i32) -> NewArticle {
    NewArticle {
        title: title.to_owned(),
        excerpt: "A short summary of what happened today.".to_owned(),
        content: LONG_CONTENT.to_owned(),
        image: "https://images.example.com/story.jpg".to_owned(),
        category_id,
        is_breaking: false,
        status: ArticleStatus::Published,
        tags: Vec::new(),
    }
}

pub async fn create_test_article(
    repo: &dyn ArticleRepository,
    author_id: &str,
    title: &str,
    category_id: i32,
) -> articles::Model {
    repo.create_article(author_id, &new_article(title, category_id))
        .await
        .expect("Failed to create article")
}

pub async fn create_test_comment(
    repo: &dyn ArticleRepository,
    article_id: i32,
    author_id: &str,
    content: &str,
    parent_id: Option<i32>,
) -> comments::Model {
    repo.create_comment(
        article_id,
        author_id,
        NewComment {
            content: content.to_owned(),
            parent_id,
            status: CommentStatus::Approved,
        },
    )
    .await
    .expect("Failed to create comment")
}

/// Run `scenario` against each storage backend, each on a freshly cleaned
/// database.
pub async fn on_each_backend<F, Fut>(scenario: F)
where
    F: Fn(DatabaseConnection, Arc<dyn ArticleRepository>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let test_db = super::database::setup_test_database()
        .await
        .expect("Failed to setup test database");

    scenario(test_db.db.clone(), sql_repo(&test_db.db)).await;

    super::database::cleanup_test_data(&test_db.db)
        .await
        .expect("Failed to cleanup test data");
    scenario(test_db.db.clone(), doc_repo()).await;
}
