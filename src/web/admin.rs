//! Administration and moderation tools.
//!
//! Everything here requires an admin or developer; the cache and
//! maintenance routes require a developer.

use super::live::{publish, ChangeFeed, ChangeKind};
use super::{success, Repo};
use crate::articles::moderation::{parse_status, ModerationAction};
use crate::articles::page::page_number;
use crate::articles::view::{AdminFilter, NewCategory};
use crate::cache;
use crate::error::{Error, Result};
use crate::middleware::ClientCtx;
use crate::settings::{Section, Settings};
use actix::Addr;
use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use validator::Validate;

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    conf.service(metrics)
        .service(recent_articles)
        .service(list_articles)
        .service(create_category)
        .service(moderation_queue)
        .service(comments_by_status)
        .service(moderate_comment)
        .service(view_settings)
        .service(update_settings)
        .service(clear_cache)
        .service(database_maintenance);
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminArticlesQuery {
    pub page: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// `all`, empty or absent means every category.
fn parse_category(raw: Option<&str>) -> Result<Option<i32>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(id) => id
            .parse()
            .map(Some)
            .map_err(|_| Error::validation("Invalid category")),
    }
}

impl AdminArticlesQuery {
    fn filter(&self) -> Result<AdminFilter> {
        Ok(AdminFilter {
            page: page_number(self.page.as_deref()),
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            category: parse_category(self.category.as_deref())?,
        })
    }
}

#[get("/api/admin/metrics")]
pub async fn metrics(client: ClientCtx, repo: Repo) -> Result<HttpResponse> {
    client.require_admin()?;
    Ok(HttpResponse::Ok().json(repo.metrics().await?))
}

#[get("/api/admin/articles/recent")]
pub async fn recent_articles(client: ClientCtx, repo: Repo) -> Result<HttpResponse> {
    client.require_admin()?;
    Ok(HttpResponse::Ok().json(repo.recent_articles().await?))
}

#[get("/api/admin/articles")]
pub async fn list_articles(
    client: ClientCtx,
    repo: Repo,
    query: web::Query<AdminArticlesQuery>,
) -> Result<HttpResponse> {
    client.require_admin()?;
    let filter = query.filter()?;
    Ok(HttpResponse::Ok().json(repo.admin_articles(&filter).await?))
}

#[post("/api/admin/categories")]
pub async fn create_category(
    client: ClientCtx,
    repo: Repo,
    body: web::Json<NewCategory>,
) -> Result<HttpResponse> {
    client.require_admin()?;
    body.validate()?;
    Ok(HttpResponse::Ok().json(repo.create_category(&body).await?))
}

#[get("/api/admin/comments/moderation")]
pub async fn moderation_queue(client: ClientCtx, repo: Repo) -> Result<HttpResponse> {
    client.require_admin()?;
    Ok(HttpResponse::Ok().json(repo.moderation_queue().await?))
}

#[get("/api/admin/comments/{status}")]
pub async fn comments_by_status(
    client: ClientCtx,
    repo: Repo,
    path: web::Path<String>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    client.require_admin()?;
    let status = parse_status(&path)?;
    let rows = repo
        .comments_by_status(status, query.search.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[post("/api/admin/comments/{id:\\d+}/{action}")]
pub async fn moderate_comment(
    client: ClientCtx,
    repo: Repo,
    feed: web::Data<Addr<ChangeFeed>>,
    path: web::Path<(i32, String)>,
) -> Result<HttpResponse> {
    client.require_admin()?;
    let (id, action) = path.into_inner();
    let action: ModerationAction = action.parse()?;

    let comment = repo.moderate_comment(id, action).await?;
    log::info!(
        "Comment {} moved to {:?} by {}",
        id,
        comment.status,
        client.get_name()
    );
    publish(&feed, comment.article_id, ChangeKind::Comments);
    Ok(HttpResponse::Ok().json(comment))
}

#[get("/api/admin/settings")]
pub async fn view_settings(
    client: ClientCtx,
    settings: web::Data<Arc<Settings>>,
) -> Result<HttpResponse> {
    client.require_admin()?;
    Ok(HttpResponse::Ok().json(settings.grouped()))
}

#[post("/api/admin/settings/{section}")]
pub async fn update_settings(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    settings: web::Data<Arc<Settings>>,
    path: web::Path<String>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse> {
    client.require_admin()?;
    let section: Section = path
        .parse()
        .map_err(|_| Error::validation("Invalid settings section"))?;

    settings.update_section(&db, section, &body).await?;
    Ok(success())
}

#[post("/api/admin/cache/clear")]
pub async fn clear_cache(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    settings: web::Data<Arc<Settings>>,
) -> Result<HttpResponse> {
    client.require_developer()?;

    cache::clear_all();
    settings.load_from_database(&db).await?;
    log::info!("Caches cleared by {}", client.get_name());
    Ok(success())
}

#[post("/api/admin/database/maintenance")]
pub async fn database_maintenance(client: ClientCtx, repo: Repo) -> Result<HttpResponse> {
    client.require_developer()?;
    repo.maintenance().await?;
    Ok(success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category(None).unwrap(), None);
        assert_eq!(parse_category(Some("all")).unwrap(), None);
        assert_eq!(parse_category(Some("7")).unwrap(), Some(7));
        assert!(parse_category(Some("sports")).is_err());
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let query = AdminArticlesQuery {
            search: Some("  ".into()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.page, 1);
        assert!(filter.search.is_none());
    }
}
