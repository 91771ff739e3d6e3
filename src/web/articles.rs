//! Public article endpoints and admin content management.

use super::live::{publish, ChangeFeed, ChangeKind};
use super::{success, PageQuery, Repo};
use crate::app_config;
use crate::articles::moderation::{initial_status, normalize_content};
use crate::articles::view::{ArticlePatch, NewArticle, ViewRecord};
use crate::articles::NewComment;
use crate::cache;
use crate::error::Result;
use crate::middleware::ClientCtx;
use crate::settings::Settings;
use actix::Addr;
use actix_web::http::header;
use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    // Fixed paths first so they never reach the id patterns.
    conf.service(featured)
        .service(trending)
        .service(latest)
        .service(most_read)
        .service(search)
        .service(popular_topics)
        .service(create_article)
        .service(view_article)
        .service(article_comments)
        .service(user_interactions)
        .service(record_view)
        .service(like_article)
        .service(bookmark_article)
        .service(create_comment)
        .service(update_article)
        .service(delete_article);
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LikeBody {
    pub liked: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookmarkBody {
    pub bookmarked: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    pub content: String,
    pub parent_id: Option<i32>,
}

#[get("/api/articles/featured")]
pub async fn featured(client: ClientCtx, repo: Repo) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(repo.featured(client.get_id()).await?))
}

#[get("/api/articles/trending")]
pub async fn trending(
    client: ClientCtx,
    repo: Repo,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(repo.trending(query.page(), client.get_id()).await?))
}

#[get("/api/articles/latest")]
pub async fn latest(
    client: ClientCtx,
    repo: Repo,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(repo.latest(query.page(), client.get_id()).await?))
}

#[get("/api/articles/most-read")]
pub async fn most_read(repo: Repo) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(cache::most_read(repo.get_ref().as_ref()).await?))
}

#[get("/api/articles/search")]
pub async fn search(
    client: ClientCtx,
    repo: Repo,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let page = crate::articles::page::page_number(query.page.as_deref());
    let q = query.q.as_deref().unwrap_or("");
    Ok(HttpResponse::Ok().json(repo.search(q, page, client.get_id()).await?))
}

#[get("/api/topics/popular")]
pub async fn popular_topics(repo: Repo) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(cache::popular_topics(repo.get_ref().as_ref()).await?))
}

#[get("/api/articles/{id:\\d+}")]
pub async fn view_article(
    client: ClientCtx,
    repo: Repo,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match repo.article(path.into_inner(), client.get_id()).await? {
        Some(article) => Ok(HttpResponse::Ok().json(article)),
        None => Err(crate::error::Error::not_found("Article not found")),
    }
}

#[get("/api/articles/{id:\\d+}/comments")]
pub async fn article_comments(repo: Repo, path: web::Path<i32>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(repo.article_comments(path.into_inner()).await?))
}

#[get("/api/articles/{id:\\d+}/user-interactions")]
pub async fn user_interactions(
    client: ClientCtx,
    repo: Repo,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    Ok(HttpResponse::Ok().json(repo.interactions(path.into_inner(), user_id).await?))
}

#[post("/api/articles/{id:\\d+}/view")]
pub async fn record_view(
    req: HttpRequest,
    client: ClientCtx,
    repo: Repo,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let view = ViewRecord {
        user_id: client.get_id().map(str::to_owned),
        ip_address: req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_owned),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    };

    repo.record_view(path.into_inner(), view).await?;
    Ok(success())
}

#[post("/api/articles/{id:\\d+}/like")]
pub async fn like_article(
    client: ClientCtx,
    repo: Repo,
    feed: web::Data<Addr<ChangeFeed>>,
    path: web::Path<i32>,
    body: Option<web::Json<LikeBody>>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    let article_id = path.into_inner();
    let desired = body.and_then(|b| b.liked);

    let state = repo.set_like(article_id, user_id, desired).await?;
    publish(&feed, article_id, ChangeKind::Likes);
    Ok(HttpResponse::Ok().json(state))
}

#[post("/api/articles/{id:\\d+}/bookmark")]
pub async fn bookmark_article(
    client: ClientCtx,
    repo: Repo,
    path: web::Path<i32>,
    body: Option<web::Json<BookmarkBody>>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    let desired = body.and_then(|b| b.bookmarked);
    Ok(HttpResponse::Ok().json(repo.set_bookmark(path.into_inner(), user_id, desired).await?))
}

#[post("/api/articles/{id:\\d+}/comments")]
pub async fn create_comment(
    client: ClientCtx,
    repo: Repo,
    settings: web::Data<Arc<Settings>>,
    feed: web::Data<Addr<ChangeFeed>>,
    path: web::Path<i32>,
    body: web::Json<CommentBody>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    let article_id = path.into_inner();
    let body = body.into_inner();

    let comment = NewComment {
        content: normalize_content(&body.content, app_config::limits().max_comment_length)?,
        parent_id: body.parent_id,
        status: initial_status(settings.require_moderation()),
    };
    let comment = repo.create_comment(article_id, user_id, comment).await?;

    publish(&feed, article_id, ChangeKind::Comments);
    Ok(HttpResponse::Ok().json(comment))
}

#[post("/api/articles")]
pub async fn create_article(
    client: ClientCtx,
    repo: Repo,
    body: web::Json<NewArticle>,
) -> Result<HttpResponse> {
    let user_id = client.require_admin()?;
    body.validate()?;

    let article = repo.create_article(user_id, &body).await?;
    cache::invalidate_articles();
    Ok(HttpResponse::Ok().json(article))
}

#[patch("/api/articles/{id:\\d+}")]
pub async fn update_article(
    client: ClientCtx,
    repo: Repo,
    feed: web::Data<Addr<ChangeFeed>>,
    path: web::Path<i32>,
    body: web::Json<ArticlePatch>,
) -> Result<HttpResponse> {
    client.require_admin()?;
    body.validate()?;

    let article = repo.update_article(path.into_inner(), &body).await?;
    cache::invalidate_articles();
    publish(&feed, article.id, ChangeKind::Updated);
    Ok(HttpResponse::Ok().json(article))
}

#[delete("/api/articles/{id:\\d+}")]
pub async fn delete_article(
    client: ClientCtx,
    repo: Repo,
    feed: web::Data<Addr<ChangeFeed>>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    client.require_admin()?;
    let article_id = path.into_inner();

    repo.delete_article(article_id).await?;
    cache::invalidate_articles();
    publish(&feed, article_id, ChangeKind::Deleted);
    Ok(success())
}
