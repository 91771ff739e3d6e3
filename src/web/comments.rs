use super::live::{publish, ChangeFeed, ChangeKind};
use super::{success, Repo};
use crate::app_config;
use crate::articles::moderation::normalize_content;
use crate::error::Result;
use crate::middleware::ClientCtx;
use crate::role::Capabilities;
use actix::Addr;
use actix_web::{delete, patch, post, web, HttpResponse};
use serde::Deserialize;

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    conf.service(like_comment)
        .service(dislike_comment)
        .service(report_comment)
        .service(update_comment)
        .service(delete_comment);
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditBody {
    pub content: String,
}

#[post("/api/comments/{id:\\d+}/like")]
pub async fn like_comment(
    client: ClientCtx,
    repo: Repo,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    Ok(HttpResponse::Ok().json(repo.toggle_comment_like(path.into_inner(), user_id).await?))
}

#[post("/api/comments/{id:\\d+}/dislike")]
pub async fn dislike_comment(
    client: ClientCtx,
    repo: Repo,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    Ok(HttpResponse::Ok().json(
        repo.toggle_comment_dislike(path.into_inner(), user_id)
            .await?,
    ))
}

#[post("/api/comments/{id:\\d+}/report")]
pub async fn report_comment(
    client: ClientCtx,
    repo: Repo,
    path: web::Path<i32>,
    body: Option<web::Json<ReportBody>>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    let reason = body
        .and_then(|b| b.into_inner().reason)
        .map(|r| r.trim().to_owned())
        .filter(|r| !r.is_empty());

    let outcome = repo
        .report_comment(path.into_inner(), user_id, reason)
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[patch("/api/comments/{id:\\d+}")]
pub async fn update_comment(
    client: ClientCtx,
    repo: Repo,
    feed: web::Data<Addr<ChangeFeed>>,
    path: web::Path<i32>,
    body: web::Json<EditBody>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    let content = normalize_content(&body.content, app_config::limits().max_comment_length)?;

    let comment = repo
        .update_comment(path.into_inner(), user_id, content)
        .await?;
    publish(&feed, comment.article_id, ChangeKind::Comments);
    Ok(HttpResponse::Ok().json(comment))
}

/// Authors delete their own comments; moderators delete any.
#[delete("/api/comments/{id:\\d+}")]
pub async fn delete_comment(
    client: ClientCtx,
    repo: Repo,
    feed: web::Data<Addr<ChangeFeed>>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    let can_moderate = client.can(Capabilities::MODERATE);

    let removed = repo
        .delete_comment(path.into_inner(), user_id, can_moderate)
        .await?;
    publish(&feed, removed.article_id, ChangeKind::Comments);
    Ok(success())
}
