//! The signed-in user's own profile, bookmarks, stats and preferences.

use super::Repo;
use crate::error::Result;
use crate::middleware::ClientCtx;
use crate::user::{self, PreferencesUpdate, ProfileUpdate};
use actix_web::{get, patch, post, web, HttpResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    conf.service(view_profile)
        .service(update_profile)
        .service(bookmarks)
        .service(stats)
        .service(update_preferences);
}

#[get("/api/user/profile")]
pub async fn view_profile(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    Ok(HttpResponse::Ok().json(user::get_profile(&db, user_id).await?))
}

#[patch("/api/user/profile")]
pub async fn update_profile(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    repo: Repo,
    body: web::Json<ProfileUpdate>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;

    let updated = user::update_profile(&db, user_id, &body).await?;
    repo.mirror_user(&updated).await?;

    Ok(HttpResponse::Ok().json(user::get_profile(&db, user_id).await?))
}

#[get("/api/user/bookmarks")]
pub async fn bookmarks(client: ClientCtx, repo: Repo) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    Ok(HttpResponse::Ok().json(repo.user_bookmarks(user_id).await?))
}

#[get("/api/user/stats")]
pub async fn stats(client: ClientCtx, repo: Repo) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    Ok(HttpResponse::Ok().json(repo.user_stats(user_id).await?))
}

#[post("/api/user/preferences")]
pub async fn update_preferences(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    body: web::Json<PreferencesUpdate>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    Ok(HttpResponse::Ok().json(user::update_preferences(&db, user_id, &body).await?))
}
