//! Session endpoints.
//!
//! The identity provider is trusted upstream. It posts verified claims to
//! `/api/auth/session` together with the shared secret, and we sign the
//! user into a cookie session. Every later request is resolved by
//! `ClientCtx`.

use super::{success, Repo};
use crate::app_config;
use crate::constants::SESSION_USER_ID;
use crate::error::{Error, Result};
use crate::middleware::ClientCtx;
use crate::settings::Settings;
use crate::user::{self, Claims};
use actix_session::Session;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub const IDENTITY_SECRET_HEADER: &str = "X-Identity-Secret";

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    conf.service(current_user)
        .service(open_session)
        .service(logout);
}

/// An empty configured secret disables the endpoint.
fn secret_matches(presented: Option<&str>, expected: &str) -> bool {
    !expected.is_empty() && presented == Some(expected)
}

#[get("/api/auth/user")]
pub async fn current_user(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse> {
    let user_id = client.require_login()?;
    let user = user::get_user(&db, user_id)
        .await?
        .ok_or(Error::Unauthorized)?;
    Ok(HttpResponse::Ok().json(user))
}

#[post("/api/auth/session")]
pub async fn open_session(
    req: HttpRequest,
    session: Session,
    db: web::Data<DatabaseConnection>,
    settings: web::Data<Arc<Settings>>,
    repo: Repo,
    claims: web::Json<Claims>,
) -> Result<HttpResponse> {
    let presented = req
        .headers()
        .get(IDENTITY_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if !secret_matches(presented, &app_config::get_config().identity.shared_secret) {
        log::warn!("Rejected session request with a bad identity secret");
        return Err(Error::Unauthorized);
    }

    let user = user::upsert_user(&db, &settings, &claims).await?;
    repo.mirror_user(&user).await?;

    session.renew();
    session
        .insert(SESSION_USER_ID, &user.id)
        .map_err(|e| Error::Internal(format!("session insert failed: {}", e)))?;

    log::debug!("Session opened for user {}", user.id);
    Ok(HttpResponse::Ok().json(user))
}

#[post("/api/auth/logout")]
pub async fn logout(session: Session) -> HttpResponse {
    session.purge();
    success()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_matching() {
        assert!(secret_matches(Some("s3cret"), "s3cret"));
        assert!(!secret_matches(Some("guess"), "s3cret"));
        assert!(!secret_matches(None, "s3cret"));
        // Unconfigured secret never matches, not even an empty header.
        assert!(!secret_matches(Some(""), ""));
    }
}
