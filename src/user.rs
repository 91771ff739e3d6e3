//! Accounts: sign-in upsert, profiles and notification preferences.
//!
//! Users always live in the relational store, whichever backend serves
//! the content.

use crate::error::{Error, Result};
use crate::orm::{user_preferences, users};
use crate::settings::Settings;
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Verified identity claims posted by the identity provider.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 3, max = 50, message = "must be between 3 and 50 characters"))]
    pub username: Option<String>,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub bio: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub profile_image_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub newsletter: bool,
    pub comment_replies: bool,
    pub article_updates: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            newsletter: true,
            comment_replies: true,
            article_updates: true,
        }
    }
}

impl From<user_preferences::Model> for Preferences {
    fn from(row: user_preferences::Model) -> Self {
        Self {
            newsletter: row.newsletter,
            comment_replies: row.comment_replies,
            article_updates: row.article_updates,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    pub newsletter: Option<bool>,
    pub comment_replies: Option<bool>,
    pub article_updates: Option<bool>,
}

/// A user's own profile, as `/api/user/profile` returns it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub user: users::Model,
    pub preferences: Preferences,
}

pub async fn get_user(db: &DatabaseConnection, id: &str) -> Result<Option<users::Model>> {
    Ok(users::Entity::find_by_id(id.to_owned()).one(db).await?)
}

/// Insert or refresh the user named by `claims`. Claims that are absent
/// leave the stored value alone. New accounts are refused while
/// registration is disabled.
pub async fn upsert_user(
    db: &DatabaseConnection,
    settings: &Settings,
    claims: &Claims,
) -> Result<users::Model> {
    let sub = claims.sub.trim();
    if sub.is_empty() {
        return Err(Error::validation("sub is required"));
    }
    let now = Utc::now().naive_utc();

    if let Some(existing) = get_user(db, sub).await? {
        let mut user: users::ActiveModel = existing.into();
        if let Some(email) = &claims.email {
            user.email = Set(Some(email.clone()));
        }
        if let Some(first_name) = &claims.first_name {
            user.first_name = Set(Some(first_name.clone()));
        }
        if let Some(last_name) = &claims.last_name {
            user.last_name = Set(Some(last_name.clone()));
        }
        if let Some(url) = &claims.profile_image_url {
            user.profile_image_url = Set(Some(url.clone()));
        }
        user.updated_at = Set(now);
        return Ok(user.update(db).await?);
    }

    if !settings.registration_enabled() {
        return Err(Error::forbidden("Registration is closed"));
    }

    let user = users::ActiveModel {
        id: Set(sub.to_owned()),
        email: Set(claims.email.clone()),
        first_name: Set(claims.first_name.clone()),
        last_name: Set(claims.last_name.clone()),
        profile_image_url: Set(claims.profile_image_url.clone()),
        username: Set(None),
        bio: Set(None),
        role: Set(users::Role::User),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    log::info!("Registered user {}", user.id);
    Ok(user)
}

pub async fn get_preferences(db: &DatabaseConnection, user_id: &str) -> Result<Preferences> {
    Ok(user_preferences::Entity::find_by_id(user_id.to_owned())
        .one(db)
        .await?
        .map(Preferences::from)
        .unwrap_or_default())
}

pub async fn get_profile(db: &DatabaseConnection, user_id: &str) -> Result<Profile> {
    let user = get_user(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("User not found"))?;
    Ok(Profile {
        preferences: get_preferences(db, user_id).await?,
        user,
    })
}

pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: &str,
    update: &ProfileUpdate,
) -> Result<users::Model> {
    update.validate()?;

    let existing = get_user(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("User not found"))?;
    let mut user: users::ActiveModel = existing.into();

    if let Some(username) = &update.username {
        let username = username.trim();
        let taken = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .filter(users::Column::Id.ne(user_id))
            .count(db)
            .await?;
        if taken > 0 {
            return Err(Error::validation("Username is already taken"));
        }
        user.username = Set(Some(username.to_owned()));
    }
    if let Some(bio) = &update.bio {
        user.bio = Set(Some(bio.trim().to_owned()));
    }
    if let Some(url) = &update.profile_image_url {
        user.profile_image_url = Set(Some(url.clone()));
    }
    user.updated_at = Set(Utc::now().naive_utc());

    Ok(user.update(db).await?)
}

/// Apply the given switches, keeping the others, and return the result.
pub async fn update_preferences(
    db: &DatabaseConnection,
    user_id: &str,
    update: &PreferencesUpdate,
) -> Result<Preferences> {
    let current = user_preferences::Entity::find_by_id(user_id.to_owned())
        .one(db)
        .await?;
    let base = current
        .clone()
        .map(Preferences::from)
        .unwrap_or_default();

    let next = Preferences {
        newsletter: update.newsletter.unwrap_or(base.newsletter),
        comment_replies: update.comment_replies.unwrap_or(base.comment_replies),
        article_updates: update.article_updates.unwrap_or(base.article_updates),
    };
    let now = Utc::now().naive_utc();

    match current {
        Some(row) => {
            let mut row: user_preferences::ActiveModel = row.into();
            row.newsletter = Set(next.newsletter);
            row.comment_replies = Set(next.comment_replies);
            row.article_updates = Set(next.article_updates);
            row.updated_at = Set(now);
            row.update(db).await?;
        }
        None => {
            user_preferences::Entity::insert(user_preferences::ActiveModel {
                user_id: Set(user_id.to_owned()),
                newsletter: Set(next.newsletter),
                comment_replies: Set(next.comment_replies),
                article_updates: Set(next.article_updates),
                updated_at: Set(now),
            })
            .exec(db)
            .await?;
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_default_on() {
        let prefs = Preferences::default();
        assert!(prefs.newsletter && prefs.comment_replies && prefs.article_updates);
    }

    #[test]
    fn test_profile_update_validation() {
        let update = ProfileUpdate {
            username: Some("ab".into()),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = ProfileUpdate {
            username: Some("reporter".into()),
            profile_image_url: Some("https://cdn.example.com/me.png".into()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_claims_are_camel_case() {
        let claims: Claims = serde_json::from_str(
            r#"{"sub":"u-1","firstName":"Ida","profileImageUrl":"https://x.test/a.png"}"#,
        )
        .unwrap();
        assert_eq!(claims.first_name.as_deref(), Some("Ida"));
        assert!(claims.email.is_none());
    }
}
