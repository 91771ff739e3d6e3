//! JSON view models returned by the article endpoints.
//!
//! Field names are camelCase on the wire.

use crate::constants::UNKNOWN_AUTHOR;
use crate::orm::articles::{self, ArticleStatus};
use crate::orm::categories;
use crate::orm::comments::{self, CommentStatus};
use crate::orm::users;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Public face of a user attached to articles and comments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub profile_image_url: Option<String>,
    pub role: String,
}

impl AuthorView {
    /// Placeholder for content whose author row is gone.
    pub fn unknown() -> Self {
        Self {
            id: String::new(),
            name: UNKNOWN_AUTHOR.to_owned(),
            avatar: String::new(),
            profile_image_url: None,
            role: String::new(),
        }
    }

    pub fn from_user(user: Option<&users::Model>) -> Self {
        match user {
            Some(user) => Self {
                id: user.id.clone(),
                name: display_name(
                    user.username.as_deref(),
                    user.first_name.as_deref(),
                    user.last_name.as_deref(),
                ),
                avatar: user.profile_image_url.clone().unwrap_or_default(),
                profile_image_url: user.profile_image_url.clone(),
                role: user.role.as_str().to_owned(),
            },
            None => Self::unknown(),
        }
    }
}

/// Username, else "first last", else the unknown placeholder.
pub fn display_name(username: Option<&str>, first: Option<&str>, last: Option<&str>) -> String {
    if let Some(username) = username.map(str::trim).filter(|u| !u.is_empty()) {
        return username.to_owned();
    }

    let full = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""));
    let full = full.trim();
    if full.is_empty() {
        UNKNOWN_AUTHOR.to_owned()
    } else {
        full.to_owned()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub id: i32,
    pub content: String,
    pub article_id: i32,
    pub parent_id: Option<i32>,
    pub status: CommentStatus,
    pub likes: i32,
    pub dislikes: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub author: AuthorView,
    /// The comment's author also wrote the article.
    pub is_author: bool,
    pub replies: Vec<CommentNode>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    #[serde(flatten)]
    pub article: articles::Model,
    pub category: Option<categories::Model>,
    pub author: AuthorView,
    pub tags: Vec<String>,
    pub comments: Vec<CommentNode>,
    pub likes: i64,
    pub is_liked: bool,
    pub is_bookmarked: bool,
    pub comments_count: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePage {
    pub articles: Vec<ArticleView>,
    pub has_more: bool,
}

/// A category's listing together with the category itself.
#[derive(Clone, Debug, Serialize)]
pub struct CategoryPage {
    pub category: categories::Model,
    #[serde(flatten)]
    pub page: ArticlePage,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub articles: Vec<ArticleView>,
    pub has_more: bool,
    pub total: u64,
}

impl SearchPage {
    pub fn empty() -> Self {
        Self {
            articles: Vec::new(),
            has_more: false,
            total: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MostReadItem {
    pub id: i32,
    pub title: String,
    pub created_at: NaiveDateTime,
    pub view_count: i32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminArticleRow {
    pub id: i32,
    pub title: String,
    pub status: ArticleStatus,
    pub is_breaking: bool,
    pub created_at: NaiveDateTime,
    pub view_count: i32,
    pub comment_count: i64,
    pub category: Option<categories::Model>,
    pub author: AuthorView,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminArticlePage {
    pub articles: Vec<AdminArticleRow>,
    pub total: u64,
    pub total_pages: u64,
}

/// Admin listing filter. `category: None` means every category.
#[derive(Clone, Debug, Default)]
pub struct AdminFilter {
    pub page: u64,
    pub search: Option<String>,
    pub category: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Interactions {
    pub liked: bool,
    pub bookmarked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub likes: i64,
    pub is_liked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BookmarkState {
    pub bookmarked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CommentVotes {
    pub likes: i32,
    pub dislikes: i32,
    pub liked: bool,
    pub disliked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ReportOutcome {
    /// False when this user had already reported the comment.
    pub reported: bool,
    pub reports: u64,
    pub status: CommentStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArticleRef {
    pub id: i32,
    pub title: String,
}

/// A comment as the moderation screens show it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationRow {
    #[serde(flatten)]
    pub comment: comments::Model,
    pub author: AuthorView,
    pub article: Option<ArticleRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentComment {
    pub id: i32,
    pub content: String,
    pub status: CommentStatus,
    pub created_at: NaiveDateTime,
    pub article_id: i32,
    pub article_title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub comments: u64,
    pub likes: u64,
    pub bookmarks: u64,
    pub articles_read: u64,
    pub recent_comments: Vec<RecentComment>,
}

/// Who is looking at a page, for view counting.
#[derive(Clone, Debug, Default)]
pub struct ViewRecord {
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

fn default_status() -> ArticleStatus {
    ArticleStatus::Published
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    #[validate(length(min = 10, max = 255, message = "must be between 10 and 255 characters"))]
    pub title: String,
    #[validate(length(min = 20, message = "must be at least 20 characters"))]
    pub excerpt: String,
    #[validate(length(min = 100, message = "must be at least 100 characters"))]
    pub content: String,
    #[validate(url(message = "must be a valid URL"))]
    pub image: String,
    #[validate(range(min = 1, message = "must reference a category"))]
    pub category_id: i32,
    #[serde(default)]
    pub is_breaking: bool,
    #[serde(default = "default_status")]
    pub status: ArticleStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update. Absent fields keep their value; `tags`, when present,
/// replaces the article's tags.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePatch {
    #[validate(length(min = 10, max = 255, message = "must be between 10 and 255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 20, message = "must be at least 20 characters"))]
    pub excerpt: Option<String>,
    #[validate(length(min = 100, message = "must be at least 100 characters"))]
    pub content: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub image: Option<String>,
    #[validate(range(min = 1, message = "must reference a category"))]
    pub category_id: Option<i32>,
    pub is_breaking: Option<bool>,
    pub status: Option<ArticleStatus>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub name: String,
    pub description: Option<String>,
}
