//! The content store seam.
//!
//! Both the relational store and the document store implement
//! `ArticleRepository`; the server picks one at startup and hands it to the
//! routes as `Data<Arc<dyn ArticleRepository>>`.

use super::metrics::Metrics;
use super::moderation::ModerationAction;
use super::view::*;
use crate::app_config::LimitsConfig;
use crate::error::Result;
use crate::orm::comments::{self, CommentStatus};
use crate::orm::{articles, categories, users};
use async_trait::async_trait;

/// Sizes the repositories page and threshold by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub page_size: u64,
    pub admin_page_size: u64,
    pub report_flag_threshold: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl From<&LimitsConfig> for Limits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            admin_page_size: config.admin_page_size.max(1),
            report_flag_threshold: config.report_flag_threshold.max(1),
        }
    }
}

/// Comment submitted by a reader. Content is already normalized.
#[derive(Clone, Debug)]
pub struct NewComment {
    pub content: String,
    pub parent_id: Option<i32>,
    pub status: CommentStatus,
}

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    // Categories

    async fn categories(&self) -> Result<Vec<categories::Model>>;
    async fn category_by_slug(&self, slug: &str) -> Result<Option<categories::Model>>;
    async fn create_category(&self, input: &NewCategory) -> Result<categories::Model>;

    // Public listings. `viewer` is the signed-in user, if any.

    async fn featured(&self, viewer: Option<&str>) -> Result<Option<ArticleView>>;
    async fn trending(&self, page: u64, viewer: Option<&str>) -> Result<ArticlePage>;
    async fn latest(&self, page: u64, viewer: Option<&str>) -> Result<ArticlePage>;
    async fn by_category(
        &self,
        category_id: i32,
        page: u64,
        viewer: Option<&str>,
    ) -> Result<ArticlePage>;
    async fn most_read(&self) -> Result<Vec<MostReadItem>>;
    async fn popular_topics(&self) -> Result<Vec<String>>;
    async fn search(&self, query: &str, page: u64, viewer: Option<&str>) -> Result<SearchPage>;

    // Single article

    async fn article(&self, id: i32, viewer: Option<&str>) -> Result<Option<ArticleView>>;
    async fn article_comments(&self, id: i32) -> Result<Vec<CommentNode>>;
    async fn interactions(&self, article_id: i32, user_id: &str) -> Result<Interactions>;
    async fn record_view(&self, article_id: i32, view: ViewRecord) -> Result<()>;
    /// `desired: None` toggles.
    async fn set_like(&self, article_id: i32, user_id: &str, desired: Option<bool>)
        -> Result<LikeState>;
    /// `desired: None` toggles.
    async fn set_bookmark(
        &self,
        article_id: i32,
        user_id: &str,
        desired: Option<bool>,
    ) -> Result<BookmarkState>;

    // Content management

    async fn create_article(&self, author_id: &str, input: &NewArticle) -> Result<articles::Model>;
    async fn update_article(&self, id: i32, patch: &ArticlePatch) -> Result<articles::Model>;
    async fn delete_article(&self, id: i32) -> Result<()>;
    async fn admin_articles(&self, filter: &AdminFilter) -> Result<AdminArticlePage>;
    async fn recent_articles(&self) -> Result<Vec<AdminArticleRow>>;
    async fn metrics(&self) -> Result<Metrics>;

    // Per user

    async fn user_bookmarks(&self, user_id: &str) -> Result<Vec<ArticleView>>;
    async fn user_stats(&self, user_id: &str) -> Result<UserStats>;

    // Comments

    async fn create_comment(
        &self,
        article_id: i32,
        author_id: &str,
        input: NewComment,
    ) -> Result<comments::Model>;
    async fn update_comment(&self, id: i32, user_id: &str, content: String)
        -> Result<comments::Model>;
    /// Removes the comment and every reply below it. Returns the removed root.
    async fn delete_comment(
        &self,
        id: i32,
        user_id: &str,
        can_moderate: bool,
    ) -> Result<comments::Model>;
    async fn toggle_comment_like(&self, id: i32, user_id: &str) -> Result<CommentVotes>;
    async fn toggle_comment_dislike(&self, id: i32, user_id: &str) -> Result<CommentVotes>;
    async fn report_comment(
        &self,
        id: i32,
        user_id: &str,
        reason: Option<String>,
    ) -> Result<ReportOutcome>;
    async fn moderate_comment(&self, id: i32, action: ModerationAction)
        -> Result<comments::Model>;
    async fn comments_by_status(
        &self,
        status: CommentStatus,
        search: Option<&str>,
    ) -> Result<Vec<ModerationRow>>;
    async fn moderation_queue(&self) -> Result<Vec<ModerationRow>>;

    // Housekeeping

    /// Keep a copy of a user's display data next to the content. Stores that
    /// read users from the relational table need nothing here.
    async fn mirror_user(&self, _user: &users::Model) -> Result<()> {
        Ok(())
    }

    async fn maintenance(&self) -> Result<()>;
}
