pub mod article_likes;
pub mod article_tags;
pub mod article_views;
pub mod articles;
pub mod bookmarks;
pub mod categories;
pub mod comment_dislikes;
pub mod comment_likes;
pub mod comment_reports;
pub mod comments;
pub mod settings;
pub mod tags;
pub mod user_preferences;
pub mod users;
