//! Application-wide constants

/// Display name for authors whose account is missing or has no name
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Entries on the "most read" sidebar
pub const MOST_READ_LIMIT: u64 = 5;

/// Tags listed as popular topics
pub const POPULAR_TOPICS_LIMIT: usize = 10;

/// Newest articles on the admin dashboard
pub const RECENT_ARTICLES_LIMIT: u64 = 3;

/// Oldest pending comments shown in the moderation queue
pub const MODERATION_QUEUE_LIMIT: u64 = 5;

/// Newest comments on a user's stats card
pub const RECENT_COMMENTS_LIMIT: u64 = 5;

/// Session key holding the signed-in user's id
pub const SESSION_USER_ID: &str = "user_id";
