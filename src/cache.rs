//! In-memory caching for the public sidebar lists.
//! Uses moka for TTL-based caching.

use crate::app_config;
use crate::articles::view::MostReadItem;
use crate::articles::ArticleRepository;
use crate::error::Result;
use moka::sync::Cache;
use once_cell::sync::Lazy;
use std::time::Duration;

fn ttl() -> Duration {
    Duration::from_secs(app_config::get_config().cache.ttl_seconds.max(1))
}

/// The five most read articles. One entry, keyed by unit.
static MOST_READ_CACHE: Lazy<Cache<(), Vec<MostReadItem>>> =
    Lazy::new(|| Cache::builder().time_to_live(ttl()).max_capacity(1).build());

/// Popular topic names, already formatted as `#Name`.
static POPULAR_TOPICS_CACHE: Lazy<Cache<(), Vec<String>>> =
    Lazy::new(|| Cache::builder().time_to_live(ttl()).max_capacity(1).build());

/// Most read articles, using the cache if available.
pub async fn most_read(repo: &dyn ArticleRepository) -> Result<Vec<MostReadItem>> {
    if let Some(cached) = MOST_READ_CACHE.get(&()) {
        return Ok(cached);
    }

    let items = repo.most_read().await?;
    MOST_READ_CACHE.insert((), items.clone());
    Ok(items)
}

/// Popular topics, using the cache if available.
pub async fn popular_topics(repo: &dyn ArticleRepository) -> Result<Vec<String>> {
    if let Some(cached) = POPULAR_TOPICS_CACHE.get(&()) {
        return Ok(cached);
    }

    let topics = repo.popular_topics().await?;
    POPULAR_TOPICS_CACHE.insert((), topics.clone());
    Ok(topics)
}

/// Drop cached lists after an article write.
pub fn invalidate_articles() {
    MOST_READ_CACHE.invalidate(&());
    POPULAR_TOPICS_CACHE.invalidate(&());
}

/// Empty every cache.
pub fn clear_all() {
    MOST_READ_CACHE.invalidate_all();
    POPULAR_TOPICS_CACHE.invalidate_all();
    log::debug!("Read caches cleared");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidation_empties_both_lists() {
        POPULAR_TOPICS_CACHE.insert((), vec!["#Politics".to_string()]);
        assert!(POPULAR_TOPICS_CACHE.get(&()).is_some());

        invalidate_articles();

        assert!(POPULAR_TOPICS_CACHE.get(&()).is_none());
        assert!(MOST_READ_CACHE.get(&()).is_none());
    }
}
