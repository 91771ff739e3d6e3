//! Dashboard metrics.

use chrono::{Months, NaiveDateTime, Utc};
use serde::Serialize;

/// A cumulative count split at the start of the reporting window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Split {
    pub total: u64,
    /// Rows created inside the window.
    pub recent: u64,
}

impl Split {
    pub fn growth(&self) -> i64 {
        growth_percent(self.total, self.recent)
    }
}

/// Percentage the cumulative count grew over the window. Nothing before the
/// window reads as 100.
pub fn growth_percent(total: u64, recent: u64) -> i64 {
    let before = total.saturating_sub(recent);
    if before == 0 {
        return 100;
    }
    (recent as f64 / before as f64 * 100.0).round() as i64
}

/// Start of the reporting window: one calendar month ago.
pub fn window_start() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.checked_sub_months(Months::new(1)).unwrap_or(now)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub article_count: u64,
    pub article_growth: i64,
    pub comment_count: u64,
    pub comment_growth: i64,
    pub user_count: u64,
    pub user_growth: i64,
    pub page_views: u64,
    pub views_growth: i64,
}

impl Metrics {
    pub fn from_splits(articles: Split, comments: Split, users: Split, views: Split) -> Self {
        Self {
            article_count: articles.total,
            article_growth: articles.growth(),
            comment_count: comments.total,
            comment_growth: comments.growth(),
            user_count: users.total,
            user_growth: users.growth(),
            page_views: views.total,
            views_growth: views.growth(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_sentinel() {
        assert_eq!(growth_percent(0, 0), 100);
        assert_eq!(growth_percent(7, 7), 100);
    }

    #[test]
    fn test_growth_percent() {
        // 10 before, 5 new: grew by half.
        assert_eq!(growth_percent(15, 5), 50);
        assert_eq!(growth_percent(10, 0), 0);
        assert_eq!(growth_percent(4, 1), 33);
        assert_eq!(growth_percent(30, 20), 200);
    }

    #[test]
    fn test_metrics_from_splits() {
        let m = Metrics::from_splits(
            Split { total: 12, recent: 2 },
            Split { total: 0, recent: 0 },
            Split { total: 3, recent: 1 },
            Split { total: 100, recent: 50 },
        );
        assert_eq!(m.article_growth, 20);
        assert_eq!(m.comment_growth, 100);
        assert_eq!(m.user_growth, 50);
        assert_eq!(m.views_growth, 100);
        assert_eq!(m.page_views, 100);
    }
}
