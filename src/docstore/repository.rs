//! `ArticleRepository` over the document store.

use super::{ArticleDoc, BookmarkDoc, CommentDoc, DocumentStore, ReportDoc, UserDoc, ViewDoc};
use crate::articles::metrics::{window_start, Metrics, Split};
use crate::articles::moderation::{status_after_report, ModerationAction};
use crate::articles::page::{offset, total_pages};
use crate::articles::tree::build_forest;
use crate::articles::view::*;
use crate::articles::{ArticleRepository, Limits, NewComment};
use crate::constants::{
    MODERATION_QUEUE_LIMIT, MOST_READ_LIMIT, POPULAR_TOPICS_LIMIT, RECENT_ARTICLES_LIMIT,
    RECENT_COMMENTS_LIMIT,
};
use crate::error::{Error, Result};
use crate::orm::articles::{self, ArticleStatus};
use crate::orm::comments::{self, CommentStatus};
use crate::orm::{categories, users};
use crate::slug::{candidates, slugify};
use actix_web::web;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct DocumentRepository {
    store: Arc<DocumentStore>,
    limits: Limits,
}

fn newest_first(a: &ArticleDoc, b: &ArticleDoc) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

fn most_viewed_first(a: &ArticleDoc, b: &ArticleDoc) -> std::cmp::Ordering {
    b.view_count.cmp(&a.view_count).then(newest_first(a, b))
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Trimmed, `#`-stripped tag names, deduplicated by slug.
fn normalize_tags(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|raw| raw.trim().trim_start_matches('#').trim().to_owned())
        .filter(|name| !name.is_empty() && seen.insert(slugify(name)))
        .collect()
}

fn toggle_membership(list: &mut Vec<String>, user_id: &str, want: bool) {
    let present = list.iter().any(|u| u == user_id);
    if want && !present {
        list.push(user_id.to_owned());
    } else if !want && present {
        list.retain(|u| u != user_id);
    }
}

impl DocumentRepository {
    pub fn new(store: Arc<DocumentStore>, limits: Limits) -> Self {
        Self { store, limits }
    }

    /// Write the snapshot on the blocking pool so workers never wait on disk.
    async fn persist(&self) -> Result<()> {
        if !self.store.is_persistent() {
            return Ok(());
        }
        let store = self.store.clone();
        web::block(move || store.flush())
            .await
            .map_err(|e| Error::Internal(format!("document snapshot task failed: {}", e)))?
            .map_err(|e| Error::Internal(format!("document snapshot write failed: {}", e)))
    }

    fn article_doc(&self, id: i32) -> Result<ArticleDoc> {
        self.store
            .articles
            .get(&id)
            .map(|a| a.clone())
            .ok_or_else(|| Error::not_found("Article not found"))
    }

    fn comment_doc(&self, id: i32) -> Result<CommentDoc> {
        self.store
            .comments
            .get(&id)
            .map(|c| c.clone())
            .ok_or_else(|| Error::not_found("Comment not found"))
    }

    fn articles_where(&self, keep: impl Fn(&ArticleDoc) -> bool) -> Vec<ArticleDoc> {
        self.store
            .articles
            .iter()
            .filter(|e| keep(e.value()))
            .map(|e| e.value().clone())
            .collect()
    }

    fn comments_where(&self, keep: impl Fn(&CommentDoc) -> bool) -> Vec<CommentDoc> {
        self.store
            .comments
            .iter()
            .filter(|e| keep(e.value()))
            .map(|e| e.value().clone())
            .collect()
    }

    fn profiles(&self, ids: impl IntoIterator<Item = String>) -> HashMap<String, users::Model> {
        ids.into_iter()
            .filter_map(|id| {
                self.store
                    .users
                    .get(&id)
                    .map(|u| (id.clone(), u.profile.clone()))
            })
            .collect()
    }

    fn bookmarked_ids(&self, user_id: &str) -> HashSet<i32> {
        self.store
            .users
            .get(user_id)
            .map(|u| u.bookmarks.iter().map(|b| b.article_id).collect())
            .unwrap_or_default()
    }

    fn assemble(&self, docs: Vec<ArticleDoc>, viewer: Option<&str>) -> Vec<ArticleView> {
        let ids: HashSet<i32> = docs.iter().map(|a| a.id).collect();
        let approved: Vec<comments::Model> = self
            .comments_where(|c| ids.contains(&c.article_id) && c.status == CommentStatus::Approved)
            .iter()
            .map(CommentDoc::record)
            .collect();

        let mut author_ids: HashSet<String> = docs.iter().map(|a| a.author_id.clone()).collect();
        author_ids.extend(approved.iter().map(|c| c.author_id.clone()));
        let authors = self.profiles(author_ids);
        let bookmarked = viewer.map(|v| self.bookmarked_ids(v)).unwrap_or_default();

        let mut by_article: HashMap<i32, Vec<comments::Model>> = HashMap::new();
        for comment in approved {
            by_article.entry(comment.article_id).or_default().push(comment);
        }

        docs.into_iter()
            .map(|doc| {
                let thread = by_article.remove(&doc.id).unwrap_or_default();
                let comments_count = thread.len() as i64;
                ArticleView {
                    category: self.store.categories.get(&doc.category_id).map(|c| c.clone()),
                    author: AuthorView::from_user(authors.get(&doc.author_id)),
                    tags: doc.tags.clone(),
                    comments: build_forest(&doc.author_id, thread, &authors),
                    likes: doc.likes.len() as i64,
                    is_liked: viewer.map_or(false, |v| doc.likes.iter().any(|u| u == v)),
                    is_bookmarked: bookmarked.contains(&doc.id),
                    comments_count,
                    article: doc.record(),
                }
            })
            .collect()
    }

    fn page_of(
        &self,
        mut docs: Vec<ArticleDoc>,
        order: fn(&ArticleDoc, &ArticleDoc) -> std::cmp::Ordering,
        page: u64,
        viewer: Option<&str>,
    ) -> ArticlePage {
        docs.sort_by(order);
        let size = self.limits.page_size as usize;
        let start = offset(page, self.limits.page_size) as usize;
        let has_more = docs.len() > start.saturating_add(size);
        let rows: Vec<ArticleDoc> = docs.into_iter().skip(start).take(size).collect();

        ArticlePage {
            articles: self.assemble(rows, viewer),
            has_more,
        }
    }

    fn admin_rows(&self, docs: Vec<ArticleDoc>) -> Vec<AdminArticleRow> {
        let authors = self.profiles(docs.iter().map(|a| a.author_id.clone()));
        let ids: HashSet<i32> = docs.iter().map(|a| a.id).collect();
        let mut counts: HashMap<i32, i64> = HashMap::new();
        for comment in self.comments_where(|c| ids.contains(&c.article_id)) {
            *counts.entry(comment.article_id).or_default() += 1;
        }

        docs.into_iter()
            .map(|a| AdminArticleRow {
                comment_count: counts.get(&a.id).copied().unwrap_or(0),
                category: self.store.categories.get(&a.category_id).map(|c| c.clone()),
                author: AuthorView::from_user(authors.get(&a.author_id)),
                id: a.id,
                title: a.title,
                status: a.status,
                is_breaking: a.is_breaking,
                created_at: a.created_at,
                view_count: a.view_count,
            })
            .collect()
    }

    fn moderation_rows(&self, docs: Vec<CommentDoc>) -> Vec<ModerationRow> {
        let authors = self.profiles(docs.iter().map(|c| c.author_id.clone()));
        docs.into_iter()
            .map(|doc| ModerationRow {
                author: AuthorView::from_user(authors.get(&doc.author_id)),
                article: self.store.articles.get(&doc.article_id).map(|a| ArticleRef {
                    id: a.id,
                    title: a.title.clone(),
                }),
                comment: doc.record(),
            })
            .collect()
    }

    fn require_category(&self, id: i32) -> Result<()> {
        if self.store.categories.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::validation("Category does not exist"))
        }
    }

    fn unique_slug(&self, base: &str, taken: impl Fn(&str) -> bool) -> String {
        candidates(&slugify(base))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| slugify(base))
    }

    async fn vote(&self, comment_id: i32, user_id: &str, like: bool) -> Result<CommentVotes> {
        let votes = {
            let mut doc = self
                .store
                .comments
                .get_mut(&comment_id)
                .ok_or_else(|| Error::not_found("Comment not found"))?;

            let (mine, other) = if like {
                let CommentDoc { likes, dislikes, .. } = &mut *doc;
                (likes, dislikes)
            } else {
                let CommentDoc { likes, dislikes, .. } = &mut *doc;
                (dislikes, likes)
            };
            let had = mine.iter().any(|u| u == user_id);
            toggle_membership(mine, user_id, !had);
            toggle_membership(other, user_id, false);
            doc.updated_at = Utc::now().naive_utc();

            CommentVotes {
                likes: doc.likes.len() as i32,
                dislikes: doc.dislikes.len() as i32,
                liked: doc.likes.iter().any(|u| u == user_id),
                disliked: doc.dislikes.iter().any(|u| u == user_id),
            }
        };
        self.persist().await?;
        Ok(votes)
    }
}

#[async_trait]
impl ArticleRepository for DocumentRepository {
    async fn categories(&self) -> Result<Vec<categories::Model>> {
        let mut all: Vec<categories::Model> =
            self.store.categories.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<categories::Model>> {
        Ok(self
            .store
            .categories
            .iter()
            .find(|e| e.value().slug == slug)
            .map(|e| e.value().clone()))
    }

    async fn create_category(&self, input: &NewCategory) -> Result<categories::Model> {
        let name = input.name.trim();
        let slug = self.unique_slug(name, |s| {
            self.store.categories.iter().any(|e| e.value().slug == s)
        });
        let now = Utc::now().naive_utc();
        let category = categories::Model {
            id: self.store.next_id(),
            name: name.to_owned(),
            slug,
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.categories.insert(category.id, category.clone());
        self.persist().await?;
        Ok(category)
    }

    async fn featured(&self, viewer: Option<&str>) -> Result<Option<ArticleView>> {
        let published = self.articles_where(|a| a.status == ArticleStatus::Published);

        let pick = published
            .iter()
            .filter(|a| a.is_breaking)
            .min_by(|a, b| newest_first(a, b))
            .or_else(|| published.iter().min_by(|a, b| most_viewed_first(a, b)))
            .cloned();

        Ok(pick.and_then(|doc| self.assemble(vec![doc], viewer).pop()))
    }

    async fn trending(&self, page: u64, viewer: Option<&str>) -> Result<ArticlePage> {
        let docs = self.articles_where(|a| a.status == ArticleStatus::Published);
        Ok(self.page_of(docs, most_viewed_first, page, viewer))
    }

    async fn latest(&self, page: u64, viewer: Option<&str>) -> Result<ArticlePage> {
        let docs = self.articles_where(|a| a.status == ArticleStatus::Published);
        Ok(self.page_of(docs, newest_first, page, viewer))
    }

    async fn by_category(
        &self,
        category_id: i32,
        page: u64,
        viewer: Option<&str>,
    ) -> Result<ArticlePage> {
        let docs = self.articles_where(|a| {
            a.status == ArticleStatus::Published && a.category_id == category_id
        });
        Ok(self.page_of(docs, newest_first, page, viewer))
    }

    async fn most_read(&self) -> Result<Vec<MostReadItem>> {
        let mut docs = self.articles_where(|a| a.status == ArticleStatus::Published);
        docs.sort_by(most_viewed_first);

        Ok(docs
            .into_iter()
            .take(MOST_READ_LIMIT as usize)
            .map(|a| MostReadItem {
                id: a.id,
                title: a.title,
                created_at: a.created_at,
                view_count: a.view_count,
            })
            .collect())
    }

    async fn popular_topics(&self) -> Result<Vec<String>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for entry in self.store.articles.iter() {
            for tag in &entry.value().tags {
                *counts.entry(tag.clone()).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(ranked
            .into_iter()
            .take(POPULAR_TOPICS_LIMIT)
            .map(|(name, _)| format!("#{}", name))
            .collect())
    }

    async fn search(&self, query: &str, page: u64, viewer: Option<&str>) -> Result<SearchPage> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(SearchPage::empty());
        }

        let docs = self.articles_where(|a| {
            a.status == ArticleStatus::Published
                && (contains_ci(&a.title, &needle)
                    || contains_ci(&a.excerpt, &needle)
                    || contains_ci(&a.content, &needle))
        });
        let total = docs.len() as u64;
        let listing = self.page_of(docs, newest_first, page, viewer);

        Ok(SearchPage {
            articles: listing.articles,
            has_more: listing.has_more,
            total,
        })
    }

    async fn article(&self, id: i32, viewer: Option<&str>) -> Result<Option<ArticleView>> {
        let doc = self.store.articles.get(&id).map(|a| a.clone());
        Ok(doc.and_then(|doc| self.assemble(vec![doc], viewer).pop()))
    }

    async fn article_comments(&self, id: i32) -> Result<Vec<CommentNode>> {
        let article = self.article_doc(id)?;
        let thread: Vec<comments::Model> = self
            .comments_where(|c| c.article_id == id)
            .iter()
            .map(CommentDoc::record)
            .collect();
        let authors = self.profiles(thread.iter().map(|c| c.author_id.clone()));
        Ok(build_forest(&article.author_id, thread, &authors))
    }

    async fn interactions(&self, article_id: i32, user_id: &str) -> Result<Interactions> {
        let liked = self
            .store
            .articles
            .get(&article_id)
            .map_or(false, |a| a.likes.iter().any(|u| u == user_id));
        Ok(Interactions {
            liked,
            bookmarked: self.bookmarked_ids(user_id).contains(&article_id),
        })
    }

    async fn record_view(&self, article_id: i32, view: ViewRecord) -> Result<()> {
        {
            let mut doc = self
                .store
                .articles
                .get_mut(&article_id)
                .ok_or_else(|| Error::not_found("Article not found"))?;
            doc.view_count += 1;
        }
        if let Ok(mut views) = self.store.views.lock() {
            views.push(ViewDoc {
                article_id,
                user_id: view.user_id,
                created_at: Utc::now().naive_utc(),
            });
        }
        self.persist().await
    }

    async fn set_like(
        &self,
        article_id: i32,
        user_id: &str,
        desired: Option<bool>,
    ) -> Result<LikeState> {
        let state = {
            let mut doc = self
                .store
                .articles
                .get_mut(&article_id)
                .ok_or_else(|| Error::not_found("Article not found"))?;
            let current = doc.likes.iter().any(|u| u == user_id);
            let want = desired.unwrap_or(!current);
            toggle_membership(&mut doc.likes, user_id, want);
            LikeState {
                likes: doc.likes.len() as i64,
                is_liked: want,
            }
        };
        self.persist().await?;
        Ok(state)
    }

    async fn set_bookmark(
        &self,
        article_id: i32,
        user_id: &str,
        desired: Option<bool>,
    ) -> Result<BookmarkState> {
        if !self.store.articles.contains_key(&article_id) {
            return Err(Error::not_found("Article not found"));
        }

        let bookmarked = {
            let now = Utc::now().naive_utc();
            let mut user = self
                .store
                .users
                .entry(user_id.to_owned())
                .or_insert_with(|| UserDoc::placeholder(user_id, now));
            let current = user.bookmarks.iter().any(|b| b.article_id == article_id);
            let want = desired.unwrap_or(!current);
            if want && !current {
                user.bookmarks.push(BookmarkDoc {
                    article_id,
                    created_at: now,
                });
            } else if !want && current {
                user.bookmarks.retain(|b| b.article_id != article_id);
            }
            want
        };
        self.persist().await?;
        Ok(BookmarkState { bookmarked })
    }

    async fn create_article(&self, author_id: &str, input: &NewArticle) -> Result<articles::Model> {
        self.require_category(input.category_id)?;

        let title = input.title.trim();
        let slug = self.unique_slug(title, |s| {
            self.store.articles.iter().any(|e| e.value().slug == s)
        });
        let now = Utc::now().naive_utc();

        let doc = ArticleDoc {
            id: self.store.next_id(),
            title: title.to_owned(),
            slug,
            excerpt: input.excerpt.clone(),
            content: input.content.clone(),
            image: input.image.clone(),
            author_id: author_id.to_owned(),
            category_id: input.category_id,
            status: input.status,
            is_breaking: input.is_breaking,
            view_count: 0,
            created_at: now,
            updated_at: now,
            tags: normalize_tags(&input.tags),
            likes: Vec::new(),
        };
        let record = doc.record();
        self.store.articles.insert(doc.id, doc);
        self.persist().await?;

        log::info!("Article {} created by {}", record.id, author_id);
        Ok(record)
    }

    async fn update_article(&self, id: i32, patch: &ArticlePatch) -> Result<articles::Model> {
        if let Some(category_id) = patch.category_id {
            self.require_category(category_id)?;
        }

        let record = {
            let mut doc = self
                .store
                .articles
                .get_mut(&id)
                .ok_or_else(|| Error::not_found("Article not found"))?;
            if let Some(title) = &patch.title {
                doc.title = title.trim().to_owned();
            }
            if let Some(excerpt) = &patch.excerpt {
                doc.excerpt = excerpt.clone();
            }
            if let Some(content) = &patch.content {
                doc.content = content.clone();
            }
            if let Some(image) = &patch.image {
                doc.image = image.clone();
            }
            if let Some(category_id) = patch.category_id {
                doc.category_id = category_id;
            }
            if let Some(is_breaking) = patch.is_breaking {
                doc.is_breaking = is_breaking;
            }
            if let Some(status) = patch.status {
                doc.status = status;
            }
            if let Some(tags) = &patch.tags {
                doc.tags = normalize_tags(tags);
            }
            doc.updated_at = Utc::now().naive_utc();
            doc.record()
        };
        self.persist().await?;
        Ok(record)
    }

    async fn delete_article(&self, id: i32) -> Result<()> {
        if self.store.articles.remove(&id).is_none() {
            return Err(Error::not_found("Article not found"));
        }
        self.store.comments.retain(|_, c| c.article_id != id);
        for mut user in self.store.users.iter_mut() {
            user.bookmarks.retain(|b| b.article_id != id);
        }
        if let Ok(mut views) = self.store.views.lock() {
            views.retain(|v| v.article_id != id);
        }
        self.persist().await?;

        log::info!("Article {} deleted", id);
        Ok(())
    }

    async fn admin_articles(&self, filter: &AdminFilter) -> Result<AdminArticlePage> {
        let size = self.limits.admin_page_size;
        let page = filter.page.max(1);
        let needle = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut docs = self.articles_where(|a| {
            filter.category.map_or(true, |c| a.category_id == c)
                && needle.as_deref().map_or(true, |n| {
                    contains_ci(&a.title, n) || contains_ci(&a.excerpt, n)
                })
        });
        docs.sort_by(newest_first);
        let total = docs.len() as u64;
        let rows: Vec<ArticleDoc> = docs
            .into_iter()
            .skip(offset(page, size) as usize)
            .take(size as usize)
            .collect();

        Ok(AdminArticlePage {
            articles: self.admin_rows(rows),
            total,
            total_pages: total_pages(total, size),
        })
    }

    async fn recent_articles(&self) -> Result<Vec<AdminArticleRow>> {
        let mut docs = self.articles_where(|_| true);
        docs.sort_by(newest_first);
        docs.truncate(RECENT_ARTICLES_LIMIT as usize);
        Ok(self.admin_rows(docs))
    }

    async fn metrics(&self) -> Result<Metrics> {
        let since = window_start();
        let split = |dates: Vec<chrono::NaiveDateTime>| Split {
            total: dates.len() as u64,
            recent: dates.iter().filter(|d| **d >= since).count() as u64,
        };

        let articles = split(self.store.articles.iter().map(|e| e.created_at).collect());
        let comments = split(self.store.comments.iter().map(|e| e.created_at).collect());
        let users = split(self.store.users.iter().map(|e| e.profile.created_at).collect());
        let views = split(
            self.store
                .views
                .lock()
                .map(|v| v.iter().map(|v| v.created_at).collect())
                .unwrap_or_default(),
        );

        Ok(Metrics::from_splits(articles, comments, users, views))
    }

    async fn user_bookmarks(&self, user_id: &str) -> Result<Vec<ArticleView>> {
        let mut marks = self
            .store
            .users
            .get(user_id)
            .map(|u| u.bookmarks.clone())
            .unwrap_or_default();
        marks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let docs: Vec<ArticleDoc> = marks
            .iter()
            .filter_map(|m| self.store.articles.get(&m.article_id).map(|a| a.clone()))
            .filter(|a| a.status == ArticleStatus::Published)
            .collect();
        Ok(self.assemble(docs, Some(user_id)))
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats> {
        let mut authored = self.comments_where(|c| c.author_id == user_id);
        let likes = self
            .store
            .articles
            .iter()
            .filter(|e| e.likes.iter().any(|u| u == user_id))
            .count() as u64;
        let bookmarks = self
            .store
            .users
            .get(user_id)
            .map_or(0, |u| u.bookmarks.len() as u64);
        let articles_read = self
            .store
            .views
            .lock()
            .map(|views| {
                views
                    .iter()
                    .filter(|v| v.user_id.as_deref() == Some(user_id))
                    .map(|v| v.article_id)
                    .collect::<HashSet<_>>()
                    .len() as u64
            })
            .unwrap_or(0);

        let comments = authored.len() as u64;
        authored.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let recent_comments = authored
            .into_iter()
            .take(RECENT_COMMENTS_LIMIT as usize)
            .map(|c| RecentComment {
                article_title: self.store.articles.get(&c.article_id).map(|a| a.title.clone()),
                id: c.id,
                content: c.content,
                status: c.status,
                created_at: c.created_at,
                article_id: c.article_id,
            })
            .collect();

        Ok(UserStats {
            comments,
            likes,
            bookmarks,
            articles_read,
            recent_comments,
        })
    }

    async fn create_comment(
        &self,
        article_id: i32,
        author_id: &str,
        input: NewComment,
    ) -> Result<comments::Model> {
        self.article_doc(article_id)?;
        if let Some(parent_id) = input.parent_id {
            let parent = self
                .store
                .comments
                .get(&parent_id)
                .map(|c| c.article_id)
                .ok_or_else(|| Error::validation("Parent comment does not exist"))?;
            if parent != article_id {
                return Err(Error::validation(
                    "Parent comment belongs to a different article",
                ));
            }
        }

        let now = Utc::now().naive_utc();
        let doc = CommentDoc {
            id: self.store.next_id(),
            article_id,
            author_id: author_id.to_owned(),
            content: input.content,
            parent_id: input.parent_id,
            status: input.status,
            likes: Vec::new(),
            dislikes: Vec::new(),
            reports: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let record = doc.record();
        self.store.comments.insert(doc.id, doc);
        self.persist().await?;
        Ok(record)
    }

    async fn update_comment(
        &self,
        id: i32,
        user_id: &str,
        content: String,
    ) -> Result<comments::Model> {
        let record = {
            let mut doc = self
                .store
                .comments
                .get_mut(&id)
                .ok_or_else(|| Error::not_found("Comment not found"))?;
            if doc.author_id != user_id {
                return Err(Error::forbidden("You can only edit your own comments"));
            }
            doc.content = content;
            doc.updated_at = Utc::now().naive_utc();
            doc.record()
        };
        self.persist().await?;
        Ok(record)
    }

    async fn delete_comment(
        &self,
        id: i32,
        user_id: &str,
        can_moderate: bool,
    ) -> Result<comments::Model> {
        let root = self.comment_doc(id)?;
        if root.author_id != user_id && !can_moderate {
            return Err(Error::forbidden("You can only delete your own comments"));
        }

        let mut doomed: HashSet<i32> = HashSet::from([id]);
        let mut frontier = vec![id];
        while !frontier.is_empty() {
            let parents: HashSet<i32> = frontier.drain(..).collect();
            frontier = self
                .comments_where(|c| c.parent_id.map_or(false, |p| parents.contains(&p)))
                .into_iter()
                .map(|c| c.id)
                .filter(|id| doomed.insert(*id))
                .collect();
        }
        self.store.comments.retain(|cid, _| !doomed.contains(cid));
        self.persist().await?;

        Ok(root.record())
    }

    async fn toggle_comment_like(&self, id: i32, user_id: &str) -> Result<CommentVotes> {
        self.vote(id, user_id, true).await
    }

    async fn toggle_comment_dislike(&self, id: i32, user_id: &str) -> Result<CommentVotes> {
        self.vote(id, user_id, false).await
    }

    async fn report_comment(
        &self,
        id: i32,
        user_id: &str,
        reason: Option<String>,
    ) -> Result<ReportOutcome> {
        let outcome = {
            let mut doc = self
                .store
                .comments
                .get_mut(&id)
                .ok_or_else(|| Error::not_found("Comment not found"))?;

            let already = doc.reports.iter().any(|r| r.user_id == user_id);
            if !already {
                doc.reports.push(ReportDoc {
                    user_id: user_id.to_owned(),
                    reason,
                    created_at: Utc::now().naive_utc(),
                });
                let reports = doc.reports.len() as u64;
                let next =
                    status_after_report(doc.status, reports, self.limits.report_flag_threshold);
                if next != doc.status {
                    log::info!("Comment {} flagged after {} reports", id, reports);
                    doc.status = next;
                }
            }

            ReportOutcome {
                reported: !already,
                reports: doc.reports.len() as u64,
                status: doc.status,
            }
        };
        self.persist().await?;
        Ok(outcome)
    }

    async fn moderate_comment(
        &self,
        id: i32,
        action: ModerationAction,
    ) -> Result<comments::Model> {
        let now = Utc::now().naive_utc();
        let record = {
            let mut doc = self
                .store
                .comments
                .get_mut(&id)
                .ok_or_else(|| Error::not_found("Comment not found"))?;
            doc.status = action.target();
            doc.updated_at = now;
            doc.record()
        };

        if action.cascades_to_replies() {
            for mut reply in self.store.comments.iter_mut() {
                if reply.parent_id == Some(id) {
                    reply.status = action.target();
                    reply.updated_at = now;
                }
            }
        }
        self.persist().await?;
        Ok(record)
    }

    async fn comments_by_status(
        &self,
        status: CommentStatus,
        search: Option<&str>,
    ) -> Result<Vec<ModerationRow>> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let mut docs = self.comments_where(|c| {
            c.status == status
                && needle
                    .as_deref()
                    .map_or(true, |n| contains_ci(&c.content, n))
        });
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(self.moderation_rows(docs))
    }

    async fn moderation_queue(&self) -> Result<Vec<ModerationRow>> {
        let mut docs = self.comments_where(|c| c.status == CommentStatus::Pending);
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        docs.truncate(MODERATION_QUEUE_LIMIT as usize);
        Ok(self.moderation_rows(docs))
    }

    async fn mirror_user(&self, user: &users::Model) -> Result<()> {
        self.store
            .users
            .entry(user.id.clone())
            .and_modify(|doc| doc.profile = user.clone())
            .or_insert_with(|| UserDoc {
                profile: user.clone(),
                bookmarks: Vec::new(),
            });
        self.persist().await
    }

    async fn maintenance(&self) -> Result<()> {
        self.persist().await?;
        log::info!("Document store snapshot rewritten");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::users::Role;

    fn repo() -> DocumentRepository {
        DocumentRepository::new(Arc::new(DocumentStore::in_memory()), Limits::default())
    }

    fn user(id: &str, role: Role) -> users::Model {
        let now = Utc::now().naive_utc();
        users::Model {
            id: id.into(),
            email: None,
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            profile_image_url: None,
            username: None,
            bio: None,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    fn new_article(category_id: i32, title: &str) -> NewArticle {
        NewArticle {
            title: title.into(),
            excerpt: "An excerpt that is long enough".into(),
            content: "Body text. ".repeat(12),
            image: "https://img.example.com/a.jpg".into(),
            category_id,
            is_breaking: false,
            status: ArticleStatus::Published,
            tags: vec!["Politics".into(), "#politics".into(), "Economy".into()],
        }
    }

    async fn seeded() -> (DocumentRepository, i32) {
        let repo = repo();
        repo.mirror_user(&user("editor", Role::Admin)).await.unwrap();
        let category = repo
            .create_category(&NewCategory {
                name: "World".into(),
                description: None,
            })
            .await
            .unwrap();
        let article = repo
            .create_article("editor", &new_article(category.id, "Summit ends in agreement"))
            .await
            .unwrap();
        (repo, article.id)
    }

    fn approved(content: &str, parent_id: Option<i32>) -> NewComment {
        NewComment {
            content: content.into(),
            parent_id,
            status: CommentStatus::Approved,
        }
    }

    #[actix_rt::test]
    async fn test_like_toggle_and_explicit_state() {
        let (repo, id) = seeded().await;

        let state = repo.set_like(id, "reader", None).await.unwrap();
        assert_eq!(state, LikeState { likes: 1, is_liked: true });

        // Asking for the current state twice changes nothing.
        let state = repo.set_like(id, "reader", Some(true)).await.unwrap();
        assert_eq!(state.likes, 1);

        let state = repo.set_like(id, "reader", None).await.unwrap();
        assert_eq!(state, LikeState { likes: 0, is_liked: false });

        assert!(repo.set_like(999, "reader", None).await.is_err());
    }

    #[actix_rt::test]
    async fn test_tags_are_deduplicated_by_slug() {
        let (repo, id) = seeded().await;
        let view = repo.article(id, None).await.unwrap().unwrap();
        assert_eq!(view.tags, vec!["Politics", "Economy"]);

        let topics = repo.popular_topics().await.unwrap();
        assert!(topics.contains(&"#Politics".to_string()));
    }

    #[actix_rt::test]
    async fn test_comment_like_removes_dislike() {
        let (repo, id) = seeded().await;
        let comment = repo
            .create_comment(id, "reader", approved("Great piece", None))
            .await
            .unwrap();

        let votes = repo.toggle_comment_dislike(comment.id, "critic").await.unwrap();
        assert_eq!((votes.likes, votes.dislikes), (0, 1));

        let votes = repo.toggle_comment_like(comment.id, "critic").await.unwrap();
        assert_eq!((votes.likes, votes.dislikes), (1, 0));
        assert!(votes.liked && !votes.disliked);

        let votes = repo.toggle_comment_like(comment.id, "critic").await.unwrap();
        assert_eq!((votes.likes, votes.dislikes), (0, 0));
    }

    #[actix_rt::test]
    async fn test_third_distinct_report_flags() {
        let (repo, id) = seeded().await;
        let comment = repo
            .create_comment(id, "reader", approved("Spam spam spam", None))
            .await
            .unwrap();

        repo.report_comment(comment.id, "u1", None).await.unwrap();
        let dup = repo.report_comment(comment.id, "u1", None).await.unwrap();
        assert!(!dup.reported);
        assert_eq!(dup.reports, 1);

        let second = repo.report_comment(comment.id, "u2", None).await.unwrap();
        assert_eq!(second.status, CommentStatus::Approved);
        let third = repo
            .report_comment(comment.id, "u3", Some("spam".into()))
            .await
            .unwrap();
        assert_eq!(third.status, CommentStatus::Flagged);
    }

    #[actix_rt::test]
    async fn test_reject_cascades_one_level() {
        let (repo, id) = seeded().await;
        let root = repo.create_comment(id, "a", approved("root", None)).await.unwrap();
        let reply = repo
            .create_comment(id, "b", approved("reply", Some(root.id)))
            .await
            .unwrap();
        let deeper = repo
            .create_comment(id, "c", approved("deeper", Some(reply.id)))
            .await
            .unwrap();

        repo.moderate_comment(root.id, ModerationAction::Reject)
            .await
            .unwrap();

        let status = |cid: i32| repo.store.comments.get(&cid).unwrap().status;
        assert_eq!(status(root.id), CommentStatus::Rejected);
        assert_eq!(status(reply.id), CommentStatus::Rejected);
        assert_eq!(status(deeper.id), CommentStatus::Approved);
    }

    #[actix_rt::test]
    async fn test_parent_must_share_article() {
        let (repo, id) = seeded().await;
        let category_id = repo.categories().await.unwrap()[0].id;
        let other = repo
            .create_article("editor", &new_article(category_id, "Another long headline"))
            .await
            .unwrap();
        let root = repo.create_comment(id, "a", approved("root", None)).await.unwrap();

        let err = repo
            .create_comment(other.id, "a", approved("stray", Some(root.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[actix_rt::test]
    async fn test_listing_has_more_and_bookmarks() {
        let repo = repo();
        let category = repo
            .create_category(&NewCategory {
                name: "Tech".into(),
                description: None,
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for n in 0..11 {
            let article = repo
                .create_article("editor", &new_article(category.id, &format!("Headline number {}", n)))
                .await
                .unwrap();
            ids.push(article.id);
        }

        let first = repo.latest(1, None).await.unwrap();
        assert_eq!(first.articles.len(), 10);
        assert!(first.has_more);
        let second = repo.latest(2, None).await.unwrap();
        assert_eq!(second.articles.len(), 1);
        assert!(!second.has_more);

        repo.set_bookmark(ids[0], "reader", None).await.unwrap();
        repo.set_bookmark(ids[5], "reader", None).await.unwrap();
        let marks = repo.user_bookmarks("reader").await.unwrap();
        assert_eq!(marks.len(), 2);
        assert!(marks.iter().all(|a| a.is_bookmarked));

        let anonymous = repo.article(ids[0], None).await.unwrap().unwrap();
        assert!(!anonymous.is_bookmarked && !anonymous.is_liked);
    }

    #[actix_rt::test]
    async fn test_delete_comment_removes_replies() {
        let (repo, id) = seeded().await;
        let root = repo.create_comment(id, "a", approved("root", None)).await.unwrap();
        repo.create_comment(id, "b", approved("reply", Some(root.id)))
            .await
            .unwrap();

        let err = repo.delete_comment(root.id, "b", false).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        repo.delete_comment(root.id, "admin", true).await.unwrap();
        assert!(repo.store.comments.is_empty());
    }

    #[actix_rt::test]
    async fn test_mutations_reach_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("newsroom.json");
        let store = Arc::new(DocumentStore::open(&path).unwrap());
        let repo = DocumentRepository::new(store, Limits::default());

        let category = repo
            .create_category(&NewCategory {
                name: "Science".into(),
                description: None,
            })
            .await
            .unwrap();
        repo.mirror_user(&user("admin", Role::Admin)).await.unwrap();

        let reopened = DocumentStore::open(&path).unwrap();
        assert_eq!(reopened.categories.get(&category.id).unwrap().slug, "science");
        assert!(reopened.users.contains_key("admin"));
        assert!(!path.with_extension("tmp").exists());
    }
}
