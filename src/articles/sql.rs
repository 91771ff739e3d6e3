//! Relational content store.
//!
//! Every list is assembled with a fixed number of batched queries per page:
//! likes, viewer state, comment counts, categories, tags, comments and
//! authors are each fetched once for all rows.

use super::metrics::{window_start, Metrics, Split};
use super::moderation::{status_after_report, ModerationAction};
use super::page::{has_more_than, offset, total_pages};
use super::repository::{ArticleRepository, Limits, NewComment};
use super::tree::build_forest;
use super::view::*;
use crate::constants::{
    MODERATION_QUEUE_LIMIT, MOST_READ_LIMIT, POPULAR_TOPICS_LIMIT, RECENT_ARTICLES_LIMIT,
    RECENT_COMMENTS_LIMIT,
};
use crate::error::{Error, Result};
use crate::orm::articles::ArticleStatus;
use crate::orm::comments::CommentStatus;
use crate::orm::{
    article_likes, article_tags, article_views, articles, bookmarks, categories,
    comment_dislikes, comment_likes, comment_reports, comments, tags, users,
};
use crate::slug::{candidates, slugify};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    entity::*, query::*, Condition, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    FromQueryResult, PaginatorTrait, Select, Set, Statement, TransactionTrait,
};
use std::collections::{HashMap, HashSet};

const LIKE_ESCAPE: char = '!';

/// Escape `LIKE` wildcards so `needle` only ever matches itself.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// `column LIKE '%needle%'` with `needle` taken literally.
fn contains_literal<E: EntityTrait>(column: E::Column, needle: &str) -> SimpleExpr {
    Expr::cust_with_values(
        &format!(
            "\"{}\".\"{}\" LIKE ? ESCAPE '{}'",
            E::default().table_name(),
            column.as_str(),
            LIKE_ESCAPE
        ),
        vec![like_pattern(needle)],
    )
}

#[derive(Debug, FromQueryResult)]
struct KeyCount {
    key: i32,
    count: i64,
}

/// `key -> COUNT(*)` over rows matching `filter`, grouped by `key`.
async fn grouped_counts<E, C>(
    db: &C,
    key: E::Column,
    filter: Condition,
) -> Result<HashMap<i32, i64>, DbErr>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let rows = E::find()
        .select_only()
        .column_as(key, "key")
        .column_as(Expr::col(key).count(), "count")
        .filter(filter)
        .group_by(key)
        .into_model::<KeyCount>()
        .all(db)
        .await?;

    Ok(rows.into_iter().map(|r| (r.key, r.count)).collect())
}

#[derive(Clone, Copy, Debug)]
enum Sort {
    MostViewed,
    Newest,
}

fn sorted(select: Select<articles::Entity>, sort: Sort) -> Select<articles::Entity> {
    match sort {
        Sort::MostViewed => select
            .order_by_desc(articles::Column::ViewCount)
            .order_by_desc(articles::Column::CreatedAt)
            .order_by_desc(articles::Column::Id),
        Sort::Newest => select
            .order_by_desc(articles::Column::CreatedAt)
            .order_by_desc(articles::Column::Id),
    }
}

fn published() -> Condition {
    Condition::all().add(articles::Column::Status.eq(ArticleStatus::Published))
}

fn not_found_article() -> Error {
    Error::not_found("Article not found")
}

fn not_found_comment() -> Error {
    Error::not_found("Comment not found")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Vote {
    Like,
    Dislike,
}

pub struct SqlRepository {
    db: DatabaseConnection,
    limits: Limits,
}

impl SqlRepository {
    pub fn new(db: DatabaseConnection, limits: Limits) -> Self {
        Self { db, limits }
    }

    async fn require_article(&self, id: i32) -> Result<articles::Model> {
        articles::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(not_found_article)
    }

    async fn users_by_id(&self, ids: HashSet<String>) -> Result<HashMap<String, users::Model>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(users::Entity::find()
            .filter(users::Column::Id.is_in(ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect())
    }

    async fn categories_by_id(
        &self,
        ids: HashSet<i32>,
    ) -> Result<HashMap<i32, categories::Model>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(categories::Entity::find()
            .filter(categories::Column::Id.is_in(ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect())
    }

    async fn tags_by_article(&self, ids: &[i32]) -> Result<HashMap<i32, Vec<String>>> {
        let links = article_tags::Entity::find()
            .filter(article_tags::Column::ArticleId.is_in(ids.to_vec()))
            .all(&self.db)
            .await?;
        if links.is_empty() {
            return Ok(HashMap::new());
        }

        let tag_ids: HashSet<i32> = links.iter().map(|l| l.tag_id).collect();
        let names: HashMap<i32, String> = tags::Entity::find()
            .filter(tags::Column::Id.is_in(tag_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        let mut out: HashMap<i32, Vec<String>> = HashMap::new();
        for link in links {
            if let Some(name) = names.get(&link.tag_id) {
                out.entry(link.article_id).or_default().push(name.clone());
            }
        }
        for list in out.values_mut() {
            list.sort();
        }
        Ok(out)
    }

    /// Attach view model data to a page of articles, keeping their order.
    async fn assemble(
        &self,
        rows: Vec<articles::Model>,
        viewer: Option<&str>,
    ) -> Result<Vec<ArticleView>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = rows.iter().map(|a| a.id).collect();

        let likes = grouped_counts::<article_likes::Entity, _>(
            &self.db,
            article_likes::Column::ArticleId,
            Condition::all().add(article_likes::Column::ArticleId.is_in(ids.clone())),
        )
        .await?;
        let comment_counts = grouped_counts::<comments::Entity, _>(
            &self.db,
            comments::Column::ArticleId,
            Condition::all()
                .add(comments::Column::ArticleId.is_in(ids.clone()))
                .add(comments::Column::Status.eq(CommentStatus::Approved)),
        )
        .await?;

        let (liked, bookmarked): (HashSet<i32>, HashSet<i32>) = match viewer {
            Some(user_id) => {
                let liked = article_likes::Entity::find()
                    .filter(article_likes::Column::UserId.eq(user_id))
                    .filter(article_likes::Column::ArticleId.is_in(ids.clone()))
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(|l| l.article_id)
                    .collect();
                let bookmarked = bookmarks::Entity::find()
                    .filter(bookmarks::Column::UserId.eq(user_id))
                    .filter(bookmarks::Column::ArticleId.is_in(ids.clone()))
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(|b| b.article_id)
                    .collect();
                (liked, bookmarked)
            }
            None => (HashSet::new(), HashSet::new()),
        };

        let categories = self
            .categories_by_id(rows.iter().map(|a| a.category_id).collect())
            .await?;
        let tags = self.tags_by_article(&ids).await?;

        let approved = comments::Entity::find()
            .filter(comments::Column::ArticleId.is_in(ids.clone()))
            .filter(comments::Column::Status.eq(CommentStatus::Approved))
            .all(&self.db)
            .await?;

        let mut author_ids: HashSet<String> = rows.iter().map(|a| a.author_id.clone()).collect();
        author_ids.extend(approved.iter().map(|c| c.author_id.clone()));
        let authors = self.users_by_id(author_ids).await?;

        let mut comments_by_article: HashMap<i32, Vec<comments::Model>> = HashMap::new();
        for comment in approved {
            comments_by_article
                .entry(comment.article_id)
                .or_default()
                .push(comment);
        }

        Ok(rows
            .into_iter()
            .map(|article| {
                let id = article.id;
                let comments = build_forest(
                    &article.author_id,
                    comments_by_article.remove(&id).unwrap_or_default(),
                    &authors,
                );
                ArticleView {
                    category: categories.get(&article.category_id).cloned(),
                    author: AuthorView::from_user(authors.get(&article.author_id)),
                    tags: tags.get(&id).cloned().unwrap_or_default(),
                    comments,
                    likes: likes.get(&id).copied().unwrap_or(0),
                    is_liked: liked.contains(&id),
                    is_bookmarked: bookmarked.contains(&id),
                    comments_count: comment_counts.get(&id).copied().unwrap_or(0),
                    article,
                }
            })
            .collect())
    }

    async fn page_of(
        &self,
        filter: Condition,
        sort: Sort,
        page: u64,
        viewer: Option<&str>,
    ) -> Result<ArticlePage> {
        let size = self.limits.page_size;
        let start = offset(page, size);

        let rows = sorted(articles::Entity::find().filter(filter.clone()), sort)
            .offset(start)
            .limit(size)
            .all(&self.db)
            .await?;
        // One row past the page decides hasMore.
        let next_row = sorted(articles::Entity::find().filter(filter), sort)
            .offset(start.saturating_add(size))
            .one(&self.db)
            .await?;

        Ok(ArticlePage {
            articles: self.assemble(rows, viewer).await?,
            has_more: next_row.is_some(),
        })
    }

    async fn admin_rows(&self, rows: Vec<articles::Model>) -> Result<Vec<AdminArticleRow>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = rows.iter().map(|a| a.id).collect();

        // Admins see every comment, whatever its status.
        let comment_counts = grouped_counts::<comments::Entity, _>(
            &self.db,
            comments::Column::ArticleId,
            Condition::all().add(comments::Column::ArticleId.is_in(ids)),
        )
        .await?;
        let categories = self
            .categories_by_id(rows.iter().map(|a| a.category_id).collect())
            .await?;
        let authors = self
            .users_by_id(rows.iter().map(|a| a.author_id.clone()).collect())
            .await?;

        Ok(rows
            .into_iter()
            .map(|a| AdminArticleRow {
                comment_count: comment_counts.get(&a.id).copied().unwrap_or(0),
                category: categories.get(&a.category_id).cloned(),
                author: AuthorView::from_user(authors.get(&a.author_id)),
                id: a.id,
                title: a.title,
                status: a.status,
                is_breaking: a.is_breaking,
                created_at: a.created_at,
                view_count: a.view_count,
            })
            .collect())
    }

    async fn moderation_rows(&self, rows: Vec<comments::Model>) -> Result<Vec<ModerationRow>> {
        let authors = self
            .users_by_id(rows.iter().map(|c| c.author_id.clone()).collect())
            .await?;
        let article_ids: HashSet<i32> = rows.iter().map(|c| c.article_id).collect();
        let titles: HashMap<i32, String> = if article_ids.is_empty() {
            HashMap::new()
        } else {
            articles::Entity::find()
                .filter(articles::Column::Id.is_in(article_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|a| (a.id, a.title))
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|comment| ModerationRow {
                author: AuthorView::from_user(authors.get(&comment.author_id)),
                article: titles.get(&comment.article_id).map(|title| ArticleRef {
                    id: comment.article_id,
                    title: title.clone(),
                }),
                comment,
            })
            .collect())
    }

    async fn unique_article_slug(&self, title: &str) -> Result<String> {
        for candidate in candidates(&slugify(title)) {
            let taken = articles::Entity::find()
                .filter(articles::Column::Slug.eq(candidate.as_str()))
                .one(&self.db)
                .await?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
        }
        Err(Error::Internal("slug candidates exhausted".to_owned()))
    }

    async fn unique_category_slug(&self, name: &str) -> Result<String> {
        for candidate in candidates(&slugify(name)) {
            let taken = categories::Entity::find()
                .filter(categories::Column::Slug.eq(candidate.as_str()))
                .one(&self.db)
                .await?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
        }
        Err(Error::Internal("slug candidates exhausted".to_owned()))
    }

    async fn require_category(&self, id: i32) -> Result<()> {
        categories::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| Error::validation("Category does not exist"))
    }

    /// Find-or-create each tag by slug and link it. Not transactional.
    async fn attach_tags(&self, article_id: i32, names: &[String]) -> Result<()> {
        let mut seen = HashSet::new();
        let now = Utc::now().naive_utc();

        for raw in names {
            let name = raw.trim().trim_start_matches('#').trim();
            if name.is_empty() {
                continue;
            }
            let slug = slugify(name);
            if !seen.insert(slug.clone()) {
                continue;
            }

            let tag = match tags::Entity::find()
                .filter(tags::Column::Slug.eq(slug.as_str()))
                .one(&self.db)
                .await?
            {
                Some(tag) => tag,
                None => {
                    tags::ActiveModel {
                        name: Set(name.to_owned()),
                        slug: Set(slug),
                        created_at: Set(now),
                        ..Default::default()
                    }
                    .insert(&self.db)
                    .await?
                }
            };

            let linked = article_tags::Entity::find_by_id((article_id, tag.id))
                .one(&self.db)
                .await?
                .is_some();
            if !linked {
                article_tags::Entity::insert(article_tags::ActiveModel {
                    article_id: Set(article_id),
                    tag_id: Set(tag.id),
                })
                .exec(&self.db)
                .await?;
            }
        }
        Ok(())
    }

    async fn vote(&self, comment_id: i32, user_id: &str, vote: Vote) -> Result<CommentVotes> {
        let txn = self.db.begin().await?;

        comments::Entity::find_by_id(comment_id)
            .one(&txn)
            .await?
            .ok_or_else(not_found_comment)?;

        let key = (comment_id, user_id.to_owned());
        let liked = comment_likes::Entity::find_by_id(key.clone())
            .one(&txn)
            .await?
            .is_some();
        let disliked = comment_dislikes::Entity::find_by_id(key.clone())
            .one(&txn)
            .await?
            .is_some();

        // Casting one kind of vote withdraws the other.
        let (remove_like, add_like, remove_dislike, add_dislike) = match vote {
            Vote::Like => (liked, !liked, disliked, false),
            Vote::Dislike => (liked, false, disliked, !disliked),
        };
        let now = Utc::now().naive_utc();

        if remove_like {
            comment_likes::Entity::delete_by_id(key.clone())
                .exec(&txn)
                .await?;
            bump_counter(&txn, comment_id, comments::Column::Likes, -1).await?;
        }
        if add_like {
            comment_likes::Entity::insert(comment_likes::ActiveModel {
                comment_id: Set(comment_id),
                user_id: Set(user_id.to_owned()),
                created_at: Set(now),
            })
            .exec(&txn)
            .await?;
            bump_counter(&txn, comment_id, comments::Column::Likes, 1).await?;
        }
        if remove_dislike {
            comment_dislikes::Entity::delete_by_id(key.clone())
                .exec(&txn)
                .await?;
            bump_counter(&txn, comment_id, comments::Column::Dislikes, -1).await?;
        }
        if add_dislike {
            comment_dislikes::Entity::insert(comment_dislikes::ActiveModel {
                comment_id: Set(comment_id),
                user_id: Set(user_id.to_owned()),
                created_at: Set(now),
            })
            .exec(&txn)
            .await?;
            bump_counter(&txn, comment_id, comments::Column::Dislikes, 1).await?;
        }

        let comment = comments::Entity::find_by_id(comment_id)
            .one(&txn)
            .await?
            .ok_or_else(not_found_comment)?;
        txn.commit().await?;

        Ok(CommentVotes {
            likes: comment.likes,
            dislikes: comment.dislikes,
            liked: add_like,
            disliked: add_dislike,
        })
    }
}

async fn bump_counter<C>(db: &C, comment_id: i32, column: comments::Column, delta: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    comments::Entity::update_many()
        .col_expr(column, Expr::col(column).add(delta))
        .filter(comments::Column::Id.eq(comment_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Total rows of an entity module and those created since `$since`.
macro_rules! split_counts {
    ($db:expr, $entity:ident, $since:expr) => {{
        let total = $entity::Entity::find().count($db).await? as u64;
        let recent = $entity::Entity::find()
            .filter($entity::Column::CreatedAt.gte($since))
            .count($db)
            .await? as u64;
        Split { total, recent }
    }};
}

#[async_trait]
impl ArticleRepository for SqlRepository {
    async fn categories(&self) -> Result<Vec<categories::Model>> {
        Ok(categories::Entity::find()
            .order_by_asc(categories::Column::Name)
            .all(&self.db)
            .await?)
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<categories::Model>> {
        Ok(categories::Entity::find()
            .filter(categories::Column::Slug.eq(slug))
            .one(&self.db)
            .await?)
    }

    async fn create_category(&self, input: &NewCategory) -> Result<categories::Model> {
        let now = Utc::now().naive_utc();
        let name = input.name.trim();
        let slug = self.unique_category_slug(name).await?;

        Ok(categories::ActiveModel {
            name: Set(name.to_owned()),
            slug: Set(slug),
            description: Set(input.description.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?)
    }

    async fn featured(&self, viewer: Option<&str>) -> Result<Option<ArticleView>> {
        let breaking = articles::Entity::find()
            .filter(published())
            .filter(articles::Column::IsBreaking.eq(true))
            .order_by_desc(articles::Column::CreatedAt)
            .order_by_desc(articles::Column::Id)
            .one(&self.db)
            .await?;

        let pick = match breaking {
            Some(article) => Some(article),
            None => {
                sorted(articles::Entity::find().filter(published()), Sort::MostViewed)
                    .one(&self.db)
                    .await?
            }
        };

        match pick {
            Some(article) => Ok(self.assemble(vec![article], viewer).await?.pop()),
            None => Ok(None),
        }
    }

    async fn trending(&self, page: u64, viewer: Option<&str>) -> Result<ArticlePage> {
        self.page_of(published(), Sort::MostViewed, page, viewer)
            .await
    }

    async fn latest(&self, page: u64, viewer: Option<&str>) -> Result<ArticlePage> {
        self.page_of(published(), Sort::Newest, page, viewer).await
    }

    async fn by_category(
        &self,
        category_id: i32,
        page: u64,
        viewer: Option<&str>,
    ) -> Result<ArticlePage> {
        let filter = published().add(articles::Column::CategoryId.eq(category_id));
        self.page_of(filter, Sort::Newest, page, viewer).await
    }

    async fn most_read(&self) -> Result<Vec<MostReadItem>> {
        let rows = sorted(articles::Entity::find().filter(published()), Sort::MostViewed)
            .limit(MOST_READ_LIMIT)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|a| MostReadItem {
                id: a.id,
                title: a.title,
                created_at: a.created_at,
                view_count: a.view_count,
            })
            .collect())
    }

    async fn popular_topics(&self) -> Result<Vec<String>> {
        let counts = grouped_counts::<article_tags::Entity, _>(
            &self.db,
            article_tags::Column::TagId,
            Condition::all(),
        )
        .await?;

        let mut ranked: Vec<(i32, i64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(POPULAR_TOPICS_LIMIT);
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let names: HashMap<i32, String> = tags::Entity::find()
            .filter(tags::Column::Id.is_in(ranked.iter().map(|(id, _)| *id).collect::<Vec<_>>()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        Ok(ranked
            .into_iter()
            .filter_map(|(id, _)| names.get(&id).map(|name| format!("#{}", name)))
            .collect())
    }

    async fn search(&self, query: &str, page: u64, viewer: Option<&str>) -> Result<SearchPage> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchPage::empty());
        }

        let filter = published().add(
            Condition::any()
                .add(contains_literal::<articles::Entity>(articles::Column::Title, query))
                .add(contains_literal::<articles::Entity>(articles::Column::Excerpt, query))
                .add(contains_literal::<articles::Entity>(articles::Column::Content, query)),
        );
        let size = self.limits.page_size;

        let total = articles::Entity::find()
            .filter(filter.clone())
            .count(&self.db)
            .await? as u64;
        let rows = sorted(articles::Entity::find().filter(filter), Sort::Newest)
            .offset(offset(page, size))
            .limit(size)
            .all(&self.db)
            .await?;

        Ok(SearchPage {
            articles: self.assemble(rows, viewer).await?,
            has_more: has_more_than(page, size, total),
            total,
        })
    }

    async fn article(&self, id: i32, viewer: Option<&str>) -> Result<Option<ArticleView>> {
        match articles::Entity::find_by_id(id).one(&self.db).await? {
            Some(article) => Ok(self.assemble(vec![article], viewer).await?.pop()),
            None => Ok(None),
        }
    }

    async fn article_comments(&self, id: i32) -> Result<Vec<CommentNode>> {
        let article = self.require_article(id).await?;
        let approved = comments::Entity::find()
            .filter(comments::Column::ArticleId.eq(id))
            .filter(comments::Column::Status.eq(CommentStatus::Approved))
            .all(&self.db)
            .await?;
        let authors = self
            .users_by_id(approved.iter().map(|c| c.author_id.clone()).collect())
            .await?;

        Ok(build_forest(&article.author_id, approved, &authors))
    }

    async fn interactions(&self, article_id: i32, user_id: &str) -> Result<Interactions> {
        let key = (article_id, user_id.to_owned());
        let liked = article_likes::Entity::find_by_id(key.clone())
            .one(&self.db)
            .await?
            .is_some();
        let bookmarked = bookmarks::Entity::find_by_id(key)
            .one(&self.db)
            .await?
            .is_some();

        Ok(Interactions { liked, bookmarked })
    }

    async fn record_view(&self, article_id: i32, view: ViewRecord) -> Result<()> {
        self.require_article(article_id).await?;

        article_views::ActiveModel {
            article_id: Set(article_id),
            user_id: Set(view.user_id),
            ip_address: Set(view.ip_address),
            user_agent: Set(view.user_agent),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        articles::Entity::update_many()
            .col_expr(
                articles::Column::ViewCount,
                Expr::col(articles::Column::ViewCount).add(1),
            )
            .filter(articles::Column::Id.eq(article_id))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn set_like(
        &self,
        article_id: i32,
        user_id: &str,
        desired: Option<bool>,
    ) -> Result<LikeState> {
        self.require_article(article_id).await?;

        let txn = self.db.begin().await?;
        let key = (article_id, user_id.to_owned());
        let current = article_likes::Entity::find_by_id(key.clone())
            .one(&txn)
            .await?
            .is_some();
        let want = desired.unwrap_or(!current);

        if want && !current {
            article_likes::Entity::insert(article_likes::ActiveModel {
                article_id: Set(article_id),
                user_id: Set(user_id.to_owned()),
                created_at: Set(Utc::now().naive_utc()),
            })
            .exec(&txn)
            .await?;
        } else if !want && current {
            article_likes::Entity::delete_by_id(key).exec(&txn).await?;
        }

        let likes = article_likes::Entity::find()
            .filter(article_likes::Column::ArticleId.eq(article_id))
            .count(&txn)
            .await? as i64;
        txn.commit().await?;

        Ok(LikeState {
            likes,
            is_liked: want,
        })
    }

    async fn set_bookmark(
        &self,
        article_id: i32,
        user_id: &str,
        desired: Option<bool>,
    ) -> Result<BookmarkState> {
        self.require_article(article_id).await?;

        let txn = self.db.begin().await?;
        let key = (article_id, user_id.to_owned());
        let current = bookmarks::Entity::find_by_id(key.clone())
            .one(&txn)
            .await?
            .is_some();
        let want = desired.unwrap_or(!current);

        if want && !current {
            bookmarks::Entity::insert(bookmarks::ActiveModel {
                article_id: Set(article_id),
                user_id: Set(user_id.to_owned()),
                created_at: Set(Utc::now().naive_utc()),
            })
            .exec(&txn)
            .await?;
        } else if !want && current {
            bookmarks::Entity::delete_by_id(key).exec(&txn).await?;
        }
        txn.commit().await?;

        Ok(BookmarkState { bookmarked: want })
    }

    async fn create_article(&self, author_id: &str, input: &NewArticle) -> Result<articles::Model> {
        self.require_category(input.category_id).await?;

        let now = Utc::now().naive_utc();
        let title = input.title.trim();
        let slug = self.unique_article_slug(title).await?;

        let article = articles::ActiveModel {
            title: Set(title.to_owned()),
            slug: Set(slug),
            excerpt: Set(input.excerpt.clone()),
            content: Set(input.content.clone()),
            image: Set(input.image.clone()),
            author_id: Set(author_id.to_owned()),
            category_id: Set(input.category_id),
            status: Set(input.status),
            is_breaking: Set(input.is_breaking),
            view_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        self.attach_tags(article.id, &input.tags).await?;
        log::info!("Article {} created by {}", article.id, author_id);
        Ok(article)
    }

    async fn update_article(&self, id: i32, patch: &ArticlePatch) -> Result<articles::Model> {
        let existing = self.require_article(id).await?;
        if let Some(category_id) = patch.category_id {
            self.require_category(category_id).await?;
        }

        let mut article: articles::ActiveModel = existing.into();
        if let Some(title) = &patch.title {
            article.title = Set(title.trim().to_owned());
        }
        if let Some(excerpt) = &patch.excerpt {
            article.excerpt = Set(excerpt.clone());
        }
        if let Some(content) = &patch.content {
            article.content = Set(content.clone());
        }
        if let Some(image) = &patch.image {
            article.image = Set(image.clone());
        }
        if let Some(category_id) = patch.category_id {
            article.category_id = Set(category_id);
        }
        if let Some(is_breaking) = patch.is_breaking {
            article.is_breaking = Set(is_breaking);
        }
        if let Some(status) = patch.status {
            article.status = Set(status);
        }
        article.updated_at = Set(Utc::now().naive_utc());
        let updated = article.update(&self.db).await?;

        if let Some(tags) = &patch.tags {
            article_tags::Entity::delete_many()
                .filter(article_tags::Column::ArticleId.eq(id))
                .exec(&self.db)
                .await?;
            self.attach_tags(id, tags).await?;
        }

        Ok(updated)
    }

    async fn delete_article(&self, id: i32) -> Result<()> {
        self.require_article(id).await?;

        let txn = self.db.begin().await?;
        let comment_ids: Vec<i32> = comments::Entity::find()
            .filter(comments::Column::ArticleId.eq(id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        if !comment_ids.is_empty() {
            comment_likes::Entity::delete_many()
                .filter(comment_likes::Column::CommentId.is_in(comment_ids.clone()))
                .exec(&txn)
                .await?;
            comment_dislikes::Entity::delete_many()
                .filter(comment_dislikes::Column::CommentId.is_in(comment_ids.clone()))
                .exec(&txn)
                .await?;
            comment_reports::Entity::delete_many()
                .filter(comment_reports::Column::CommentId.is_in(comment_ids))
                .exec(&txn)
                .await?;
        }
        comments::Entity::delete_many()
            .filter(comments::Column::ArticleId.eq(id))
            .exec(&txn)
            .await?;
        article_likes::Entity::delete_many()
            .filter(article_likes::Column::ArticleId.eq(id))
            .exec(&txn)
            .await?;
        bookmarks::Entity::delete_many()
            .filter(bookmarks::Column::ArticleId.eq(id))
            .exec(&txn)
            .await?;
        article_views::Entity::delete_many()
            .filter(article_views::Column::ArticleId.eq(id))
            .exec(&txn)
            .await?;
        article_tags::Entity::delete_many()
            .filter(article_tags::Column::ArticleId.eq(id))
            .exec(&txn)
            .await?;
        articles::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        log::info!("Article {} deleted", id);
        Ok(())
    }

    async fn admin_articles(&self, filter: &AdminFilter) -> Result<AdminArticlePage> {
        let size = self.limits.admin_page_size;
        let page = filter.page.max(1);

        let mut cond = Condition::all();
        if let Some(category_id) = filter.category {
            cond = cond.add(articles::Column::CategoryId.eq(category_id));
        }
        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            cond = cond.add(
                Condition::any()
                    .add(contains_literal::<articles::Entity>(articles::Column::Title, search))
                    .add(contains_literal::<articles::Entity>(articles::Column::Excerpt, search)),
            );
        }

        let total = articles::Entity::find()
            .filter(cond.clone())
            .count(&self.db)
            .await? as u64;
        let rows = sorted(articles::Entity::find().filter(cond), Sort::Newest)
            .offset(offset(page, size))
            .limit(size)
            .all(&self.db)
            .await?;

        Ok(AdminArticlePage {
            articles: self.admin_rows(rows).await?,
            total,
            total_pages: total_pages(total, size),
        })
    }

    async fn recent_articles(&self) -> Result<Vec<AdminArticleRow>> {
        let rows = sorted(articles::Entity::find(), Sort::Newest)
            .limit(RECENT_ARTICLES_LIMIT)
            .all(&self.db)
            .await?;
        self.admin_rows(rows).await
    }

    async fn metrics(&self) -> Result<Metrics> {
        let since = window_start();
        let db = &self.db;

        let article_split = split_counts!(db, articles, since);
        let comment_split = split_counts!(db, comments, since);
        let user_split = split_counts!(db, users, since);
        let view_split = split_counts!(db, article_views, since);

        Ok(Metrics::from_splits(
            article_split,
            comment_split,
            user_split,
            view_split,
        ))
    }

    async fn user_bookmarks(&self, user_id: &str) -> Result<Vec<ArticleView>> {
        let marks = bookmarks::Entity::find()
            .filter(bookmarks::Column::UserId.eq(user_id))
            .order_by_desc(bookmarks::Column::CreatedAt)
            .all(&self.db)
            .await?;
        if marks.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<i32, articles::Model> = articles::Entity::find()
            .filter(published())
            .filter(articles::Column::Id.is_in(marks.iter().map(|m| m.article_id).collect::<Vec<_>>()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        let rows: Vec<articles::Model> = marks
            .iter()
            .filter_map(|m| by_id.remove(&m.article_id))
            .collect();

        self.assemble(rows, Some(user_id)).await
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats> {
        let comments = comments::Entity::find()
            .filter(comments::Column::AuthorId.eq(user_id))
            .count(&self.db)
            .await? as u64;
        let likes = article_likes::Entity::find()
            .filter(article_likes::Column::UserId.eq(user_id))
            .count(&self.db)
            .await? as u64;
        let bookmarks = bookmarks::Entity::find()
            .filter(bookmarks::Column::UserId.eq(user_id))
            .count(&self.db)
            .await? as u64;
        let articles_read = grouped_counts::<article_views::Entity, _>(
            &self.db,
            article_views::Column::ArticleId,
            Condition::all().add(article_views::Column::UserId.eq(user_id)),
        )
        .await?
        .len() as u64;

        let recent = comments::Entity::find()
            .filter(comments::Column::AuthorId.eq(user_id))
            .order_by_desc(comments::Column::CreatedAt)
            .order_by_desc(comments::Column::Id)
            .limit(RECENT_COMMENTS_LIMIT)
            .all(&self.db)
            .await?;
        let titles: HashMap<i32, String> = if recent.is_empty() {
            HashMap::new()
        } else {
            articles::Entity::find()
                .filter(articles::Column::Id.is_in(recent.iter().map(|c| c.article_id).collect::<Vec<_>>()))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|a| (a.id, a.title))
                .collect()
        };

        Ok(UserStats {
            comments,
            likes,
            bookmarks,
            articles_read,
            recent_comments: recent
                .into_iter()
                .map(|c| RecentComment {
                    article_title: titles.get(&c.article_id).cloned(),
                    id: c.id,
                    content: c.content,
                    status: c.status,
                    created_at: c.created_at,
                    article_id: c.article_id,
                })
                .collect(),
        })
    }

    async fn create_comment(
        &self,
        article_id: i32,
        author_id: &str,
        input: NewComment,
    ) -> Result<comments::Model> {
        self.require_article(article_id).await?;

        if let Some(parent_id) = input.parent_id {
            let parent = comments::Entity::find_by_id(parent_id)
                .one(&self.db)
                .await?
                .ok_or_else(|| Error::validation("Parent comment does not exist"))?;
            if parent.article_id != article_id {
                return Err(Error::validation(
                    "Parent comment belongs to a different article",
                ));
            }
        }

        let now = Utc::now().naive_utc();
        Ok(comments::ActiveModel {
            content: Set(input.content),
            article_id: Set(article_id),
            author_id: Set(author_id.to_owned()),
            parent_id: Set(input.parent_id),
            status: Set(input.status),
            likes: Set(0),
            dislikes: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?)
    }

    async fn update_comment(
        &self,
        id: i32,
        user_id: &str,
        content: String,
    ) -> Result<comments::Model> {
        let existing = comments::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(not_found_comment)?;
        if existing.author_id != user_id {
            return Err(Error::forbidden("You can only edit your own comments"));
        }

        let mut comment: comments::ActiveModel = existing.into();
        comment.content = Set(content);
        comment.updated_at = Set(Utc::now().naive_utc());
        Ok(comment.update(&self.db).await?)
    }

    async fn delete_comment(
        &self,
        id: i32,
        user_id: &str,
        can_moderate: bool,
    ) -> Result<comments::Model> {
        let root = comments::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(not_found_comment)?;
        if root.author_id != user_id && !can_moderate {
            return Err(Error::forbidden("You can only delete your own comments"));
        }

        let txn = self.db.begin().await?;

        let mut doomed = vec![id];
        let mut frontier = vec![id];
        while !frontier.is_empty() {
            frontier = comments::Entity::find()
                .filter(comments::Column::ParentId.is_in(frontier))
                .all(&txn)
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect();
            doomed.extend(frontier.iter().copied());
        }

        comment_likes::Entity::delete_many()
            .filter(comment_likes::Column::CommentId.is_in(doomed.clone()))
            .exec(&txn)
            .await?;
        comment_dislikes::Entity::delete_many()
            .filter(comment_dislikes::Column::CommentId.is_in(doomed.clone()))
            .exec(&txn)
            .await?;
        comment_reports::Entity::delete_many()
            .filter(comment_reports::Column::CommentId.is_in(doomed.clone()))
            .exec(&txn)
            .await?;
        comments::Entity::delete_many()
            .filter(comments::Column::Id.is_in(doomed))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        Ok(root)
    }

    async fn toggle_comment_like(&self, id: i32, user_id: &str) -> Result<CommentVotes> {
        self.vote(id, user_id, Vote::Like).await
    }

    async fn toggle_comment_dislike(&self, id: i32, user_id: &str) -> Result<CommentVotes> {
        self.vote(id, user_id, Vote::Dislike).await
    }

    async fn report_comment(
        &self,
        id: i32,
        user_id: &str,
        reason: Option<String>,
    ) -> Result<ReportOutcome> {
        let txn = self.db.begin().await?;

        let comment = comments::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(not_found_comment)?;
        let already = comment_reports::Entity::find_by_id((id, user_id.to_owned()))
            .one(&txn)
            .await?
            .is_some();

        if !already {
            comment_reports::Entity::insert(comment_reports::ActiveModel {
                comment_id: Set(id),
                user_id: Set(user_id.to_owned()),
                reason: Set(reason),
                created_at: Set(Utc::now().naive_utc()),
            })
            .exec(&txn)
            .await?;
        }

        let reports = comment_reports::Entity::find()
            .filter(comment_reports::Column::CommentId.eq(id))
            .count(&txn)
            .await? as u64;

        let mut status = comment.status;
        if !already {
            let next = status_after_report(status, reports, self.limits.report_flag_threshold);
            if next != status {
                comments::Entity::update_many()
                    .col_expr(comments::Column::Status, Expr::value(next))
                    .filter(comments::Column::Id.eq(id))
                    .exec(&txn)
                    .await?;
                log::info!("Comment {} flagged after {} reports", id, reports);
                status = next;
            }
        }
        txn.commit().await?;

        Ok(ReportOutcome {
            reported: !already,
            reports,
            status,
        })
    }

    async fn moderate_comment(
        &self,
        id: i32,
        action: ModerationAction,
    ) -> Result<comments::Model> {
        let txn = self.db.begin().await?;

        comments::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(not_found_comment)?;

        let now = Utc::now().naive_utc();
        comments::Entity::update_many()
            .col_expr(comments::Column::Status, Expr::value(action.target()))
            .col_expr(comments::Column::UpdatedAt, Expr::value(now))
            .filter(comments::Column::Id.eq(id))
            .exec(&txn)
            .await?;

        if action.cascades_to_replies() {
            comments::Entity::update_many()
                .col_expr(comments::Column::Status, Expr::value(action.target()))
                .col_expr(comments::Column::UpdatedAt, Expr::value(now))
                .filter(comments::Column::ParentId.eq(id))
                .exec(&txn)
                .await?;
        }

        let comment = comments::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(not_found_comment)?;
        txn.commit().await?;

        Ok(comment)
    }

    async fn comments_by_status(
        &self,
        status: CommentStatus,
        search: Option<&str>,
    ) -> Result<Vec<ModerationRow>> {
        let mut select = comments::Entity::find().filter(comments::Column::Status.eq(status));
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(contains_literal::<comments::Entity>(
                comments::Column::Content,
                search,
            ));
        }

        let rows = select
            .order_by_desc(comments::Column::CreatedAt)
            .order_by_desc(comments::Column::Id)
            .all(&self.db)
            .await?;
        self.moderation_rows(rows).await
    }

    async fn moderation_queue(&self) -> Result<Vec<ModerationRow>> {
        let rows = comments::Entity::find()
            .filter(comments::Column::Status.eq(CommentStatus::Pending))
            .order_by_asc(comments::Column::CreatedAt)
            .order_by_asc(comments::Column::Id)
            .limit(MODERATION_QUEUE_LIMIT)
            .all(&self.db)
            .await?;
        self.moderation_rows(rows).await
    }

    async fn maintenance(&self) -> Result<()> {
        let backend = self.db.get_database_backend();
        let sql = match backend {
            DbBackend::Postgres => "VACUUM ANALYZE",
            DbBackend::Sqlite => "VACUUM",
            DbBackend::MySql => "ANALYZE TABLE articles, comments",
        };
        self.db
            .execute(Statement::from_string(backend, sql.to_owned()))
            .await?;
        log::info!("Database maintenance finished ({})", sql);
        Ok(())
    }
}
