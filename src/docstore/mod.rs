//! Embedded document store.
//!
//! Each collection is a concurrent map of documents. Membership (who liked an
//! article, who disliked or reported a comment, what a user bookmarked) is an
//! array of ids inside the owning document, so any toggle is a single
//! document update made while holding that document's lock.
//!
//! When opened with a path the store loads a JSON snapshot on startup and
//! rewrites it after every mutation.

pub mod repository;

pub use repository::DocumentRepository;

use crate::orm::articles::{self, ArticleStatus};
use crate::orm::comments::{self, CommentStatus};
use crate::orm::{categories, users};
use chrono::NaiveDateTime;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDoc {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub image: String,
    pub author_id: String,
    pub category_id: i32,
    pub status: ArticleStatus,
    pub is_breaking: bool,
    pub view_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    /// Tag names, embedded.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ids of users who like the article.
    #[serde(default)]
    pub likes: Vec<String>,
}

impl ArticleDoc {
    pub fn record(&self) -> articles::Model {
        articles::Model {
            id: self.id,
            title: self.title.clone(),
            slug: self.slug.clone(),
            excerpt: self.excerpt.clone(),
            content: self.content.clone(),
            image: self.image.clone(),
            author_id: self.author_id.clone(),
            category_id: self.category_id,
            status: self.status,
            is_breaking: self.is_breaking,
            view_count: self.view_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDoc {
    pub user_id: String,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDoc {
    pub id: i32,
    pub article_id: i32,
    pub author_id: String,
    pub content: String,
    pub parent_id: Option<i32>,
    pub status: CommentStatus,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    #[serde(default)]
    pub reports: Vec<ReportDoc>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CommentDoc {
    /// Counters are the array lengths.
    pub fn record(&self) -> comments::Model {
        comments::Model {
            id: self.id,
            content: self.content.clone(),
            article_id: self.article_id,
            author_id: self.author_id.clone(),
            parent_id: self.parent_id,
            status: self.status,
            likes: self.likes.len() as i32,
            dislikes: self.dislikes.len() as i32,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkDoc {
    pub article_id: i32,
    pub created_at: NaiveDateTime,
}

/// Mirror of a user's display data plus their bookmarks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    pub profile: users::Model,
    #[serde(default)]
    pub bookmarks: Vec<BookmarkDoc>,
}

impl UserDoc {
    /// Stand-in for a user seen before their profile was mirrored.
    pub fn placeholder(id: &str, now: NaiveDateTime) -> Self {
        Self {
            profile: users::Model {
                id: id.to_owned(),
                email: None,
                first_name: None,
                last_name: None,
                profile_image_url: None,
                username: None,
                bio: None,
                role: users::Role::User,
                created_at: now,
                updated_at: now,
            },
            bookmarks: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDoc {
    pub article_id: i32,
    pub user_id: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snapshot {
    next_id: i32,
    categories: Vec<categories::Model>,
    articles: Vec<ArticleDoc>,
    comments: Vec<CommentDoc>,
    users: Vec<UserDoc>,
    views: Vec<ViewDoc>,
}

pub struct DocumentStore {
    pub(crate) categories: DashMap<i32, categories::Model>,
    pub(crate) articles: DashMap<i32, ArticleDoc>,
    pub(crate) comments: DashMap<i32, CommentDoc>,
    pub(crate) users: DashMap<String, UserDoc>,
    pub(crate) views: Mutex<Vec<ViewDoc>>,
    next_id: AtomicI32,
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::from_snapshot(Snapshot::default(), None)
    }

    /// Open a store persisted at `path`, loading the snapshot if one exists.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        } else {
            Snapshot::default()
        };

        let store = Self::from_snapshot(snapshot, Some(path.clone()));
        log::info!(
            "Document store opened at {} with {} articles and {} comments",
            path.display(),
            store.articles.len(),
            store.comments.len()
        );
        Ok(store)
    }

    fn from_snapshot(snapshot: Snapshot, path: Option<PathBuf>) -> Self {
        // Recover the id counter from the data if the snapshot lost it.
        let highest = snapshot
            .articles
            .iter()
            .map(|a| a.id)
            .chain(snapshot.comments.iter().map(|c| c.id))
            .chain(snapshot.categories.iter().map(|c| c.id))
            .max()
            .unwrap_or(0);

        Self {
            categories: snapshot.categories.into_iter().map(|c| (c.id, c)).collect(),
            articles: snapshot.articles.into_iter().map(|a| (a.id, a)).collect(),
            comments: snapshot.comments.into_iter().map(|c| (c.id, c)).collect(),
            users: snapshot
                .users
                .into_iter()
                .map(|u| (u.profile.id.clone(), u))
                .collect(),
            views: Mutex::new(snapshot.views),
            next_id: AtomicI32::new(snapshot.next_id.max(highest)),
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Allocate a document id. Ids are unique across collections.
    pub fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            next_id: self.next_id.load(Ordering::SeqCst),
            categories: self.categories.iter().map(|e| e.value().clone()).collect(),
            articles: self.articles.iter().map(|e| e.value().clone()).collect(),
            comments: self.comments.iter().map(|e| e.value().clone()).collect(),
            users: self.users.iter().map(|e| e.value().clone()).collect(),
            views: self.views.lock().map(|v| v.clone()).unwrap_or_default(),
        };
        snapshot.categories.sort_by_key(|c| c.id);
        snapshot.articles.sort_by_key(|a| a.id);
        snapshot.comments.sort_by_key(|c| c.id);
        snapshot.users.sort_by(|a, b| a.profile.id.cmp(&b.profile.id));
        snapshot
    }

    /// Whether mutations are written to a snapshot file.
    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    /// Write the snapshot to disk. A no-op for in-memory stores. Blocks on
    /// file I/O; async callers run it through `web::block`.
    pub fn flush(&self) -> io::Result<()> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "snapshot lock poisoned"))?;

        let json = serde_json::to_string(&self.snapshot())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(id: i32) -> categories::Model {
        let now = Utc::now().naive_utc();
        categories::Model {
            id,
            name: "World".into(),
            slug: "world".into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let store = DocumentStore::in_memory();
        let a = store.next_id();
        let b = store.next_id();
        assert!(b > a);
    }

    #[test]
    fn test_snapshot_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");

        let store = DocumentStore::open(&path).unwrap();
        let id = store.next_id();
        store.categories.insert(id, category(id));
        store.flush().unwrap();

        let reopened = DocumentStore::open(&path).unwrap();
        assert_eq!(reopened.categories.len(), 1);
        assert_eq!(reopened.categories.get(&id).unwrap().slug, "world");
        // The counter resumes past existing ids.
        assert!(reopened.next_id() > id);
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(DocumentStore::open(&path).is_err());
    }
}
