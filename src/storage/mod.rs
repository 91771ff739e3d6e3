//! Content storage backend selection.
//!
//! Supports two backends:
//! - `relational`: the SeaORM tables
//! - `document`: the embedded document store, optionally snapshotted to disk

use crate::app_config::{Backend, StorageConfig};
use crate::articles::{ArticleRepository, Limits, SqlRepository};
use crate::docstore::{DocumentRepository, DocumentStore};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Build the configured content repository.
pub fn open(
    config: &StorageConfig,
    limits: Limits,
    db: &DatabaseConnection,
) -> std::io::Result<Arc<dyn ArticleRepository>> {
    match config.backend {
        Backend::Relational => {
            log::info!("Serving content from the relational store");
            Ok(Arc::new(SqlRepository::new(db.clone(), limits)))
        }
        Backend::Document => {
            let store = if config.document_path.trim().is_empty() {
                log::warn!("No document_path configured; document store is in memory only");
                DocumentStore::in_memory()
            } else {
                DocumentStore::open(&config.document_path)?
            };
            Ok(Arc::new(DocumentRepository::new(Arc::new(store), limits)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_document_backend_in_memory() {
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        let config = StorageConfig {
            backend: Backend::Document,
            document_path: String::new(),
        };
        let repo = open(&config, Limits::default(), &db).unwrap();
        assert!(repo.categories().await.unwrap().is_empty());
    }
}
