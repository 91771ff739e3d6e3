//! Article aggregation layer: view models, comment trees, pagination,
//! dashboard metrics and the `ArticleRepository` seam with its relational
//! implementation.

pub mod metrics;
pub mod moderation;
pub mod page;
pub mod repository;
pub mod sql;
pub mod tree;
pub mod view;

pub use repository::{ArticleRepository, Limits, NewComment};
pub use sql::SqlRepository;
