pub mod account;
pub mod admin;
pub mod articles;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod live;

use crate::articles::page::page_number;
use crate::articles::ArticleRepository;
use crate::error::Error;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The content store chosen at startup.
pub type Repo = web::Data<Arc<dyn ArticleRepository>>;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut web::ServiceConfig) {
    // Malformed bodies and queries answer like every other error.
    conf.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| Error::validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| Error::validation(err.to_string()).into()),
    );

    // Descending order. Order is important.
    // Route resolution will stop at the first match.
    auth::configure(conf);
    categories::configure(conf);
    articles::configure(conf);
    comments::configure(conf);
    account::configure(conf);
    admin::configure(conf);
    live::configure(conf);
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Requested page, 1 when missing or unparsable.
    pub fn page(&self) -> u64 {
        page_number(self.page.as_deref())
    }
}

#[derive(Serialize)]
struct Success {
    success: bool,
}

/// `{"success": true}`
pub fn success() -> HttpResponse {
    HttpResponse::Ok().json(Success { success: true })
}
