//! Live article updates.
//!
//! A reader with an article open subscribes to `/api/live/articles/{id}`
//! and may watch further articles over the same socket (see
//! [`connection`]). Routes that change an article, its comments or its
//! likes publish an `ArticleChanged` event and every watcher gets
//! `{"type":"articleChanged","articleId":..,"kind":..}` so it can refetch.

pub mod connection;
pub mod message;
pub mod server;

use actix::Addr;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::time::Duration;

pub use message::{ArticleChanged, ChangeKind};
pub use server::ChangeFeed;

/// Heartbeat interval - send ping every 5 seconds
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Client timeout - disconnect if no response for 30 seconds
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    conf.service(live_article);
}

/// Tell every subscriber of `article_id` that it changed.
pub fn publish(feed: &Addr<ChangeFeed>, article_id: i32, kind: ChangeKind) {
    feed.do_send(ArticleChanged { article_id, kind });
}

#[get("/api/live/articles/{id:\\d+}")]
pub async fn live_article(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<i32>,
    feed: web::Data<Addr<ChangeFeed>>,
) -> Result<HttpResponse, Error> {
    let connection = connection::LiveConnection::new(path.into_inner(), feed.get_ref().clone());
    ws::start(connection, &req, stream)
}
