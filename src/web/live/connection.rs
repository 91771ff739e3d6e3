//! One websocket client of the change feed.
//!
//! A socket starts out watching the article in its URL. It can add or drop
//! articles with `{"action":"watch","articleId":7}` and
//! `{"action":"unwatch","articleId":7}`; every command is answered with
//! `{"type":"watching","articleIds":[..]}`.

use super::message::{ClientCommand, Connect, Disconnect, Push, Unwatch, Watch};
use super::server::ChangeFeed;
use super::{CLIENT_TIMEOUT, HEARTBEAT_INTERVAL};
use actix::prelude::*;
use actix_web_actors::ws;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

static NEXT_CONNECTION: AtomicUsize = AtomicUsize::new(1);

pub struct LiveConnection {
    id: usize,
    watching: BTreeSet<i32>,
    last_seen: Instant,
    feed: Addr<ChangeFeed>,
}

impl LiveConnection {
    pub fn new(article_id: i32, feed: Addr<ChangeFeed>) -> Self {
        Self {
            id: NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed),
            watching: BTreeSet::from([article_id]),
            last_seen: Instant::now(),
            feed,
        }
    }

    /// Apply a client command, returning the reply frame.
    fn command(&mut self, text: &str) -> String {
        match serde_json::from_str::<ClientCommand>(text) {
            Ok(ClientCommand::Watch { article_id }) => {
                if self.watching.insert(article_id) {
                    self.feed.do_send(Watch {
                        id: self.id,
                        article_id,
                    });
                }
            }
            Ok(ClientCommand::Unwatch { article_id }) => {
                if self.watching.remove(&article_id) {
                    self.feed.do_send(Unwatch {
                        id: self.id,
                        article_id,
                    });
                }
            }
            Err(_) => {
                return serde_json::json!({
                    "type": "error",
                    "message": "Unknown command",
                })
                .to_string()
            }
        }

        serde_json::json!({
            "type": "watching",
            "articleIds": self.watching,
        })
        .to_string()
    }
}

impl Actor for LiveConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.feed.do_send(Connect {
            id: self.id,
            addr: ctx.address().recipient(),
            articles: self.watching.iter().copied().collect(),
        });

        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if act.last_seen.elapsed() > CLIENT_TIMEOUT {
                log::debug!("Live connection {} went quiet, closing", act.id);
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        self.feed.do_send(Disconnect { id: self.id });
    }
}

impl Handler<Push> for LiveConnection {
    type Result = ();

    fn handle(&mut self, msg: Push, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for LiveConnection {
    fn handle(&mut self, item: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match item {
            Ok(msg) => msg,
            Err(e) => {
                log::debug!("Live connection {} protocol error: {}", self.id, e);
                ctx.stop();
                return;
            }
        };
        self.last_seen = Instant::now();

        match msg {
            ws::Message::Ping(data) => ctx.pong(&data),
            ws::Message::Text(text) => {
                let reply = self.command(text.trim());
                ctx.text(reply);
            }
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) => ctx.stop(),
            ws::Message::Pong(_) | ws::Message::Binary(_) | ws::Message::Nop => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_commands_track_watched_articles() {
        let feed = ChangeFeed::new().start();
        let mut conn = LiveConnection::new(4, feed);

        let reply = conn.command(r#"{"action":"watch","articleId":9}"#);
        assert!(reply.contains(r#""type":"watching""#));
        assert!(reply.contains(r#""articleIds":[4,9]"#));

        let reply = conn.command(r#"{"action":"unwatch","articleId":4}"#);
        assert!(reply.contains(r#""articleIds":[9]"#));

        let reply = conn.command("hello");
        assert!(reply.contains(r#""type":"error""#));
        assert_eq!(conn.watching, BTreeSet::from([9]));
    }
}
