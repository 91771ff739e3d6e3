//! ChangeFeed actor: article id -> open websocket subscribers.

use super::message::{ArticleChanged, Connect, Disconnect, Push, Unwatch, Watch};
use actix::prelude::*;
use std::collections::{HashMap, HashSet};

pub struct ChangeFeed {
    connections: HashMap<usize, Recipient<Push>>,
    /// Article ID -> connection IDs
    watchers: HashMap<i32, HashSet<usize>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        log::info!("ChangeFeed starting up.");
        Self {
            connections: HashMap::new(),
            watchers: HashMap::new(),
        }
    }

    fn unwatch(&mut self, id: usize, article_id: i32) {
        if let Some(ids) = self.watchers.get_mut(&article_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.watchers.remove(&article_id);
            }
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for ChangeFeed {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.set_mailbox_capacity(256);
    }
}

impl Handler<Connect> for ChangeFeed {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        self.connections.insert(msg.id, msg.addr);
        for article_id in msg.articles {
            self.watchers.entry(article_id).or_default().insert(msg.id);
        }
        log::debug!(
            "Live connection {} joined ({} open, {} articles watched)",
            msg.id,
            self.connections.len(),
            self.watchers.len()
        );
    }
}

impl Handler<Disconnect> for ChangeFeed {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        if self.connections.remove(&msg.id).is_none() {
            return;
        }
        self.watchers.retain(|_, ids| {
            ids.remove(&msg.id);
            !ids.is_empty()
        });
        log::debug!(
            "Live connection {} left ({} open)",
            msg.id,
            self.connections.len()
        );
    }
}

impl Handler<Watch> for ChangeFeed {
    type Result = ();

    fn handle(&mut self, msg: Watch, _: &mut Context<Self>) {
        if self.connections.contains_key(&msg.id) {
            self.watchers.entry(msg.article_id).or_default().insert(msg.id);
        }
    }
}

impl Handler<Unwatch> for ChangeFeed {
    type Result = ();

    fn handle(&mut self, msg: Unwatch, _: &mut Context<Self>) {
        self.unwatch(msg.id, msg.article_id);
    }
}

impl Handler<ArticleChanged> for ChangeFeed {
    type Result = ();

    fn handle(&mut self, msg: ArticleChanged, _: &mut Context<Self>) {
        let ids = match self.watchers.get(&msg.article_id) {
            Some(ids) => ids,
            None => return,
        };

        let frame = serde_json::json!({
            "type": "articleChanged",
            "articleId": msg.article_id,
            "kind": msg.kind,
        })
        .to_string();
        for recipient in ids.iter().filter_map(|id| self.connections.get(id)) {
            recipient.do_send(Push(frame.clone()));
        }
    }
}

impl Supervised for ChangeFeed {
    fn restarting(&mut self, _: &mut Context<ChangeFeed>) {
        log::warn!("Restarting the ChangeFeed.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::live::ChangeKind;
    use std::sync::{Arc, Mutex};

    struct Sink(Arc<Mutex<Vec<String>>>);

    impl Actor for Sink {
        type Context = Context<Self>;
    }

    impl Handler<Push> for Sink {
        type Result = ();

        fn handle(&mut self, msg: Push, _: &mut Context<Self>) {
            self.0.lock().unwrap().push(msg.0);
        }
    }

    fn changed(article_id: i32) -> ArticleChanged {
        ArticleChanged {
            article_id,
            kind: ChangeKind::Comments,
        }
    }

    #[actix_rt::test]
    async fn test_changes_follow_watch_lists() {
        let feed = ChangeFeed::new().start();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let a = Sink(first.clone()).start();
        let b = Sink(second.clone()).start();

        feed.send(Connect {
            id: 1,
            addr: a.clone().recipient(),
            articles: vec![1],
        })
        .await
        .unwrap();
        feed.send(Connect {
            id: 2,
            addr: b.clone().recipient(),
            articles: vec![2],
        })
        .await
        .unwrap();
        feed.send(Watch { id: 1, article_id: 2 }).await.unwrap();
        feed.send(changed(2)).await.unwrap();

        feed.send(Unwatch { id: 1, article_id: 2 }).await.unwrap();
        feed.send(Disconnect { id: 2 }).await.unwrap();
        // Nobody watches article 2 any more.
        feed.send(changed(2)).await.unwrap();
        feed.send(changed(1)).await.unwrap();
        // Unknown connections cannot watch.
        feed.send(Watch { id: 9, article_id: 1 }).await.unwrap();

        // Queued behind any earlier push.
        a.send(Push("end".into())).await.unwrap();
        b.send(Push("end".into())).await.unwrap();

        let first = first.lock().unwrap();
        assert_eq!(first.len(), 3);
        assert!(first[0].contains(r#""articleId":2"#));
        assert!(first[1].contains(r#""articleId":1"#));
        assert!(first[1].contains(r#""kind":"comments""#));

        let second = second.lock().unwrap();
        assert_eq!(second.len(), 2);
        assert!(second[0].contains(r#""articleId":2"#));
        assert_eq!(second[1], "end");
    }
}
