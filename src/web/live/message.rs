//! Message types for the article change feed

use actix::prelude::*;
use serde::{Deserialize, Serialize};

/// A socket joined the feed, watching `articles`.
pub struct Connect {
    pub id: usize,
    pub addr: Recipient<Push>,
    pub articles: Vec<i32>,
}

impl Message for Connect {
    type Result = ();
}

pub struct Disconnect {
    pub id: usize,
}

impl Message for Disconnect {
    type Result = ();
}

/// Start sending `article_id` changes to connection `id`.
pub struct Watch {
    pub id: usize,
    pub article_id: i32,
}

impl Message for Watch {
    type Result = ();
}

pub struct Unwatch {
    pub id: usize,
    pub article_id: i32,
}

impl Message for Unwatch {
    type Result = ();
}

/// What changed about an article.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Updated,
    Deleted,
    Comments,
    Likes,
}

/// Published by the routes after a successful write
#[derive(Clone, Debug)]
pub struct ArticleChanged {
    pub article_id: i32,
    pub kind: ChangeKind,
}

impl Message for ArticleChanged {
    type Result = ();
}

/// Text frame for one socket.
pub struct Push(pub String);

impl Message for Push {
    type Result = ();
}

/// Text frames a client may send.
#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientCommand {
    Watch {
        #[serde(rename = "articleId")]
        article_id: i32,
    },
    Unwatch {
        #[serde(rename = "articleId")]
        article_id: i32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_commands() {
        let watch: ClientCommand =
            serde_json::from_str(r#"{"action":"watch","articleId":7}"#).unwrap();
        assert_eq!(watch, ClientCommand::Watch { article_id: 7 });

        let unwatch: ClientCommand =
            serde_json::from_str(r#"{"action":"unwatch","articleId":3}"#).unwrap();
        assert_eq!(unwatch, ClientCommand::Unwatch { article_id: 3 });

        assert!(serde_json::from_str::<ClientCommand>("ping").is_err());
        assert!(serde_json::from_str::<ClientCommand>(r#"{"action":"watch"}"#).is_err());
    }
}
