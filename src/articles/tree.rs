//! Two-level comment tree assembly.
//!
//! Top-level comments are newest first, replies oldest first. Only approved
//! comments appear, and a reply to a reply is never attached anywhere, so
//! the tree is at most two levels deep whatever the input holds.

use super::view::{AuthorView, CommentNode};
use crate::orm::comments::{self, CommentStatus};
use crate::orm::users;
use std::collections::HashMap;

fn node(
    comment: comments::Model,
    article_author_id: &str,
    authors: &HashMap<String, users::Model>,
) -> CommentNode {
    let author = AuthorView::from_user(authors.get(&comment.author_id));
    CommentNode {
        is_author: comment.author_id == article_author_id,
        id: comment.id,
        content: comment.content,
        article_id: comment.article_id,
        parent_id: comment.parent_id,
        status: comment.status,
        likes: comment.likes,
        dislikes: comment.dislikes,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        author,
        replies: Vec::new(),
    }
}

/// Build the public comment forest of one article.
pub fn build_forest(
    article_author_id: &str,
    comments: Vec<comments::Model>,
    authors: &HashMap<String, users::Model>,
) -> Vec<CommentNode> {
    let (mut top, replies): (Vec<_>, Vec<_>) = comments
        .into_iter()
        .filter(|c| c.status == CommentStatus::Approved)
        .partition(|c| c.parent_id.is_none());

    top.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let mut by_parent: HashMap<i32, Vec<comments::Model>> = HashMap::new();
    for reply in replies {
        if let Some(parent) = reply.parent_id {
            by_parent.entry(parent).or_default().push(reply);
        }
    }

    top.into_iter()
        .map(|comment| {
            let mut children = by_parent.remove(&comment.id).unwrap_or_default();
            children.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

            let mut parent = node(comment, article_author_id, authors);
            parent.replies = children
                .into_iter()
                .map(|c| node(c, article_author_id, authors))
                .collect();
            parent
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, minute, 0)
            .unwrap()
    }

    fn comment(id: i32, parent: Option<i32>, minute: u32, status: CommentStatus) -> comments::Model {
        comments::Model {
            id,
            content: format!("comment {}", id),
            article_id: 1,
            author_id: if id % 2 == 0 { "writer".into() } else { "reader".into() },
            parent_id: parent,
            status,
            likes: 0,
            dislikes: 0,
            created_at: at(minute),
            updated_at: at(minute),
        }
    }

    #[test]
    fn test_ordering_and_depth() {
        use CommentStatus::*;
        let input = vec![
            comment(1, None, 1, Approved),
            comment(2, None, 5, Approved),
            comment(3, Some(1), 9, Approved),
            comment(4, Some(1), 3, Approved),
            comment(5, Some(3), 10, Approved),
        ];

        let forest = build_forest("writer", input, &HashMap::new());

        let top: Vec<i32> = forest.iter().map(|n| n.id).collect();
        assert_eq!(top, vec![2, 1]);

        let replies: Vec<i32> = forest[1].replies.iter().map(|n| n.id).collect();
        assert_eq!(replies, vec![4, 3]);

        // Grandchild 5 is dropped.
        assert!(forest.iter().all(|n| n.replies.iter().all(|r| r.replies.is_empty())));
        let total: usize = forest.iter().map(|n| 1 + n.replies.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_only_approved_are_shown() {
        use CommentStatus::*;
        let input = vec![
            comment(1, None, 1, Approved),
            comment(2, None, 2, Pending),
            comment(3, Some(1), 3, Rejected),
            comment(4, Some(2), 4, Approved),
            comment(6, Some(1), 5, Flagged),
        ];

        let forest = build_forest("writer", input, &HashMap::new());
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id, 1);
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn test_is_author_and_unknown_author() {
        let input = vec![
            comment(1, None, 1, CommentStatus::Approved),
            comment(2, None, 2, CommentStatus::Approved),
        ];
        let forest = build_forest("writer", input, &HashMap::new());

        let by_writer = forest.iter().find(|n| n.id == 2).unwrap();
        assert!(by_writer.is_author);
        let by_reader = forest.iter().find(|n| n.id == 1).unwrap();
        assert!(!by_reader.is_author);
        assert_eq!(by_reader.author.name, "Unknown");
    }
}
