//! Comment thread, voting and moderation tests, run against both stores

mod common;
use serial_test::serial;

use common::fixtures::*;
use newsroom::articles::moderation::ModerationAction;
use newsroom::articles::NewComment;
use newsroom::error::Error;
use newsroom::orm::comments::CommentStatus;
use newsroom::orm::users::Role;

#[actix_rt::test]
#[serial]
async fn test_comment_tree_shape() {
    on_each_backend(|db, repo| async move {
        let admin = create_test_user(&db, &*repo, "editor", Role::Admin).await.unwrap();
        let reader = create_test_user(&db, &*repo, "reader", Role::User).await.unwrap();
        let world = create_test_category(&*repo, "World").await;
        let article = create_test_article(&*repo, &admin.id, "Discussion welcome", world.id).await;

        let older = create_test_comment(&*repo, article.id, &reader.id, "Older thread", None).await;
        let newer = create_test_comment(&*repo, article.id, &reader.id, "Newer thread", None).await;
        let first_reply =
            create_test_comment(&*repo, article.id, &admin.id, "Author answers", Some(older.id)).await;
        create_test_comment(&*repo, article.id, &reader.id, "Thanks!", Some(older.id)).await;
        // Too deep to be shown.
        create_test_comment(&*repo, article.id, &reader.id, "Deep", Some(first_reply.id)).await;
        repo.create_comment(
            article.id,
            &reader.id,
            NewComment {
                content: "Awaiting review".into(),
                parent_id: None,
                status: CommentStatus::Pending,
            },
        )
        .await
        .unwrap();

        let tree = repo.article_comments(article.id).await.unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, newer.id);
        assert_eq!(tree[1].id, older.id);

        let replies = &tree[1].replies;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].content, "Author answers");
        assert!(replies[0].is_author);
        assert!(!tree[1].is_author);
        assert!(replies.iter().all(|r| r.replies.is_empty()));

        // Approved comments only.
        let view = repo.article(article.id, None).await.unwrap().unwrap();
        assert_eq!(view.comments_count, 5);
        assert_eq!(view.comments.len(), 2);

        let err = repo.article_comments(4040).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    })
    .await;
}

#[actix_rt::test]
#[serial]
async fn test_reply_parent_must_match_article() {
    on_each_backend(|db, repo| async move {
        let admin = create_test_user(&db, &*repo, "editor", Role::Admin).await.unwrap();
        let world = create_test_category(&*repo, "World").await;
        let one = create_test_article(&*repo, &admin.id, "The first article", world.id).await;
        let two = create_test_article(&*repo, &admin.id, "The second article", world.id).await;
        let on_one = create_test_comment(&*repo, one.id, &admin.id, "On the first", None).await;

        let reply = |article_id: i32, parent_id: i32| {
            let repo = repo.clone();
            let author = admin.id.clone();
            async move {
                repo.create_comment(
                    article_id,
                    &author,
                    NewComment {
                        content: "Reply".into(),
                        parent_id: Some(parent_id),
                        status: CommentStatus::Approved,
                    },
                )
                .await
            }
        };

        let err = reply(two.id, on_one.id).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = reply(one.id, 9999).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(reply(one.id, on_one.id).await.is_ok());
    })
    .await;
}

#[actix_rt::test]
#[serial]
async fn test_votes_are_exclusive() {
    on_each_backend(|db, repo| async move {
        let admin = create_test_user(&db, &*repo, "editor", Role::Admin).await.unwrap();
        let reader = create_test_user(&db, &*repo, "reader", Role::User).await.unwrap();
        let world = create_test_category(&*repo, "World").await;
        let article = create_test_article(&*repo, &admin.id, "Vote on the replies", world.id).await;
        let comment = create_test_comment(&*repo, article.id, &admin.id, "Agree?", None).await;

        let votes = repo.toggle_comment_like(comment.id, &reader.id).await.unwrap();
        assert_eq!((votes.likes, votes.dislikes), (1, 0));
        assert!(votes.liked && !votes.disliked);

        let votes = repo.toggle_comment_dislike(comment.id, &reader.id).await.unwrap();
        assert_eq!((votes.likes, votes.dislikes), (0, 1));
        assert!(!votes.liked && votes.disliked);

        let votes = repo.toggle_comment_dislike(comment.id, &reader.id).await.unwrap();
        assert_eq!((votes.likes, votes.dislikes), (0, 0));

        repo.toggle_comment_like(comment.id, &reader.id).await.unwrap();
        let votes = repo.toggle_comment_like(comment.id, &admin.id).await.unwrap();
        assert_eq!(votes.likes, 2);

        let tree = repo.article_comments(article.id).await.unwrap();
        assert_eq!(tree[0].likes, 2);

        let err = repo.toggle_comment_like(5050, &reader.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    })
    .await;
}

#[actix_rt::test]
#[serial]
async fn test_third_distinct_report_flags() {
    on_each_backend(|db, repo| async move {
        let admin = create_test_user(&db, &*repo, "editor", Role::Admin).await.unwrap();
        let world = create_test_category(&*repo, "World").await;
        let article = create_test_article(&*repo, &admin.id, "Heated debate below", world.id).await;
        let comment = create_test_comment(&*repo, article.id, &admin.id, "Hot take", None).await;

        let mut reporters = Vec::new();
        for name in ["ann", "bob", "cat"] {
            reporters.push(create_test_user(&db, &*repo, name, Role::User).await.unwrap());
        }

        let first = repo
            .report_comment(comment.id, &reporters[0].id, Some("spam".into()))
            .await
            .unwrap();
        assert!(first.reported);
        assert_eq!(first.reports, 1);
        assert_eq!(first.status, CommentStatus::Approved);

        // The same reader reporting again is not counted.
        let repeat = repo.report_comment(comment.id, &reporters[0].id, None).await.unwrap();
        assert!(!repeat.reported);
        assert_eq!(repeat.reports, 1);

        repo.report_comment(comment.id, &reporters[1].id, None).await.unwrap();
        let third = repo.report_comment(comment.id, &reporters[2].id, None).await.unwrap();
        assert_eq!(third.reports, 3);
        assert_eq!(third.status, CommentStatus::Flagged);

        let flagged = repo.comments_by_status(CommentStatus::Flagged, None).await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].comment.id, comment.id);
        assert_eq!(flagged[0].article.as_ref().unwrap().title, "Heated debate below");

        // Flagged comments leave the public thread.
        assert!(repo.article_comments(article.id).await.unwrap().is_empty());
    })
    .await;
}

#[actix_rt::test]
#[serial]
async fn test_reapproved_comment_flags_on_next_report() {
    on_each_backend(|db, repo| async move {
        let admin = create_test_user(&db, &*repo, "editor", Role::Admin).await.unwrap();
        let world = create_test_category(&*repo, "World").await;
        let article = create_test_article(&*repo, &admin.id, "Debate continues below", world.id).await;
        let comment = create_test_comment(&*repo, article.id, &admin.id, "Contested", None).await;

        for name in ["ann", "bob", "cat"] {
            let reader = create_test_user(&db, &*repo, name, Role::User).await.unwrap();
            repo.report_comment(comment.id, &reader.id, None).await.unwrap();
        }
        let restored = repo.moderate_comment(comment.id, ModerationAction::Approve).await.unwrap();
        assert_eq!(restored.status, CommentStatus::Approved);

        let fourth = create_test_user(&db, &*repo, "dan", Role::User).await.unwrap();
        let state = repo.report_comment(comment.id, &fourth.id, None).await.unwrap();
        assert_eq!(state.reports, 4);
        assert_eq!(state.status, CommentStatus::Flagged);

        // Rejected comments are never flagged by reports.
        repo.moderate_comment(comment.id, ModerationAction::Reject).await.unwrap();
        let fifth = create_test_user(&db, &*repo, "eve", Role::User).await.unwrap();
        let state = repo.report_comment(comment.id, &fifth.id, None).await.unwrap();
        assert_eq!(state.status, CommentStatus::Rejected);
    })
    .await;
}

#[actix_rt::test]
#[serial]
async fn test_reject_cascades_to_direct_replies() {
    on_each_backend(|db, repo| async move {
        let admin = create_test_user(&db, &*repo, "editor", Role::Admin).await.unwrap();
        let reader = create_test_user(&db, &*repo, "reader", Role::User).await.unwrap();
        let world = create_test_category(&*repo, "World").await;
        let article = create_test_article(&*repo, &admin.id, "Moderated thread", world.id).await;

        let root = create_test_comment(&*repo, article.id, &reader.id, "Rude remark", None).await;
        let reply = create_test_comment(&*repo, article.id, &admin.id, "Please stop", Some(root.id)).await;
        let nested = create_test_comment(&*repo, article.id, &reader.id, "No", Some(reply.id)).await;

        let rejected = repo.moderate_comment(root.id, ModerationAction::Reject).await.unwrap();
        assert_eq!(rejected.status, CommentStatus::Rejected);

        let rows = repo.comments_by_status(CommentStatus::Rejected, None).await.unwrap();
        let mut ids: Vec<i32> = rows.iter().map(|r| r.comment.id).collect();
        ids.sort();
        assert_eq!(ids, vec![root.id, reply.id]);

        let approved = repo.comments_by_status(CommentStatus::Approved, None).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].comment.id, nested.id);

        let restored = repo.moderate_comment(root.id, ModerationAction::Approve).await.unwrap();
        assert_eq!(restored.status, CommentStatus::Approved);

        let err = repo.moderate_comment(8080, ModerationAction::Flag).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    })
    .await;
}

#[actix_rt::test]
#[serial]
async fn test_moderation_queue_oldest_pending_first() {
    on_each_backend(|db, repo| async move {
        let admin = create_test_user(&db, &*repo, "editor", Role::Admin).await.unwrap();
        let world = create_test_category(&*repo, "World").await;
        let article = create_test_article(&*repo, &admin.id, "Queue up the comments", world.id).await;

        let mut pending = Vec::new();
        for n in 0..6 {
            let comment = repo
                .create_comment(
                    article.id,
                    &admin.id,
                    NewComment {
                        content: format!("Pending number {}", n),
                        parent_id: None,
                        status: CommentStatus::Pending,
                    },
                )
                .await
                .unwrap();
            pending.push(comment.id);
        }

        let queue = repo.moderation_queue().await.unwrap();
        assert_eq!(queue.len(), 5);
        assert_eq!(queue[0].comment.id, pending[0]);

        let searched = repo
            .comments_by_status(CommentStatus::Pending, Some("number 3"))
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].author.id, admin.id);
    })
    .await;
}

#[actix_rt::test]
#[serial]
async fn test_edit_and_delete_ownership() {
    on_each_backend(|db, repo| async move {
        let admin = create_test_user(&db, &*repo, "editor", Role::Admin).await.unwrap();
        let reader = create_test_user(&db, &*repo, "reader", Role::User).await.unwrap();
        let other = create_test_user(&db, &*repo, "other", Role::User).await.unwrap();
        let world = create_test_category(&*repo, "World").await;
        let article = create_test_article(&*repo, &admin.id, "Edits and removals", world.id).await;

        let mine = create_test_comment(&*repo, article.id, &reader.id, "Typo here", None).await;
        let edited = repo
            .update_comment(mine.id, &reader.id, "Typo fixed".into())
            .await
            .unwrap();
        assert_eq!(edited.content, "Typo fixed");

        let err = repo
            .update_comment(mine.id, &other.id, "Hijacked".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = repo.delete_comment(mine.id, &other.id, false).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let reply = create_test_comment(&*repo, article.id, &other.id, "Reply", Some(mine.id)).await;
        repo.toggle_comment_like(reply.id, &admin.id).await.unwrap();

        // Moderators may remove anyone's comment, replies go with it.
        let removed = repo.delete_comment(mine.id, &admin.id, true).await.unwrap();
        assert_eq!(removed.id, mine.id);
        assert!(repo.article_comments(article.id).await.unwrap().is_empty());

        let err = repo.toggle_comment_like(reply.id, &admin.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = repo.delete_comment(mine.id, &reader.id, false).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    })
    .await;
}
