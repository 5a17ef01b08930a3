mod common;

use chorus::application::error::ErrorKind;
use chorus::application::posts::PostDraft;
use chorus::application::repos::{CommentsRepo, PageRequest, PostsRepo};
use chorus::cache::{CommentGrouping, EntityKind};
use uuid::Uuid;

use common::Harness;

async fn post_with_comments(harness: &Harness, count: usize) -> Uuid {
    let post = harness
        .posts
        .create_post(
            Uuid::new_v4(),
            PostDraft {
                title: "discussion".into(),
                body: String::new(),
                tags: Vec::new(),
            },
        )
        .await
        .expect("create post");
    for index in 0..count {
        harness
            .comments
            .create_comment(Uuid::new_v4(), post.id, None, &format!("comment {index}"))
            .await
            .expect("create comment");
    }
    post.id
}

async fn view_pages(harness: &Harness, post_id: Uuid, pages: i64) -> Vec<String> {
    let mut bodies = Vec::new();
    for page in 1..=pages {
        let listing = harness
            .comments
            .list_comments(post_id, Some(page), Some(2))
            .await
            .expect("list comments");
        bodies.extend(listing.items.into_iter().map(|comment| comment.body));
    }
    bodies
}

#[tokio::test]
async fn cached_pages_are_served_until_the_grouping_changes() {
    let harness = Harness::new();
    let post_id = post_with_comments(&harness, 5).await;

    let first = view_pages(&harness, post_id, 3).await;
    assert_eq!(
        first,
        vec!["comment 0", "comment 1", "comment 2", "comment 3", "comment 4"]
    );
    assert_eq!(harness.comment_store.listings(), 3);

    let again = view_pages(&harness, post_id, 3).await;
    assert_eq!(again, first);
    assert_eq!(harness.comment_store.listings(), 3);

    let grouping = CommentGrouping::Post(post_id);
    let page_keys: Vec<String> = (1..=3)
        .map(|page| grouping.page_key(PageRequest::new(page, 2).expect("page")))
        .collect();
    assert!(page_keys.iter().all(|key| harness.cache.contains_key(key)));

    harness
        .comments
        .create_comment(Uuid::new_v4(), post_id, None, "comment 5")
        .await
        .expect("create comment");

    assert!(!harness.cache.contains_key(&grouping.tracker_key()));
    assert!(page_keys.iter().all(|key| !harness.cache.contains_key(key)));

    let refreshed = view_pages(&harness, post_id, 3).await;
    assert_eq!(harness.comment_store.listings(), 6);
    assert_eq!(refreshed.last().map(String::as_str), Some("comment 5"));
}

#[tokio::test]
async fn writes_to_one_post_leave_other_groupings_cached() {
    let harness = Harness::new();
    let busy = post_with_comments(&harness, 3).await;
    let quiet = post_with_comments(&harness, 3).await;

    view_pages(&harness, busy, 2).await;
    view_pages(&harness, quiet, 2).await;
    assert_eq!(harness.comment_store.listings(), 4);

    harness
        .comments
        .create_comment(Uuid::new_v4(), busy, None, "more")
        .await
        .expect("create comment");

    view_pages(&harness, quiet, 2).await;
    assert_eq!(harness.comment_store.listings(), 4);
    view_pages(&harness, busy, 2).await;
    assert_eq!(harness.comment_store.listings(), 6);
}

#[tokio::test]
async fn editing_and_deleting_refresh_the_listing() {
    let harness = Harness::new();
    let post_id = post_with_comments(&harness, 2).await;
    let listing = harness
        .comments
        .list_comments(post_id, None, None)
        .await
        .expect("list comments");
    let target = listing.items[0].clone();
    let author = target.author_id.expect("authored comment");

    let err = harness
        .comments
        .update_comment(Uuid::new_v4(), target.id, "hijacked")
        .await
        .expect_err("foreign edit");
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    harness
        .comments
        .update_comment(author, target.id, "edited")
        .await
        .expect("own edit");
    let listing = harness
        .comments
        .list_comments(post_id, None, None)
        .await
        .expect("list comments");
    assert_eq!(listing.items[0].body, "edited");
    assert_eq!(
        harness
            .comments
            .get_comment(target.id)
            .await
            .expect("read comment")
            .body,
        "edited"
    );

    harness
        .comments
        .delete_comment(author, target.id)
        .await
        .expect("delete");
    let listing = harness
        .comments
        .list_comments(post_id, None, None)
        .await
        .expect("list comments");
    assert_eq!(listing.total, 1);
    assert_eq!(
        harness
            .comments
            .get_comment(target.id)
            .await
            .expect_err("deleted")
            .kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn background_tasks_maintain_comment_and_reply_counters() {
    let harness = Harness::new();
    let post_id = post_with_comments(&harness, 2).await;
    let parent = harness
        .comments
        .list_comments(post_id, None, None)
        .await
        .expect("list comments")
        .items[0]
        .clone();

    harness
        .comments
        .create_comment(Uuid::new_v4(), post_id, Some(parent.id), "reply")
        .await
        .expect("create reply");
    harness.tasks.drain().await;

    let post = harness
        .store
        .find_post(post_id)
        .await
        .expect("read post")
        .expect("post exists");
    assert_eq!(post.comment_count, 2);

    let parent = harness
        .store
        .find_comment(parent.id)
        .await
        .expect("read comment")
        .expect("comment exists");
    assert_eq!(parent.reply_count, 1);

    let replies = harness
        .comments
        .list_replies(parent.id, None, None)
        .await
        .expect("list replies");
    assert_eq!(replies.total, 1);
    assert_eq!(replies.items[0].body, "reply");
}

#[tokio::test]
async fn replies_must_stay_on_their_post() {
    let harness = Harness::new();
    let first = post_with_comments(&harness, 1).await;
    let second = post_with_comments(&harness, 0).await;
    let parent = harness
        .comments
        .list_comments(first, None, None)
        .await
        .expect("list comments")
        .items[0]
        .clone();

    let err = harness
        .comments
        .create_comment(Uuid::new_v4(), second, Some(parent.id), "stray")
        .await
        .expect_err("cross-post reply");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = harness
        .comments
        .create_comment(Uuid::new_v4(), Uuid::new_v4(), None, "orphan")
        .await
        .expect_err("missing post");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = harness
        .comments
        .create_comment(Uuid::new_v4(), first, None, "   ")
        .await
        .expect_err("blank body");
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn deleting_a_post_drops_its_cached_comment_pages() {
    let harness = Harness::new();
    let author = Uuid::new_v4();
    let post = harness
        .posts
        .create_post(
            author,
            PostDraft {
                title: "short lived".into(),
                body: String::new(),
                tags: Vec::new(),
            },
        )
        .await
        .expect("create post");
    harness
        .comments
        .create_comment(Uuid::new_v4(), post.id, None, "first")
        .await
        .expect("create comment");
    harness.tasks.drain().await;

    view_pages(&harness, post.id, 1).await;
    assert_eq!(harness.comment_store.listings(), 1);

    harness
        .posts
        .delete_post(author, post.id)
        .await
        .expect("delete post");

    let listing = harness
        .comments
        .list_comments(post.id, None, None)
        .await
        .expect("list comments");
    assert_eq!(harness.comment_store.listings(), 2);
    assert_eq!(listing.total, 0);
    assert_eq!(harness.store.comment_count(), 0);
}

#[tokio::test]
async fn deleting_an_account_anonymizes_cached_comments() {
    let harness = Harness::new();
    let user = harness
        .accounts
        .register("lin", "Lin", "lin@example.com")
        .await
        .expect("register");
    let post_id = post_with_comments(&harness, 0).await;
    harness
        .comments
        .create_comment(user.id, post_id, None, "signed")
        .await
        .expect("create comment");

    let before = harness
        .comments
        .list_comments(post_id, None, None)
        .await
        .expect("list comments");
    assert_eq!(before.items[0].author_id, Some(user.id));

    harness
        .accounts
        .delete_account(user.id)
        .await
        .expect("delete account");

    let after = harness
        .comments
        .list_comments(post_id, None, None)
        .await
        .expect("list comments");
    assert_eq!(after.items[0].author_id, None);
    assert_eq!(after.items[0].body, "signed");
    assert_eq!(
        harness
            .accounts
            .get_user(user.id)
            .await
            .expect_err("deleted user")
            .kind(),
        ErrorKind::NotFound
    );
}

async fn reply_pages(harness: &Harness, parent_id: Uuid, pages: i64) -> Vec<String> {
    let mut bodies = Vec::new();
    for page in 1..=pages {
        let listing = harness
            .comments
            .list_replies(parent_id, Some(page), Some(2))
            .await
            .expect("list replies");
        bodies.extend(listing.items.into_iter().map(|comment| comment.body));
    }
    bodies
}

#[tokio::test]
async fn reply_pages_are_invalidated_only_by_replies_to_their_parent() {
    let harness = Harness::new();
    let post_id = post_with_comments(&harness, 3).await;
    let parent = harness
        .comments
        .list_comments(post_id, None, None)
        .await
        .expect("list comments")
        .items[0]
        .clone();
    for index in 0..4 {
        harness
            .comments
            .create_comment(Uuid::new_v4(), post_id, Some(parent.id), &format!("reply {index}"))
            .await
            .expect("create reply");
    }

    let post_grouping = CommentGrouping::Post(post_id);
    let replies_grouping = CommentGrouping::Replies(parent.id);
    let post_keys: Vec<String> = (1..=2)
        .map(|page| post_grouping.page_key(PageRequest::new(page, 2).expect("page")))
        .collect();
    let reply_keys: Vec<String> = (1..=2)
        .map(|page| replies_grouping.page_key(PageRequest::new(page, 2).expect("page")))
        .collect();

    view_pages(&harness, post_id, 2).await;
    let before = harness.comment_store.listings();
    let replies = reply_pages(&harness, parent.id, 2).await;
    assert_eq!(replies, vec!["reply 0", "reply 1", "reply 2", "reply 3"]);
    assert_eq!(harness.comment_store.listings(), before + 2);
    assert!(reply_keys.iter().all(|key| harness.cache.contains_key(key)));

    reply_pages(&harness, parent.id, 2).await;
    assert_eq!(harness.comment_store.listings(), before + 2);

    harness
        .comments
        .create_comment(Uuid::new_v4(), post_id, Some(parent.id), "reply 4")
        .await
        .expect("create reply");

    assert!(!harness.cache.contains_key(&replies_grouping.tracker_key()));
    assert!(reply_keys.iter().all(|key| !harness.cache.contains_key(key)));
    assert!(post_keys.iter().all(|key| harness.cache.contains_key(key)));

    let refreshed = reply_pages(&harness, parent.id, 3).await;
    assert_eq!(refreshed.last().map(String::as_str), Some("reply 4"));
    assert_eq!(harness.comment_store.listings(), before + 5);

    harness
        .comments
        .create_comment(Uuid::new_v4(), post_id, None, "comment 3")
        .await
        .expect("create comment");

    assert!(post_keys.iter().all(|key| !harness.cache.contains_key(key)));
    assert!(reply_keys.iter().all(|key| harness.cache.contains_key(key)));
}

#[tokio::test]
async fn deleting_a_comment_drops_cached_entries_of_its_whole_thread() {
    let harness = Harness::new();
    let author = Uuid::new_v4();
    let post_id = post_with_comments(&harness, 0).await;
    let top = harness
        .comments
        .create_comment(author, post_id, None, "top")
        .await
        .expect("create top");
    let reply = harness
        .comments
        .create_comment(Uuid::new_v4(), post_id, Some(top.id), "reply")
        .await
        .expect("create reply");
    harness
        .comments
        .create_comment(Uuid::new_v4(), post_id, Some(reply.id), "grand")
        .await
        .expect("create grandchild");

    assert_eq!(
        harness
            .comments
            .get_comment(reply.id)
            .await
            .expect("read reply")
            .body,
        "reply"
    );
    assert_eq!(reply_pages(&harness, reply.id, 1).await, vec!["grand"]);

    harness
        .comments
        .delete_comment(author, top.id)
        .await
        .expect("delete top");

    let reply_key = EntityKind::Comment.id_key(reply.id);
    assert!(!harness.cache.contains_key(&reply_key));
    assert!(
        !harness
            .cache
            .contains_key(&CommentGrouping::Replies(reply.id).tracker_key())
    );
    assert_eq!(
        harness
            .comments
            .get_comment(reply.id)
            .await
            .expect_err("cascaded reply")
            .kind(),
        ErrorKind::NotFound
    );
    let orphaned = harness
        .comments
        .list_replies(reply.id, None, None)
        .await
        .expect("list replies");
    assert_eq!(orphaned.total, 0);
    assert!(orphaned.items.is_empty());
}

#[tokio::test]
async fn deleting_a_post_drops_cached_entries_of_its_comments() {
    let harness = Harness::new();
    let author = Uuid::new_v4();
    let post = harness
        .posts
        .create_post(
            author,
            PostDraft {
                title: "thread".into(),
                body: String::new(),
                tags: Vec::new(),
            },
        )
        .await
        .expect("create post");
    let top = harness
        .comments
        .create_comment(Uuid::new_v4(), post.id, None, "top")
        .await
        .expect("create top");
    let reply = harness
        .comments
        .create_comment(Uuid::new_v4(), post.id, Some(top.id), "reply")
        .await
        .expect("create reply");
    harness.tasks.drain().await;

    for id in [top.id, reply.id] {
        harness.comments.get_comment(id).await.expect("warm comment");
    }
    assert_eq!(reply_pages(&harness, top.id, 1).await, vec!["reply"]);

    harness
        .posts
        .delete_post(author, post.id)
        .await
        .expect("delete post");

    for id in [top.id, reply.id] {
        let key = EntityKind::Comment.id_key(id);
        assert!(!harness.cache.contains_key(&key));
        assert_eq!(
            harness
                .comments
                .get_comment(id)
                .await
                .expect_err("removed with its post")
                .kind(),
            ErrorKind::NotFound
        );
    }
    assert_eq!(
        harness
            .comments
            .list_replies(top.id, None, None)
            .await
            .expect("list replies")
            .total,
        0
    );
}
