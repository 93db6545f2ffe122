//! Reading-event consistency tests

mod helpers;

use helpers::{date, test_book, test_db, test_user};
use xiazki_common::db::books::delete_book;
use xiazki_common::db::events::{delete_event, insert_event, latest_event_kinds, list_events};
use xiazki_common::db::models::{EventKind, NewEvent};
use xiazki_common::Error;

fn event(kind: EventKind, y: i32, m: u32, d: u32) -> NewEvent {
    NewEvent { kind, date: date(y, m, d) }
}

#[tokio::test]
async fn test_dropped_without_prior_events() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    let inserted = insert_event(&pool, book, user, event(EventKind::Dropped, 2024, 3, 1))
        .await
        .unwrap();
    assert_eq!(inserted.kind, EventKind::Dropped);

    let events = list_events(&pool, book, user).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, inserted.id);
}

#[tokio::test]
async fn test_reading_after_finish_is_conflict() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    insert_event(&pool, book, user, event(EventKind::Finished, 2024, 5, 10))
        .await
        .unwrap();

    // Reading after an earlier finish contradicts it
    let result = insert_event(&pool, book, user, event(EventKind::Reading, 2024, 5, 20)).await;
    assert!(matches!(result, Err(Error::Conflict(_))), "got {:?}", result);

    let events = list_events(&pool, book, user).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Finished);
}

#[tokio::test]
async fn test_reading_dated_before_finish_is_accepted() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    insert_event(&pool, book, user, event(EventKind::Finished, 2024, 5, 10))
        .await
        .unwrap();
    insert_event(&pool, book, user, event(EventKind::Reading, 2024, 4, 1))
        .await
        .unwrap();

    let kinds: Vec<EventKind> = list_events(&pool, book, user)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, vec![EventKind::Reading, EventKind::Finished]);
}

#[tokio::test]
async fn test_finished_before_reading_is_conflict() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    insert_event(&pool, book, user, event(EventKind::Reading, 2024, 6, 1))
        .await
        .unwrap();

    let result = insert_event(&pool, book, user, event(EventKind::Finished, 2024, 5, 1)).await;
    assert!(matches!(result, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_later_finish_supersedes_earlier_finish() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    let first = insert_event(&pool, book, user, event(EventKind::Finished, 2024, 1, 1))
        .await
        .unwrap();
    let second = insert_event(&pool, book, user, event(EventKind::Finished, 2024, 2, 1))
        .await
        .unwrap();

    let events = list_events(&pool, book, user).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, second.id);
    assert_ne!(events[0].id, first.id);
}

#[tokio::test]
async fn test_dropped_replaces_finished() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    insert_event(&pool, book, user, event(EventKind::Finished, 2024, 1, 1))
        .await
        .unwrap();
    insert_event(&pool, book, user, event(EventKind::Dropped, 2023, 12, 1))
        .await
        .unwrap();

    let events = list_events(&pool, book, user).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Dropped);
}

#[tokio::test]
async fn test_new_reading_replaces_old_reading() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    insert_event(&pool, book, user, event(EventKind::Reading, 2024, 1, 1))
        .await
        .unwrap();
    insert_event(&pool, book, user, event(EventKind::Reading, 2024, 3, 1))
        .await
        .unwrap();

    let events = list_events(&pool, book, user).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].date, date(2024, 3, 1));
}

#[tokio::test]
async fn test_same_day_start_and_finish_allowed() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    insert_event(&pool, book, user, event(EventKind::Reading, 2024, 7, 7))
        .await
        .unwrap();
    insert_event(&pool, book, user, event(EventKind::Finished, 2024, 7, 7))
        .await
        .unwrap();
    // And the other way round: reading on the finish date is not "after" it
    insert_event(&pool, book, user, event(EventKind::Reading, 2024, 7, 7))
        .await
        .unwrap();

    assert_eq!(list_events(&pool, book, user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_events_are_per_user() {
    let (_dir, pool) = test_db().await;
    let alice = test_user(&pool, "alice").await;
    let bob = test_user(&pool, "bob").await;
    let book = test_book(&pool, "Dune").await;

    insert_event(&pool, book, alice, event(EventKind::Finished, 2024, 1, 1))
        .await
        .unwrap();
    // Bob's reading is unaffected by Alice's finish
    insert_event(&pool, book, bob, event(EventKind::Reading, 2024, 2, 1))
        .await
        .unwrap();

    assert_eq!(list_events(&pool, book, alice).await.unwrap().len(), 1);
    assert_eq!(list_events(&pool, book, bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_book_is_not_found() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;

    let result = insert_event(&pool, 999, user, event(EventKind::Reading, 2024, 1, 1)).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_delete_event_only_by_owner() {
    let (_dir, pool) = test_db().await;
    let alice = test_user(&pool, "alice").await;
    let bob = test_user(&pool, "bob").await;
    let book = test_book(&pool, "Dune").await;

    let ev = insert_event(&pool, book, alice, event(EventKind::Reading, 2024, 1, 1))
        .await
        .unwrap();

    assert!(matches!(delete_event(&pool, ev.id, bob).await, Err(Error::NotFound(_))));
    delete_event(&pool, ev.id, alice).await.unwrap();
    assert!(list_events(&pool, book, alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_latest_status_prefers_terminal_event() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let dune = test_book(&pool, "Dune").await;
    let emma = test_book(&pool, "Emma").await;

    insert_event(&pool, dune, user, event(EventKind::Reading, 2024, 1, 1))
        .await
        .unwrap();
    insert_event(&pool, dune, user, event(EventKind::Finished, 2024, 2, 1))
        .await
        .unwrap();
    insert_event(&pool, emma, user, event(EventKind::Reading, 2024, 3, 1))
        .await
        .unwrap();

    let latest = latest_event_kinds(&pool, user).await.unwrap();
    assert_eq!(latest, vec![(dune, EventKind::Finished), (emma, EventKind::Reading)]);
}

#[tokio::test]
async fn test_deleting_book_removes_events() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    insert_event(&pool, book, user, event(EventKind::Reading, 2024, 1, 1))
        .await
        .unwrap();
    delete_book(&pool, book).await.unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
