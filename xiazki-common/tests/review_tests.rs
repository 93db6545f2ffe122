//! Review upsert and statistics tests

mod helpers;

use helpers::{test_book, test_db, test_user};
use sqlx::SqlitePool;
use uuid::Uuid;
use xiazki_common::db::models::{Rating, ReviewUpdate};
use xiazki_common::db::reviews::{
    compute_stats, get_user_review, insert_or_update_review, list_other_reviews,
};
use xiazki_common::Error;

fn update(user_id: Uuid, book_id: i64, rating: Option<u8>, opinion: Option<&str>) -> ReviewUpdate {
    ReviewUpdate {
        user_id,
        book_id,
        rating: rating.map(|r| Rating::new(r).unwrap()),
        opinion: opinion.map(str::to_string),
    }
}

async fn review_rows(pool: &SqlitePool, user_id: Uuid, book_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE user_id = ? AND book_id = ?")
        .bind(user_id.to_string())
        .bind(book_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_first_submission_creates_review() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    let review = insert_or_update_review(&pool, &update(user, book, Some(8), None))
        .await
        .unwrap();

    assert_eq!(review.rating.map(|r| r.value()), Some(8));
    assert_eq!(review.opinion, "");
    assert_eq!(review_rows(&pool, user, book).await, 1);
}

#[tokio::test]
async fn test_partial_updates_merge_into_one_row() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    insert_or_update_review(&pool, &update(user, book, Some(6), Some("slow start")))
        .await
        .unwrap();
    // Rating only: opinion kept
    insert_or_update_review(&pool, &update(user, book, Some(9), None))
        .await
        .unwrap();
    // Opinion only: rating kept
    let review = insert_or_update_review(&pool, &update(user, book, None, Some("great ending")))
        .await
        .unwrap();

    assert_eq!(review.rating.map(|r| r.value()), Some(9));
    assert_eq!(review.opinion, "great ending");
    assert_eq!(review_rows(&pool, user, book).await, 1);
}

#[tokio::test]
async fn test_missing_rating_does_not_clear_existing() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    insert_or_update_review(&pool, &update(user, book, Some(7), None))
        .await
        .unwrap();
    let review = insert_or_update_review(&pool, &update(user, book, None, None))
        .await
        .unwrap();

    assert_eq!(review.rating.map(|r| r.value()), Some(7));
}

#[tokio::test]
async fn test_explicit_empty_opinion_clears_it() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    insert_or_update_review(&pool, &update(user, book, None, Some("meh")))
        .await
        .unwrap();
    let review = insert_or_update_review(&pool, &update(user, book, None, Some("")))
        .await
        .unwrap();

    assert_eq!(review.opinion, "");
    let stored = get_user_review(&pool, book, user).await.unwrap().unwrap();
    assert_eq!(stored.id, review.id);
}

#[tokio::test]
async fn test_review_for_unknown_book_is_not_found() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;

    let result = insert_or_update_review(&pool, &update(user, 42, Some(5), None)).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_concurrent_submissions_never_duplicate() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    let mut handles = Vec::new();
    for i in 0..8u8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            insert_or_update_review(&pool, &update(user, book, Some(i + 1), Some("race"))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(review_rows(&pool, user, book).await, 1);
    let review = get_user_review(&pool, book, user).await.unwrap().unwrap();
    assert!(review.rating.is_some());
    assert_eq!(review.opinion, "race");
}

#[tokio::test]
async fn test_stats_without_reviews() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let book = test_book(&pool, "Dune").await;

    let stats = compute_stats(&pool, book, user).await.unwrap();

    assert_eq!(stats.user_rating, 0);
    assert_eq!(stats.ratings_count, 0);
    assert_eq!(stats.opinions_count, 0);
    assert_eq!(stats.average_rating, 0.0);
    assert_eq!(stats.ratings_spread.len(), 10);
    assert!(stats.ratings_spread.iter().all(|(_, count)| count == 0));
}

#[tokio::test]
async fn test_stats_aggregate_mixed_reviews() {
    let (_dir, pool) = test_db().await;
    let alice = test_user(&pool, "alice").await;
    let bob = test_user(&pool, "bob").await;
    let carol = test_user(&pool, "carol").await;
    let book = test_book(&pool, "Dune").await;

    insert_or_update_review(&pool, &update(alice, book, Some(10), Some("x")))
        .await
        .unwrap();
    insert_or_update_review(&pool, &update(bob, book, None, Some("")))
        .await
        .unwrap();
    insert_or_update_review(&pool, &update(carol, book, Some(8), Some("y")))
        .await
        .unwrap();

    let stats = compute_stats(&pool, book, carol).await.unwrap();

    assert_eq!(stats.user_rating, 8);
    assert_eq!(stats.ratings_count, 2);
    assert_eq!(stats.opinions_count, 2);
    assert!((stats.average_rating - 9.0).abs() < f64::EPSILON);
    assert_eq!(stats.ratings_spread.get(10), 1);
    assert_eq!(stats.ratings_spread.get(8), 1);
    for bucket in (1..=7).chain(std::iter::once(9)) {
        assert_eq!(stats.ratings_spread.get(bucket), 0, "bucket {}", bucket);
    }

    // Viewer without a rating
    let stats = compute_stats(&pool, book, bob).await.unwrap();
    assert_eq!(stats.user_rating, 0);
}

#[tokio::test]
async fn test_stats_are_per_book() {
    let (_dir, pool) = test_db().await;
    let user = test_user(&pool, "reader").await;
    let dune = test_book(&pool, "Dune").await;
    let emma = test_book(&pool, "Emma").await;

    insert_or_update_review(&pool, &update(user, dune, Some(3), None))
        .await
        .unwrap();

    let stats = compute_stats(&pool, emma, user).await.unwrap();
    assert_eq!(stats.ratings_count, 0);
}

#[tokio::test]
async fn test_other_reviews_exclude_viewer() {
    let (_dir, pool) = test_db().await;
    let alice = test_user(&pool, "alice").await;
    let bob = test_user(&pool, "bob").await;
    let book = test_book(&pool, "Dune").await;

    insert_or_update_review(&pool, &update(alice, book, Some(5), Some("fine")))
        .await
        .unwrap();
    insert_or_update_review(&pool, &update(bob, book, Some(9), Some("loved it")))
        .await
        .unwrap();

    let others = list_other_reviews(&pool, book, alice).await.unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0].username, "bob");
    assert_eq!(others[0].review.opinion, "loved it");
}
