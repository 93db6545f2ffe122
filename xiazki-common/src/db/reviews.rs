//! Review persistence and aggregation
//!
//! One review row per (user, book). Submissions are merged into that row
//! field by field; `reviews.rating = 0` stores "no rating".

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{Rating, RatingsSpread, Review, ReviewStats, ReviewUpdate, ReviewWithAuthor};
use super::{begin_write, ensure_book_exists, parse_uuid};
use crate::{Error, Result};

const REVIEW_COLUMNS: &str = "r.id, r.user_id, r.book_id, r.rating, r.opinion, r.created_at, r.updated_at";

fn review_from_row(row: &SqliteRow) -> Result<Review> {
    let user_id: String = row.get("user_id");
    let rating: i64 = row.get("rating");

    let rating = match rating {
        0 => None,
        value => Some(
            u8::try_from(value)
                .map_err(|_| Error::Internal(format!("Rating out of range in database: {}", value)))
                .and_then(Rating::new)?,
        ),
    };

    Ok(Review {
        id: row.get("id"),
        user_id: parse_uuid(&user_id)?,
        book_id: row.get("book_id"),
        rating,
        opinion: row.get("opinion"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Merge a rating/opinion submission into the user's review of a book
///
/// Creates the review when none exists. Otherwise only the fields that are
/// `Some` overwrite the stored values, and `updated_at` is refreshed. The
/// lookup and the write run in one write transaction.
pub async fn insert_or_update_review(pool: &SqlitePool, update: &ReviewUpdate) -> Result<Review> {
    let user = update.user_id.to_string();
    let rating = update.rating.map(|r| i64::from(r.value()));
    let mut tx = begin_write(pool).await?;

    ensure_book_exists(&mut *tx, update.book_id).await?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM reviews WHERE user_id = ? AND book_id = ? LIMIT 1")
            .bind(&user)
            .bind(update.book_id)
            .fetch_optional(&mut *tx)
            .await?;

    let review_id = match existing {
        None => {
            // ON CONFLICT applies the same merge rule if another writer
            // created the row first
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO reviews (rating, opinion, user_id, book_id)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(user_id, book_id) DO UPDATE SET
                    rating = CASE WHEN excluded.rating != 0 THEN excluded.rating ELSE reviews.rating END,
                    opinion = CASE WHEN ? THEN excluded.opinion ELSE reviews.opinion END,
                    updated_at = CURRENT_TIMESTAMP
                RETURNING id
                "#,
            )
            .bind(rating.unwrap_or(0))
            .bind(update.opinion.as_deref().unwrap_or(""))
            .bind(&user)
            .bind(update.book_id)
            .bind(update.opinion.is_some())
            .fetch_one(&mut *tx)
            .await?;

            debug!(review_id = id, book_id = update.book_id, user_id = %update.user_id, "Created review");
            id
        }
        Some(id) => {
            sqlx::query(
                r#"
                UPDATE reviews
                SET rating = COALESCE(?, rating),
                    opinion = COALESCE(?, opinion),
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
            )
            .bind(rating)
            .bind(update.opinion.as_deref())
            .bind(id)
            .execute(&mut *tx)
            .await?;

            debug!(review_id = id, book_id = update.book_id, user_id = %update.user_id, "Updated review");
            id
        }
    };

    let row = sqlx::query(&format!("SELECT {} FROM reviews r WHERE r.id = ?", REVIEW_COLUMNS))
        .bind(review_id)
        .fetch_one(&mut *tx)
        .await?;
    let review = review_from_row(&row)?;

    tx.commit().await?;

    info!(
        review_id,
        book_id = update.book_id,
        user_id = %update.user_id,
        rating_changed = update.rating.is_some(),
        opinion_changed = update.opinion.is_some(),
        "Saved review"
    );

    Ok(review)
}

/// The viewing user's review of a book, if any
pub async fn get_user_review(pool: &SqlitePool, book_id: i64, user_id: Uuid) -> Result<Option<Review>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM reviews r WHERE r.book_id = ? AND r.user_id = ? LIMIT 1",
        REVIEW_COLUMNS
    ))
    .bind(book_id)
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(review_from_row).transpose()
}

/// Reviews of a book by everyone except `user_id`, newest first
pub async fn list_other_reviews(
    pool: &SqlitePool,
    book_id: i64,
    user_id: Uuid,
) -> Result<Vec<ReviewWithAuthor>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}, u.username
        FROM reviews r
        JOIN users u ON u.id = r.user_id
        WHERE r.book_id = ? AND r.user_id != ?
        ORDER BY r.created_at DESC, r.id DESC
        "#,
        REVIEW_COLUMNS
    ))
    .bind(book_id)
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ReviewWithAuthor {
                review: review_from_row(row)?,
                username: row.get("username"),
            })
        })
        .collect()
}

/// Aggregate a book's reviews relative to a viewing user
///
/// Unrated reviews (rating 0) are excluded from the average, the ratings
/// count and the spread. A book without reviews yields all zeros.
pub async fn compute_stats(pool: &SqlitePool, book_id: i64, viewing_user_id: Uuid) -> Result<ReviewStats> {
    // Both queries read the same snapshot
    let mut tx = pool.begin().await?;

    let (user_rating, average_rating, ratings_count, opinions_count): (i64, f64, i64, i64) =
        sqlx::query_as(
            r#"
            SELECT
                COALESCE(MAX(CASE WHEN user_id = ? THEN rating END), 0) AS user_rating,
                COALESCE(AVG(CASE WHEN rating != 0 THEN CAST(rating AS REAL) END), 0.0) AS average_rating,
                COUNT(CASE WHEN rating != 0 THEN 1 END) AS ratings_count,
                COUNT(CASE WHEN opinion != '' THEN 1 END) AS opinions_count
            FROM reviews
            WHERE book_id = ?
            "#,
        )
        .bind(viewing_user_id.to_string())
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

    let buckets: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT rating, COUNT(*) AS count
        FROM reviews
        WHERE book_id = ? AND rating BETWEEN 1 AND 10
        GROUP BY rating
        "#,
    )
    .bind(book_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    let mut ratings_spread = RatingsSpread::default();
    for (rating, count) in buckets {
        ratings_spread.set(rating, count);
    }

    Ok(ReviewStats {
        user_rating,
        average_rating,
        ratings_count,
        opinions_count,
        ratings_spread,
    })
}
