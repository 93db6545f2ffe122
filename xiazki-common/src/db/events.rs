//! Reading-event persistence
//!
//! A (user, book) pair holds at most one `reading` event and at most one
//! terminal (`finished` or `dropped`) event. Their dates must stay
//! consistent: a reading event may not be dated after the terminal event.
//! Both directions use strict comparison, so equal dates are accepted.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{Event, EventKind, NewEvent, Phase};
use super::{begin_write, ensure_book_exists, parse_uuid};
use crate::{Error, Result};

const EVENT_COLUMNS: &str = "id, type, date, user_id, book_id, created_at, updated_at";

fn event_from_row(row: &SqliteRow) -> Result<Event> {
    let kind: String = row.get("type");
    let user_id: String = row.get("user_id");

    Ok(Event {
        id: row.get("id"),
        kind: kind.parse()?,
        date: row.get("date"),
        user_id: parse_uuid(&user_id)?,
        book_id: row.get("book_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Insert a reading event, replacing the previous event of the same phase
///
/// - terminal event: rejected with `Conflict` if a reading event is dated
///   after it; otherwise replaces any existing finished/dropped event
/// - reading event: rejected with `Conflict` if a finished/dropped event is
///   dated before it; otherwise replaces any existing reading event
///
/// Check, delete and insert share one transaction.
pub async fn insert_event(
    pool: &SqlitePool,
    book_id: i64,
    user_id: Uuid,
    event: NewEvent,
) -> Result<Event> {
    let user = user_id.to_string();
    let mut tx = begin_write(pool).await?;

    ensure_book_exists(&mut *tx, book_id).await?;

    match event.kind.phase() {
        Phase::Terminal => {
            let later_reading: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT id FROM events
                WHERE user_id = ? AND book_id = ? AND type = 'reading' AND date > ?
                LIMIT 1
                "#,
            )
            .bind(&user)
            .bind(book_id)
            .bind(event.date)
            .fetch_optional(&mut *tx)
            .await?;

            if later_reading.is_some() {
                return Err(Error::Conflict(format!(
                    "cannot insert {} event: reading event exists with later date",
                    event.kind
                )));
            }

            let deleted = sqlx::query(
                "DELETE FROM events WHERE user_id = ? AND book_id = ? AND type IN ('finished', 'dropped')",
            )
            .bind(&user)
            .bind(book_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            debug!(book_id, user_id = %user_id, deleted, "Superseded terminal events");
        }
        Phase::Reading => {
            let earlier_terminal: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT id FROM events
                WHERE user_id = ? AND book_id = ? AND type IN ('finished', 'dropped') AND date < ?
                LIMIT 1
                "#,
            )
            .bind(&user)
            .bind(book_id)
            .bind(event.date)
            .fetch_optional(&mut *tx)
            .await?;

            if earlier_terminal.is_some() {
                return Err(Error::Conflict(
                    "cannot insert reading event: finished/dropped event exists with earlier date"
                        .to_string(),
                ));
            }

            let deleted = sqlx::query(
                "DELETE FROM events WHERE user_id = ? AND book_id = ? AND type = 'reading'",
            )
            .bind(&user)
            .bind(book_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            debug!(book_id, user_id = %user_id, deleted, "Superseded reading events");
        }
    }

    let row = sqlx::query(&format!(
        "INSERT INTO events (type, date, user_id, book_id) VALUES (?, ?, ?, ?) RETURNING {}",
        EVENT_COLUMNS
    ))
    .bind(event.kind.as_str())
    .bind(event.date)
    .bind(&user)
    .bind(book_id)
    .fetch_one(&mut *tx)
    .await?;
    let inserted = event_from_row(&row)?;

    tx.commit().await?;

    info!(
        event_id = inserted.id,
        book_id,
        user_id = %user_id,
        kind = %event.kind,
        date = %event.date,
        "Recorded reading event"
    );

    Ok(inserted)
}

/// Events of one user for one book, oldest first
pub async fn list_events(pool: &SqlitePool, book_id: i64, user_id: Uuid) -> Result<Vec<Event>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM events WHERE book_id = ? AND user_id = ? ORDER BY date ASC, id ASC",
        EVENT_COLUMNS
    ))
    .bind(book_id)
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(event_from_row).collect()
}

/// Latest status per book for one user
///
/// A terminal event wins over a reading event.
pub async fn latest_event_kinds(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Vec<(i64, EventKind)>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT book_id, type FROM events
        WHERE user_id = ?
        ORDER BY book_id ASC,
                 CASE WHEN type = 'reading' THEN 0 ELSE 1 END DESC,
                 date DESC
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut latest: Vec<(i64, EventKind)> = Vec::new();
    for (book_id, kind) in rows {
        if latest.last().map(|(id, _)| *id) == Some(book_id) {
            continue;
        }
        latest.push((book_id, kind.parse()?));
    }

    Ok(latest)
}

/// Delete an event owned by `user_id`
pub async fn delete_event(pool: &SqlitePool, event_id: i64, user_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM events WHERE id = ? AND user_id = ?")
        .bind(event_id)
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Event {}", event_id)));
    }

    info!(event_id, user_id = %user_id, "Deleted reading event");
    Ok(())
}
