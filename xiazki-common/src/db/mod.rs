//! Database models and queries

pub mod books;
pub mod events;
pub mod init;
pub mod models;
pub mod reviews;
pub mod users;

pub use init::*;
pub use models::*;

use crate::{Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// Begin a write transaction that takes the database write lock up front
///
/// A deferred transaction that reads first and writes later can lose the
/// lock upgrade to a concurrent writer; `BEGIN IMMEDIATE` serialises the
/// whole read-check-write sequence instead.
pub(crate) async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Fail with NotFound unless the book exists
pub(crate) async fn ensure_book_exists(
    conn: &mut sqlx::SqliteConnection,
    book_id: i64,
) -> Result<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM books WHERE id = ?")
        .bind(book_id)
        .fetch_optional(conn)
        .await?;

    match exists {
        Some(_) => Ok(()),
        None => Err(Error::NotFound(format!("Book {}", book_id))),
    }
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(value)?)
}
