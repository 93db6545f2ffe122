//! Shared fixtures for xiazki-common integration tests

#![allow(dead_code)]

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;
use xiazki_common::db::books::insert_book;
use xiazki_common::db::init::init_database;
use xiazki_common::db::models::NewBook;
use xiazki_common::db::users::create_user;

/// Lowest bcrypt cost, keeps tests fast
pub const TEST_BCRYPT_COST: u32 = 4;

/// Fresh database in a temp directory; keep the `TempDir` alive for the test
pub async fn test_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = init_database(&dir.path().join("xiazki.db"))
        .await
        .expect("database init");
    (dir, pool)
}

pub async fn test_user(pool: &SqlitePool, username: &str) -> Uuid {
    create_user(pool, username, "correct horse battery", TEST_BCRYPT_COST)
        .await
        .expect("create user")
        .id
}

pub async fn test_book(pool: &SqlitePool, title: &str) -> i64 {
    insert_book(
        pool,
        &NewBook {
            title: title.to_string(),
            authors: vec!["Test Author".to_string()],
            ..Default::default()
        },
    )
    .await
    .expect("insert book")
    .id
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
