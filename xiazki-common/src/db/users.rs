//! User accounts and API sessions

use chrono::{NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{Role, User};
use super::{begin_write, parse_uuid};
use crate::{Error, Result};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at";

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let role: String = row.get("role");

    Ok(User {
        id: parse_uuid(&id)?,
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        role: role.parse()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if len == 0 {
        return Err(Error::InvalidInput("Username is required".to_string()));
    }
    if len < USERNAME_MIN_LEN {
        return Err(Error::InvalidInput(format!(
            "Username must be at least {} characters",
            USERNAME_MIN_LEN
        )));
    }
    if len > USERNAME_MAX_LEN {
        return Err(Error::InvalidInput(format!(
            "Username must be at most {} characters",
            USERNAME_MAX_LEN
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if len == 0 {
        return Err(Error::InvalidInput("Password is required".to_string()));
    }
    if len < PASSWORD_MIN_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    if len > PASSWORD_MAX_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must be at most {} characters",
            PASSWORD_MAX_LEN
        )));
    }
    Ok(())
}

/// bcrypt is CPU-bound; keep it off the async executor threads
async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| Error::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(Error::from)
}

async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| Error::Internal(format!("Password check task failed: {}", e)))?
        .map_err(Error::from)
}

/// Register a new user; the first account created becomes admin
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    bcrypt_cost: u32,
) -> Result<User> {
    validate_username(username)?;
    validate_password(password)?;

    // Hash before taking the write lock
    let password_hash = hash_password(password, bcrypt_cost).await?;
    let id = Uuid::new_v4();

    let mut tx = begin_write(pool).await?;

    let taken: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(&mut *tx)
        .await?;
    if taken.is_some() {
        return Err(Error::Conflict("Username already taken".to_string()));
    }

    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *tx)
        .await?;
    let role = if user_count == 0 { Role::Admin } else { Role::User };

    let row = sqlx::query(&format!(
        "INSERT INTO users (id, username, password_hash, role) VALUES (?, ?, ?, ?) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(id.to_string())
    .bind(username)
    .bind(&password_hash)
    .bind(role.as_str())
    .fetch_one(&mut *tx)
    .await?;
    let user = user_from_row(&row)?;

    tx.commit().await?;

    info!(user_id = %user.id, username = %user.username, role = user.role.as_str(), "Registered user");
    Ok(user)
}

pub async fn get_user(pool: &SqlitePool, user_id: Uuid) -> Result<User> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))?;

    user_from_row(&row)
}

/// Check credentials
///
/// Unknown usernames and wrong passwords produce the same error.
pub async fn authenticate(pool: &SqlitePool, username: &str, password: &str) -> Result<User> {
    if username.is_empty() {
        return Err(Error::InvalidInput("Username is required".to_string()));
    }
    if password.is_empty() {
        return Err(Error::InvalidInput("Password is required".to_string()));
    }

    let invalid = || Error::Unauthorized("Invalid username or password".to_string());

    let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or_else(invalid)?;
    let user = user_from_row(&row)?;

    if !verify_password(password, &user.password_hash).await? {
        return Err(invalid());
    }

    Ok(user)
}

/// Replace a user's password after verifying the current one
pub async fn change_password(
    pool: &SqlitePool,
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
    bcrypt_cost: u32,
) -> Result<()> {
    let user = get_user(pool, user_id).await?;

    if !verify_password(current_password, &user.password_hash).await? {
        return Err(Error::Unauthorized("Current password is incorrect".to_string()));
    }
    validate_password(new_password)?;
    if current_password == new_password {
        return Err(Error::InvalidInput(
            "New password must differ from the current password".to_string(),
        ));
    }

    let password_hash = hash_password(new_password, bcrypt_cost).await?;
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(&password_hash)
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    info!(user_id = %user_id, "Changed password");
    Ok(())
}

/// Issue an opaque bearer token for `user_id`
///
/// Expired sessions of every user are purged on the way.
pub async fn create_session(pool: &SqlitePool, user_id: Uuid, ttl: chrono::Duration) -> Result<String> {
    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let now = Utc::now().naive_utc();
    let expires_at = now + ttl;

    let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();
    if purged > 0 {
        debug!(purged, "Purged expired sessions");
    }

    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user_id.to_string())
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

/// Resolve a bearer token to its user; expired or unknown tokens are `Unauthorized`
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> Result<User> {
    let session: Option<(String, NaiveDateTime)> =
        sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(pool)
            .await?;

    let (user_id, expires_at) =
        session.ok_or_else(|| Error::Unauthorized("Invalid session token".to_string()))?;

    if expires_at <= Utc::now().naive_utc() {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await?;
        return Err(Error::Unauthorized("Session expired".to_string()));
    }

    get_user(pool, parse_uuid(&user_id)?).await.map_err(|e| match e {
        Error::NotFound(_) => Error::Unauthorized("User not found".to_string()),
        other => other,
    })
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}
