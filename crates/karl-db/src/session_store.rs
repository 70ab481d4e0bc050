//! Session Store (C6, database side): persists users, sessiontickets, and
//! sessions. Hashing, nonce generation, and timeout policy live in
//! `karl-identity`/`karl-facade`; this module only moves bytes in and out
//! of Postgres.

use chrono::{DateTime, Utc};
use karl_core::KaruserId;
use sqlx::PgPool;

use crate::DbError;

/// A stored user: name plus the Argon2 salt/hash pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KaruserRow {
    pub id: i64,
    pub name: String,
    pub password_salt: Vec<u8>,
    pub password_hashed: Vec<u8>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionticketRow {
    pub id: i64,
    pub karluser_id: i64,
    pub nonce: Vec<u8>,
    pub creation: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: i64,
    pub karluser_id: i64,
    pub token: Vec<u8>,
    pub creation: DateTime<Utc>,
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure, including a duplicate
/// `name`.
pub async fn add_karluser(
    pool: &PgPool,
    name: &str,
    password_salt: &[u8],
    password_hashed: &[u8],
) -> Result<KaruserId, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO karluser (name, password_salt, password_hashed) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(password_salt)
    .bind(password_hashed)
    .fetch_one(pool)
    .await?;
    Ok(KaruserId::new(id))
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no such user exists.
pub async fn get_karluser(pool: &PgPool, id: KaruserId) -> Result<KaruserRow, DbError> {
    sqlx::query_as::<_, KaruserRow>(
        "SELECT id, name, password_salt, password_hashed FROM karluser WHERE id = $1",
    )
    .bind(id.unseal())
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no such user exists. Callers must not
/// reveal this distinction to an unauthenticated caller (see
/// `generate_sessionticket`'s "do not leak existence" rule at the façade).
pub async fn get_karluser_by_name(pool: &PgPool, name: &str) -> Result<KaruserRow, DbError> {
    sqlx::query_as::<_, KaruserRow>(
        "SELECT id, name, password_salt, password_hashed FROM karluser WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure.
pub async fn add_sessionticket(
    pool: &PgPool,
    karluser_id: KaruserId,
    nonce: &[u8],
    creation: DateTime<Utc>,
) -> Result<i64, DbError> {
    let id: i64 =
        sqlx::query_scalar("INSERT INTO sessionticket (karluser_id, nonce, creation) VALUES ($1, $2, $3) RETURNING id")
            .bind(karluser_id.unseal())
            .bind(nonce)
            .bind(creation)
            .fetch_one(pool)
            .await?;
    Ok(id)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no such sessionticket exists.
pub async fn get_sessionticket(pool: &PgPool, id: i64) -> Result<SessionticketRow, DbError> {
    sqlx::query_as::<_, SessionticketRow>(
        "SELECT id, karluser_id, nonce, creation FROM sessionticket WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure, including a duplicate
/// `token`.
pub async fn add_session(
    pool: &PgPool,
    karluser_id: KaruserId,
    token: &[u8],
    creation: DateTime<Utc>,
) -> Result<i64, DbError> {
    let id: i64 =
        sqlx::query_scalar("INSERT INTO session (karluser_id, token, creation) VALUES ($1, $2, $3) RETURNING id")
            .bind(karluser_id.unseal())
            .bind(token)
            .bind(creation)
            .fetch_one(pool)
            .await?;
    Ok(id)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no session has this token.
pub async fn get_session_by_token(pool: &PgPool, token: &[u8]) -> Result<SessionRow, DbError> {
    sqlx::query_as::<_, SessionRow>(
        "SELECT id, karluser_id, token, creation FROM session WHERE token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
