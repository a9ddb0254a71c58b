//! Opaque bearer tokens. A user may hold any number at once; logout drops
//! them all together.

use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::User;
use crate::db::users;
use crate::error::AppResult;

/// Issue a new token for `user_id` and return it. Existing tokens are kept.
pub fn issue(conn: &Connection, user_id: i64, name: &str) -> AppResult<String> {
    let token = generate_token();
    conn.execute(
        "INSERT INTO personal_access_tokens (user_id, name, token, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, name, token, Utc::now()],
    )?;
    Ok(token)
}

/// Delete every token belonging to `user_id`. Returns how many went.
pub fn revoke_all(conn: &Connection, user_id: i64) -> AppResult<usize> {
    let rows = conn.execute(
        "DELETE FROM personal_access_tokens WHERE user_id = ?1",
        params![user_id],
    )?;
    Ok(rows)
}

/// Resolve a bearer token to its owner, stamping `last_used_at`.
pub fn find_user_by_token(conn: &Connection, token: &str) -> AppResult<Option<User>> {
    let user_id: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM personal_access_tokens WHERE token = ?1",
            params![token],
            |row| row.get(0),
        )
        .optional()?;

    let Some(user_id) = user_id else {
        return Ok(None);
    };

    conn.execute(
        "UPDATE personal_access_tokens SET last_used_at = ?2 WHERE token = ?1",
        params![token, Utc::now()],
    )?;
    users::find_by_id(conn, user_id)
}

/// 32 random bytes, hex encoded.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
