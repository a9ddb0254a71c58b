use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::db::models::User;
use crate::error::{AppError, AppResult};

/// Display name given to every account at registration.
pub const PLACEHOLDER_NAME: &str = "n/a";

const USER_COLUMNS: &str = "id, name, email, password, created_at, updated_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Insert a user with the placeholder name. The UNIQUE email constraint is
/// the final word on duplicates, so a lost race still reads as "taken".
pub fn insert(conn: &Connection, email: &str, password_hash: &str) -> AppResult<User> {
    let now = Utc::now();
    let inserted = conn.execute(
        "INSERT INTO users (name, email, password, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![PLACEHOLDER_NAME, email, password_hash, now],
    );

    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            return Err(AppError::Validation(
                "The email has already been taken.".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    if id <= 0 {
        return Err(AppError::Internal("user insert yielded no id".into()));
    }

    Ok(User {
        id,
        name: PLACEHOLDER_NAME.to_string(),
        email: email.to_string(),
        password: password_hash.to_string(),
        created_at: now,
        updated_at: now,
    })
}

pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            map_user,
        )
        .optional()?;
    Ok(user)
}

/// Exact, case-sensitive match on the stored email.
pub fn find_by_email(conn: &Connection, email: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            map_user,
        )
        .optional()?;
    Ok(user)
}

pub fn exists(conn: &Connection, id: i64) -> AppResult<bool> {
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn email_taken(conn: &Connection, email: &str) -> AppResult<bool> {
    let taken = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// Returns the number of rows written (0 when the user is gone).
pub fn update_password(conn: &Connection, id: i64, password_hash: &str) -> AppResult<usize> {
    let rows = conn.execute(
        "UPDATE users SET password = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, password_hash, Utc::now()],
    )?;
    Ok(rows)
}

pub fn password_hash(conn: &Connection, id: i64) -> AppResult<Option<String>> {
    let hash = conn
        .query_row(
            "SELECT password FROM users WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hash)
}
