//! Post records. Every normal read goes through [`PostStatus::Active`]'s
//! predicate, so soft-deleted rows never surface outside this module.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Image, Post, PostStatus};
use crate::error::{AppError, AppResult};

const POST_SELECT: &str = "
    SELECT p.id, p.user_id, p.title, p.body, p.created_at, p.updated_at, p.deleted_at,
           i.id, i.post_id, i.path, i.created_at, i.updated_at
    FROM posts p
    LEFT JOIN images i ON i.id = (SELECT MAX(id) FROM images WHERE post_id = p.id)";

const NEWEST_FIRST: &str = "ORDER BY p.created_at DESC, p.id DESC";

fn map_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    let image_id: Option<i64> = row.get(7)?;
    let image = match image_id {
        Some(id) => Some(Image {
            id,
            post_id: row.get(8)?,
            path: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        }),
        None => None,
    };

    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        deleted_at: row.get(6)?,
        image,
    })
}

pub fn insert(conn: &Connection, user_id: i64, title: &str, body: &str) -> AppResult<Post> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO posts (user_id, title, body, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![user_id, title, body, now],
    )?;

    let id = conn.last_insert_rowid();
    if id <= 0 {
        return Err(AppError::Internal("post insert yielded no id".into()));
    }

    Ok(Post {
        id,
        user_id,
        title: title.to_string(),
        body: body.to_string(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
        image: None,
    })
}

pub fn find_active(conn: &Connection, id: i64) -> AppResult<Option<Post>> {
    let post = conn
        .query_row(
            &format!(
                "{POST_SELECT} WHERE p.id = ?1 AND {}",
                PostStatus::Active.predicate()
            ),
            params![id],
            map_post,
        )
        .optional()?;
    Ok(post)
}

/// Status of the raw row, deleted or not. `None` when no row exists.
pub fn status_of(conn: &Connection, id: i64) -> AppResult<Option<PostStatus>> {
    let deleted_at = conn
        .query_row(
            "SELECT deleted_at FROM posts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(deleted_at.map(PostStatus::from_deleted_at))
}

pub fn update_content(conn: &Connection, id: i64, title: &str, body: &str) -> AppResult<usize> {
    let rows = conn.execute(
        &format!(
            "UPDATE posts AS p SET title = ?2, body = ?3, updated_at = ?4
             WHERE p.id = ?1 AND {}",
            PostStatus::Active.predicate()
        ),
        params![id, title, body, Utc::now()],
    )?;
    Ok(rows)
}

/// Stamp the deleted marker; the row and its image stay in place.
pub fn soft_delete(conn: &Connection, id: i64) -> AppResult<usize> {
    let rows = conn.execute(
        &format!(
            "UPDATE posts AS p SET deleted_at = ?2 WHERE p.id = ?1 AND {}",
            PostStatus::Active.predicate()
        ),
        params![id, Utc::now()],
    )?;
    Ok(rows)
}

pub fn list_for_user(conn: &Connection, user_id: i64) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT} WHERE p.user_id = ?1 AND {} {NEWEST_FIRST}",
        PostStatus::Active.predicate()
    ))?;
    let posts = stmt
        .query_map(params![user_id], map_post)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Newest-first window. Callers validate that both bounds are non-negative;
/// SQLite would read a negative LIMIT as "no limit".
pub fn page_for_user(
    conn: &Connection,
    user_id: i64,
    offset: i64,
    limit: i64,
) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT} WHERE p.user_id = ?1 AND {} {NEWEST_FIRST} LIMIT ?3 OFFSET ?2",
        PostStatus::Active.predicate()
    ))?;
    let posts = stmt
        .query_map(params![user_id, offset, limit], map_post)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// One active post picked uniformly at random, independently per call.
pub fn random_for_user(conn: &Connection, user_id: i64) -> AppResult<Option<Post>> {
    let post = conn
        .query_row(
            &format!(
                "{POST_SELECT} WHERE p.user_id = ?1 AND {} ORDER BY RANDOM() LIMIT 1",
                PostStatus::Active.predicate()
            ),
            params![user_id],
            map_post,
        )
        .optional()?;
    Ok(post)
}
