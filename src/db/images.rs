use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Image;
use crate::error::{AppError, AppResult};

/// The post's current image. A post carries at most one.
pub fn for_post(conn: &Connection, post_id: i64) -> AppResult<Option<Image>> {
    let image = conn
        .query_row(
            "SELECT id, post_id, path, created_at, updated_at
             FROM images WHERE post_id = ?1
             ORDER BY id DESC LIMIT 1",
            params![post_id],
            |row| {
                Ok(Image {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    path: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(image)
}

pub fn insert(conn: &Connection, post_id: i64, path: &str) -> AppResult<Image> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO images (post_id, path, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![post_id, path, now],
    )?;

    let id = conn.last_insert_rowid();
    if id <= 0 {
        return Err(AppError::Internal(format!(
            "image row for post {post_id} has no id"
        )));
    }

    Ok(Image {
        id,
        post_id,
        path: path.to_string(),
        created_at: now,
        updated_at: now,
    })
}

/// Swap the stored path in place and return the updated row.
pub fn update_path(conn: &Connection, image: &Image, path: &str) -> AppResult<Image> {
    let now = Utc::now();
    let rows = conn.execute(
        "UPDATE images SET path = ?2, updated_at = ?3 WHERE id = ?1",
        params![image.id, path, now],
    )?;
    if rows != 1 {
        return Err(AppError::Internal(format!(
            "image {} path was not updated",
            image.id
        )));
    }

    Ok(Image {
        path: path.to_string(),
        updated_at: now,
        ..image.clone()
    })
}
