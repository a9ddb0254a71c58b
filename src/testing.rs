//! Fixtures shared by the unit tests.

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};
use rusqlite::Connection;

use crate::auth::password;
use crate::config::AuthConfig;
use crate::db::{self, models::User, users};
use crate::state::DbPool;
use crate::storage::{ImageUpload, MediaStore};

/// Cheapest bcrypt cost the crate accepts.
pub const TEST_COST: u32 = 4;

pub fn pool() -> DbPool {
    let pool = db::memory_pool().unwrap();
    db::run_migrations(&pool).unwrap();
    pool
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        bcrypt_cost: TEST_COST,
        ..AuthConfig::default()
    }
}

pub fn seed_user(conn: &Connection, email: &str, plaintext: &str) -> User {
    let hashed = password::hash(plaintext, TEST_COST).unwrap();
    users::insert(conn, email, &hashed).unwrap()
}

pub fn media(root: &Path) -> MediaStore {
    let store = MediaStore::new(root, "storage");
    store.ensure_dir().unwrap();
    store
}

fn encode(format: ImageFormat) -> Bytes {
    let img = RgbImage::from_fn(4, 3, |x, y| Rgb([x as u8 * 60, y as u8 * 80, 120]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    Bytes::from(out.into_inner())
}

pub fn png_bytes() -> Bytes {
    encode(ImageFormat::Png)
}

pub fn jpeg_bytes() -> Bytes {
    encode(ImageFormat::Jpeg)
}

pub fn png_upload() -> ImageUpload {
    ImageUpload::new(
        Some("photo.png".into()),
        Some("image/png".into()),
        png_bytes(),
    )
}
