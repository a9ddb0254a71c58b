//! On-disk store for post images.
//!
//! Files live flat under `<storage root>/posts` and are referenced from the
//! database by their public path, `<public prefix>/posts/<file name>`. Names
//! embed the owning user and post ids plus ten random digits; the existence
//! check before a write guards against the rare collision, and the write
//! itself refuses to clobber an existing file.

mod upload;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use rand::Rng;

use crate::error::{AppError, AppResult};

pub use self::upload::{ImageUpload, INVALID_IMAGE};

pub const POSTS_DIR: &str = "posts";

pub const NAME_COLLISION: &str =
    "Failed to create post. Please try again in a few minutes or contact us for assistance.";

pub const WRITE_FAILED: &str =
    "Failed to create post. Something went wrong. Please try again in a few seconds.";

#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
    public_prefix: String,
}

impl MediaStore {
    /// `storage_root` is the public file area; images go in its `posts`
    /// subdirectory. `public_prefix` is the URL segment that area is served
    /// under (`storage` by default).
    pub fn new(storage_root: &Path, public_prefix: &str) -> Self {
        let prefix = public_prefix.trim_matches('/');
        Self {
            dir: storage_root.join(POSTS_DIR),
            public_prefix: format!("{prefix}/{POSTS_DIR}"),
        }
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// URL path segment the stored files are served under, `storage/posts`.
    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// `"{user_id}-{post_id}-{10 random digits}.{extension}"`
    pub fn generate_unique_name(user_id: i64, post_id: i64, extension: &str) -> String {
        let mut rng = rand::thread_rng();
        let digits: String = (0..10)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            format!("{user_id}-{post_id}-{digits}")
        } else {
            format!("{user_id}-{post_id}-{digits}.{extension}")
        }
    }

    /// Path recorded in the `images` table for a stored file name.
    pub fn public_path(&self, name: &str) -> String {
        format!("{}/{}", self.public_prefix, name)
    }

    /// Map a bare file name or a public path onto the storage directory.
    /// Anything that would step outside it resolves to `None`.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = path
            .strip_prefix(self.public_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path);
        if relative.is_empty() {
            return None;
        }

        let relative = Path::new(relative);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.dir.join(relative))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(|p| p.is_file())
    }

    pub fn missing(&self, path: &str) -> bool {
        !self.exists(path)
    }

    /// Copy an accepted upload into storage under `name`.
    pub fn write_uploaded(&self, upload: &ImageUpload, name: &str) -> AppResult<()> {
        let target = self.resolve(name).ok_or_else(|| AppError::Storage {
            message: WRITE_FAILED,
            detail: format!("refusing to write outside storage: {name}"),
        })?;

        let storage_error = |e: std::io::Error| AppError::Storage {
            message: WRITE_FAILED,
            detail: format!("writing {}: {}", target.display(), e),
        };

        self.ensure_dir().map_err(storage_error)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(storage_error)?;
        file.write_all(&upload.bytes).map_err(storage_error)?;
        file.sync_all().map_err(storage_error)?;

        tracing::debug!(path = %target.display(), bytes = upload.len(), "Stored upload");
        Ok(())
    }

    /// Best-effort removal of a superseded file. Never fails the caller.
    pub fn delete(&self, path: &str) {
        let Some(target) = self.resolve(path) else {
            tracing::warn!(path, "Skipping delete of path outside storage");
            return;
        };

        match std::fs::remove_file(&target) {
            Ok(()) => tracing::info!(path, "Deleted superseded image"),
            Err(e) => tracing::warn!(path, error = %e, "Failed to delete superseded image"),
        }
    }
}
