//! Post writes and reads on behalf of a user, with the optional image.
//!
//! The image pipeline is shared by create and update: sniff the upload,
//! pick a name, refuse a name that is already on disk, write, confirm the
//! file landed, and only then record its path. A database row therefore
//! never points at a missing file; a crash between write and commit can
//! leave an orphan file behind.

use serde::Deserialize;

use crate::db::models::{Post, PostStatus};
use crate::db::{self, images, posts, users, TRANSACTION_ATTEMPTS};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::storage::{ImageUpload, MediaStore, NAME_COLLISION, WRITE_FAILED};
use crate::validation::{self, IdInput};

pub const MIN_TEXT_CHARS: usize = 5;

pub const POST_NOT_FOUND: &str = "Post not found.";
pub const USER_NOT_FOUND: &str = "User not found.";
pub const POST_NOT_CHANGED: &str = "Post not changed.";
pub const POST_DELETED: &str = "Post deleted.";
pub const NO_POST: &str = "No post.";
pub const NO_POST_AT_THE_MOMENT: &str = "No post at the moment.";

/// Fields of a create or update form. `post_id` is ignored on create.
#[derive(Debug, Default, Deserialize)]
pub struct PostInput {
    pub user_id: Option<IdInput>,
    pub post_id: Option<IdInput>,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(skip)]
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostRef {
    pub user_id: Option<IdInput>,
    pub post_id: Option<IdInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostQuery {
    pub user_id: Option<IdInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub user_id: Option<IdInput>,
    pub offset: Option<IdInput>,
    pub limit: Option<IdInput>,
}

struct Text<'a> {
    title: &'a str,
    body: &'a str,
}

fn text(input: &PostInput) -> AppResult<Text<'_>> {
    let title = validation::required("title", input.title.as_deref())?;
    validation::min_chars("title", title, MIN_TEXT_CHARS)?;
    let body = validation::required("body", input.body.as_deref())?;
    validation::min_chars("body", body, MIN_TEXT_CHARS)?;
    Ok(Text { title, body })
}

/// Picks the stored file name from user id, post id and extension.
type NameFn = fn(i64, i64, &str) -> String;

/// Write `upload` under `name` and return the public path to record.
fn store_upload(media: &MediaStore, upload: &ImageUpload, name: &str) -> AppResult<String> {
    if media.exists(name) {
        return Err(AppError::Storage {
            message: NAME_COLLISION,
            detail: format!("{name} already exists"),
        });
    }

    media.write_uploaded(upload, name)?;
    if media.missing(name) {
        return Err(AppError::Storage {
            message: WRITE_FAILED,
            detail: format!("{name} not found after write"),
        });
    }

    Ok(media.public_path(name))
}

/// Resolve a user/post pair for a mutation: both must exist and the post
/// must belong to the user.
fn owned_post(conn: &rusqlite::Connection, user_id: i64, post_id: i64) -> AppResult<Post> {
    if !users::exists(conn, user_id)? {
        return Err(AppError::NotFound(USER_NOT_FOUND));
    }
    let post = posts::find_active(conn, post_id)?.ok_or(AppError::NotFound(POST_NOT_FOUND))?;
    if post.user_id != user_id {
        tracing::warn!(user_id, post_id, owner = post.user_id, "Post ownership mismatch");
        return Err(AppError::Forbidden);
    }
    Ok(post)
}

pub fn create_post(pool: &DbPool, media: &MediaStore, input: &PostInput) -> AppResult<Post> {
    create_post_named(pool, media, input, MediaStore::generate_unique_name)
}

fn create_post_named(
    pool: &DbPool,
    media: &MediaStore,
    input: &PostInput,
    name_for: NameFn,
) -> AppResult<Post> {
    let user_id = validation::id("user_id", input.user_id.as_ref())?;
    let mut conn = pool.get()?;
    validation::exists("user_id", users::exists(&conn, user_id)?)?;
    let Text { title, body } = text(input)?;

    let upload = match &input.image {
        Some(upload) => Some((upload, upload.extension()?)),
        None => None,
    };

    let post = db::transaction(&mut conn, TRANSACTION_ATTEMPTS, |tx| {
        let mut post = posts::insert(tx, user_id, title, body)?;
        if let Some((upload, extension)) = upload {
            let name = name_for(user_id, post.id, extension);
            let path = store_upload(media, upload, &name)?;
            post.image = Some(images::insert(tx, post.id, &path)?);
        }
        Ok(post)
    })?;

    tracing::info!(
        user_id,
        post_id = post.id,
        image_path = post.image.as_ref().map(|i| i.path.as_str()),
        "Created post"
    );
    Ok(post)
}

/// Update title and body, and swap in a new image when one is supplied.
///
/// An existing image row keeps its id and only its path changes; the file
/// it used to point at is removed once the new state is committed.
pub fn update_post(pool: &DbPool, media: &MediaStore, input: &PostInput) -> AppResult<Post> {
    update_post_named(pool, media, input, MediaStore::generate_unique_name)
}

fn update_post_named(
    pool: &DbPool,
    media: &MediaStore,
    input: &PostInput,
    name_for: NameFn,
) -> AppResult<Post> {
    let user_id = validation::id("user_id", input.user_id.as_ref())?;
    let post_id = validation::id("post_id", input.post_id.as_ref())?;
    let Text { title, body } = text(input)?;

    let mut conn = pool.get()?;
    let current = owned_post(&conn, user_id, post_id)?;

    let upload = match &input.image {
        Some(upload) => Some((upload, upload.extension()?)),
        None => None,
    };

    let text_changed = current.title != title || current.body != body;
    if !text_changed && upload.is_none() {
        tracing::warn!(user_id, post_id, "Update carried no changes");
        return Err(AppError::Business(POST_NOT_CHANGED));
    }

    let superseded = db::transaction(&mut conn, TRANSACTION_ATTEMPTS, |tx| {
        if text_changed && posts::update_content(tx, post_id, title, body)? != 1 {
            return Err(AppError::Internal(format!("post {post_id} was not updated")));
        }

        let Some((upload, extension)) = upload else {
            return Ok(None);
        };
        let path = store_upload(media, upload, &name_for(user_id, post_id, extension))?;

        match images::for_post(tx, post_id)? {
            Some(image) => {
                let previous = image.path.clone();
                images::update_path(tx, &image, &path)?;
                Ok(Some(previous).filter(|p| !p.is_empty() && *p != path))
            }
            None => {
                images::insert(tx, post_id, &path)?;
                Ok(None)
            }
        }
    })?;

    if let Some(previous) = superseded {
        media.delete(&previous);
    }

    let post = posts::find_active(&conn, post_id)?
        .ok_or_else(|| AppError::Internal(format!("post {post_id} missing after update")))?;
    tracing::info!(
        user_id,
        post_id,
        image_path = post.image.as_ref().map(|i| i.path.as_str()),
        "Updated post"
    );
    Ok(post)
}

/// Soft delete. The row and any image stay behind.
pub fn delete_post(pool: &DbPool, input: &PostRef) -> AppResult<&'static str> {
    let user_id = validation::id("user_id", input.user_id.as_ref())?;
    let post_id = validation::id("post_id", input.post_id.as_ref())?;

    let mut conn = pool.get()?;
    owned_post(&conn, user_id, post_id)?;

    db::transaction(&mut conn, TRANSACTION_ATTEMPTS, |tx| {
        posts::soft_delete(tx, post_id)?;
        if posts::status_of(tx, post_id)? != Some(PostStatus::Deleted) {
            return Err(AppError::Internal(format!(
                "post {post_id} not marked deleted"
            )));
        }
        Ok(())
    })?;

    tracing::info!(user_id, post_id, "Deleted post");
    Ok(POST_DELETED)
}

fn listing_user(conn: &rusqlite::Connection, user_id: Option<&IdInput>) -> AppResult<i64> {
    let user_id = validation::id("user_id", user_id)?;
    validation::exists("user_id", users::exists(conn, user_id)?)?;
    Ok(user_id)
}

fn non_empty(user_id: i64, posts: Vec<Post>) -> AppResult<Vec<Post>> {
    if posts.is_empty() {
        tracing::warn!(user_id, "No posts to list");
        return Err(AppError::Business(NO_POST));
    }
    Ok(posts)
}

/// All of the user's posts, newest first.
pub fn list_posts(pool: &DbPool, query: &PostQuery) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;
    let user_id = listing_user(&conn, query.user_id.as_ref())?;
    non_empty(user_id, posts::list_for_user(&conn, user_id)?)
}

pub fn paginate_posts(pool: &DbPool, query: &PageQuery) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;
    let user_id = listing_user(&conn, query.user_id.as_ref())?;
    let offset = validation::non_negative("offset", query.offset.as_ref())?;
    let limit = validation::non_negative("limit", query.limit.as_ref())?;
    non_empty(user_id, posts::page_for_user(&conn, user_id, offset, limit)?)
}

pub fn random_post(pool: &DbPool, query: &PostQuery) -> AppResult<Post> {
    let conn = pool.get()?;
    let user_id = listing_user(&conn, query.user_id.as_ref())?;
    posts::random_for_user(&conn, user_id)?.ok_or_else(|| {
        tracing::warn!(user_id, "No post to pick from");
        AppError::Business(NO_POST_AT_THE_MOMENT)
    })
}
