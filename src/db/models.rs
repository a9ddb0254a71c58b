use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub image: Option<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub id: i64,
    pub post_id: i64,
    /// Public path, e.g. `storage/posts/3-41-0123456789.png`.
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle of a post row. Deleted rows stay in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Active,
    Deleted,
}

impl PostStatus {
    pub fn from_deleted_at(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            None => PostStatus::Active,
            Some(_) => PostStatus::Deleted,
        }
    }

    /// SQL predicate over the `p` alias selecting rows in this status.
    pub fn predicate(self) -> &'static str {
        match self {
            PostStatus::Active => "p.deleted_at IS NULL",
            PostStatus::Deleted => "p.deleted_at IS NOT NULL",
        }
    }
}

impl Post {
    pub fn status(&self) -> PostStatus {
        PostStatus::from_deleted_at(self.deleted_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(deleted_at: Option<DateTime<Utc>>) -> Post {
        let now = Utc::now();
        Post {
            id: 1,
            user_id: 1,
            title: "hello world".into(),
            body: "hello body".into(),
            created_at: now,
            updated_at: now,
            deleted_at,
            image: None,
        }
    }

    #[test]
    fn status_follows_deleted_marker() {
        assert_eq!(post(None).status(), PostStatus::Active);
        assert_eq!(post(Some(Utc::now())).status(), PostStatus::Deleted);
    }

    #[test]
    fn user_json_never_contains_password_hash() {
        let now = Utc::now();
        let user = User {
            id: 1,
            name: "n/a".into(),
            email: "a@x.com".into(),
            password: "$2b$04$secret".into(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["email"], "a@x.com");
    }

    #[test]
    fn post_without_image_serializes_null_image() {
        let json = serde_json::to_value(post(None)).unwrap();
        assert!(json["image"].is_null());
        assert!(json["deleted_at"].is_null());
    }
}
