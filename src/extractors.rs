use axum::extract::{FromRequest, FromRequestParts, Multipart, Query, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::auth::tokens;
use crate::content::PostInput;
use crate::db::models::User;
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::ImageUpload;
use crate::validation::IdInput;

/// The user behind `Authorization: Bearer <token>`.
/// Missing or unknown tokens are rejected as a failed login.
#[derive(Debug, Clone)]
pub struct BearerUser(pub User);

impl FromRequestParts<AppState> for BearerUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::LoginFailed)?;

        let conn = state.db.get()?;
        tokens::find_user_by_token(&conn, token)?
            .map(BearerUser)
            .ok_or(AppError::LoginFailed)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// `axum::Json` whose rejection is rendered through the error envelope.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

/// `axum::extract::Query` with enveloped rejections.
pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(QueryParams(value))
    }
}

/// Post create/update form, sent either as `multipart/form-data` (needed to
/// attach an `image` part) or as a JSON body without an image.
pub struct PostForm(pub PostInput);

impl<S> FromRequest<S> for PostForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let JsonBody(input) = JsonBody::<PostInput>::from_request(req, state).await?;
            return Ok(PostForm(input));
        }

        let mut multipart = Multipart::from_request(req, state).await?;
        let mut input = PostInput::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match name.as_str() {
                "image" => {
                    let file_name = field.file_name().map(str::to_owned);
                    let content_type = field.content_type().map(str::to_owned);
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part for an untouched file input.
                    if !bytes.is_empty() {
                        input.image = Some(ImageUpload::new(file_name, content_type, bytes));
                    }
                }
                "user_id" => input.user_id = Some(IdInput::Text(field.text().await?)),
                "post_id" => input.post_id = Some(IdInput::Text(field.text().await?)),
                "title" => input.title = Some(field.text().await?),
                "body" => input.body = Some(field.text().await?),
                other => tracing::debug!(field = other, "Ignoring unknown form field"),
            }
        }

        Ok(PostForm(input))
    }
}
