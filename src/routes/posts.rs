use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::content::{self, PageQuery, PostQuery, PostRef};
use crate::envelope;
use crate::error::AppResult;
use crate::extractors::{JsonBody, PostForm, QueryParams};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/store", post(store))
        .route("/update", post(update))
        .route("/destroy", post(destroy))
        .route("/get", get(list))
        .route("/paginate", get(paginate))
        .route("/get/random", get(random))
}

async fn store(State(state): State<AppState>, PostForm(input): PostForm) -> AppResult<Response> {
    let post = content::create_post(&state.db, &state.media, &input)?;
    Ok(envelope::success("post", post).into_response())
}

async fn update(State(state): State<AppState>, PostForm(input): PostForm) -> AppResult<Response> {
    let post = content::update_post(&state.db, &state.media, &input)?;
    Ok(envelope::success("post", post).into_response())
}

async fn destroy(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<PostRef>,
) -> AppResult<Response> {
    let message = content::delete_post(&state.db, &input)?;
    Ok(envelope::success("post", message).into_response())
}

async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PostQuery>,
) -> AppResult<Response> {
    let posts = content::list_posts(&state.db, &query)?;
    Ok(envelope::success("posts", posts).into_response())
}

async fn paginate(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PageQuery>,
) -> AppResult<Response> {
    let posts = content::paginate_posts(&state.db, &query)?;
    Ok(envelope::success("posts", posts).into_response())
}

async fn random(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PostQuery>,
) -> AppResult<Response> {
    let post = content::random_post(&state.db, &query)?;
    Ok(envelope::success("post", post).into_response())
}
