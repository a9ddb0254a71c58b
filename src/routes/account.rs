use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::auth::accounts::{
    self, ChangePasswordInput, LoginInput, LogoutInput, RegisterInput, ResetPasswordInput,
};
use crate::envelope;
use crate::error::AppResult;
use crate::extractors::{BearerUser, JsonBody};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/account/update_password", post(update_password))
        .route("/account/reset_password", post(reset_password))
        .route("/user", get(current_user))
}

async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> AppResult<Response> {
    let issued = accounts::register(&state.db, &state.config.auth, &input)?;
    Ok(envelope::success("user", issued).into_response())
}

async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginInput>,
) -> AppResult<Response> {
    let issued = accounts::authenticate(&state.db, &state.config.auth, &input)?;
    Ok(envelope::success("user", issued).into_response())
}

async fn logout(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LogoutInput>,
) -> AppResult<Response> {
    let message = accounts::logout(&state.db, &input)?;
    Ok(envelope::success("user", message).into_response())
}

async fn update_password(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ChangePasswordInput>,
) -> AppResult<Response> {
    accounts::change_password(&state.db, &state.config.auth, &input)?;
    Ok(envelope::success("user", None::<()>).into_response())
}

async fn reset_password(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ResetPasswordInput>,
) -> AppResult<Response> {
    accounts::reset_password(&state.db, &state.config.auth, &input)?;
    Ok(envelope::success("user", None::<()>).into_response())
}

async fn current_user(BearerUser(user): BearerUser) -> Response {
    envelope::success("user", user).into_response()
}
