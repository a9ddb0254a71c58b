pub mod account;
pub mod posts;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router: the JSON API under `/api`, stored images under
/// `/<public prefix>/posts`, and a liveness check.
pub fn build_router(state: AppState) -> Router {
    let images_route = format!("/{}", state.media.public_prefix());
    let body_limit = state.config.posts.max_upload_bytes();

    let api = Router::new()
        .merge(account::router())
        .merge(posts::router());

    Router::new()
        .nest("/api", api)
        .nest_service(&images_route, ServeDir::new(state.media.dir()))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
