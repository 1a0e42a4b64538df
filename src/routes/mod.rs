use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
pub mod extract;
pub mod files;
pub mod health;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => AllowOrigin::list(
            origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| value.parse::<HeaderValue>().ok()),
        ),
        None => AllowOrigin::mirror_request(),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
        .allow_credentials(true);

    let files_routes = Router::new()
        .route("/", get(files::list_files).post(files::create_file))
        .route("/:id", get(files::get_file))
        .route("/:id/publish", put(files::publish_file))
        .route("/:id/unpublish", put(files::unpublish_file))
        .route("/:id/data", get(files::file_data));

    Router::new()
        .route("/status", get(health::status))
        .route("/stats", get(health::stats))
        .route("/users", post(users::create_user))
        .route("/users/me", get(users::me))
        .route("/connect", get(auth::connect))
        .route("/disconnect", get(auth::disconnect))
        .nest("/files", files_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 64))
}
