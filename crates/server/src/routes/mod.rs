use axum::{
    routing::{get, patch},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod auth;
mod counseling;
mod health;
mod profile;
mod storage;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes = api_routes();

    // Same routes again under the configured prefix, e.g. /api/health
    let prefix = state.config.server.api_prefix.trim_end_matches('/').to_string();
    let router = if prefix.is_empty() {
        routes
    } else {
        let prefix = if prefix.starts_with('/') {
            prefix
        } else {
            format!("/{}", prefix)
        };
        routes.clone().nest(&prefix, routes)
    };

    router
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Categories
        .route(
            "/counseling/categories",
            get(counseling::list_categories).post(counseling::create_category),
        )
        .route("/counseling/categories/:category_id", get(counseling::get_category))
        // Sessions
        .route(
            "/counseling/sessions",
            get(counseling::list_sessions).post(counseling::create_session),
        )
        .route("/counseling/sessions/stats", get(counseling::session_stats))
        .route(
            "/counseling/sessions/:session_id",
            get(counseling::get_session)
                .patch(counseling::update_session)
                .delete(counseling::delete_session),
        )
        // Messages
        .route(
            "/counseling/sessions/:session_id/messages",
            get(counseling::list_messages).post(counseling::create_message),
        )
        .route(
            "/counseling/messages/:message_id/bookmark",
            patch(counseling::toggle_bookmark),
        )
        // Profile
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        // Storage
        .route(
            "/storage/avatar/signed-upload",
            get(storage::avatar_signed_upload),
        )
}
