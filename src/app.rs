use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/baby/:id", get(handlers::baby_page))
        .route("/manifest.json", get(handlers::manifest))
        .route("/api/baby/:id/tiles", get(handlers::get_tiles))
        .route("/api/baby/:id/grid", get(handlers::get_grid))
        .route("/api/baby/:id/messages", get(handlers::get_messages))
        .route("/api/baby/:id/series/:kind", get(handlers::get_series))
        .route("/api/baby/:id/record", post(handlers::record))
        .route("/api/baby/:id/arm", post(handlers::arm))
        .route("/api/baby/:id/measurement", post(handlers::record_measurement))
        .route("/api/baby/:id/child_name", post(handlers::change_child_name))
        .route("/api/baby/:id/access", get(handlers::get_access))
        .route("/api/baby/:id/access/request", post(handlers::request_access))
        .route("/api/baby/:id/access/grant", post(handlers::grant_writer))
        .route("/api/baby/:id/access/owner", post(handlers::grant_owner))
        .route("/api/baby/:id/access/deny", post(handlers::deny_access))
        .fallback(handlers::fallback)
        .with_state(state)
}
