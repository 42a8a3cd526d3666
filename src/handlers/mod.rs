pub mod admin;
pub mod health;
pub mod sessions;
pub mod webhook;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/webhook/sms", post(webhook::sms_webhook))
        .route("/api/sessions", post(sessions::start_session))
        .route("/api/sessions/:id/turn", post(sessions::send_turn))
        .route("/api/admin/appointments", get(admin::get_appointments))
        .route(
            "/api/admin/appointments/export",
            get(admin::export_appointments),
        )
        .route("/api/admin/report", get(admin::get_report))
        .route("/api/admin/schedule", get(admin::get_schedule))
        .route(
            "/api/admin/reminders/dispatch",
            post(admin::dispatch_reminders),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
