use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::models::{AdminReport, AppointmentRow, ConfirmationRecord, ReminderSet, ScheduleSummary};
use crate::services::{conversation, reminders};
use crate::state::AppState;

#[allow(clippy::result_large_err)]
fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response());
    }
    Ok(())
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string()})),
    )
        .into_response()
}

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub doctor: Option<String>,
}

#[derive(Serialize)]
pub struct AppointmentResponse {
    #[serde(flatten)]
    record: ConfirmationRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    reminders: Option<ReminderSet>,
}

pub async fn get_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let ledger = state.ledger();
    let response = ledger
        .confirmations()
        .iter()
        .filter(|r| {
            query
                .doctor
                .as_deref()
                .map_or(true, |d| r.slot.doctor.eq_ignore_ascii_case(d))
        })
        .map(|r| AppointmentResponse {
            record: r.clone(),
            reminders: ledger.reminders(&r.appointment_id).cloned(),
        })
        .collect();

    Ok(Json(response))
}

// GET /api/admin/appointments/export
pub async fn export_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<AppointmentRow>>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let rows = state.store.load_appointments().map_err(internal_error)?;
    Ok(Json(rows))
}

// GET /api/admin/report
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AdminReport>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    match state.store.load_admin_report().map_err(internal_error)? {
        Some(report) => Ok(Json(report)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "no report generated yet"})),
        )
            .into_response()),
    }
}

// GET /api/admin/schedule
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ScheduleSummary>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let summary = state.schedule().summary();
    summary.map(Json).ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "doctor schedule is not available"})),
        )
            .into_response()
    })
}

// POST /api/admin/reminders/dispatch
pub async fn dispatch_reminders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let sent = reminders::dispatch_due(&state, conversation::now()).await;
    Ok(Json(serde_json::json!({"ok": true, "sent": sent})))
}
