use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("patient database is not available")]
    LookupUnavailable,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::LookupUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// A user-correctable input problem. The message is shown verbatim as the
/// re-prompt for the same field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationFailure {
    pub message: String,
}

impl ValidationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("slot {date} {time} is no longer available")]
    SlotNotFound { date: String, time: String },

    #[error("the follow-on slot at {time} on {date} was just taken")]
    ConsecutiveSlotTaken { date: String, time: String },

    #[error("doctor schedule is not available")]
    ScheduleUnavailable,

    #[error("failed to persist schedule: {0}")]
    Persist(#[source] anyhow::Error),
}
