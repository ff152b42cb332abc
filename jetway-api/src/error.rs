use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jetway_core::error::BookingError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    /// The request may succeed if retried.
    Unavailable(String),
    Internal(String),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::FlightNotFound(_)
            | BookingError::BookingNotFound(_)
            | BookingError::TicketNotFound(_) => AppError::NotFound(message),
            BookingError::AlreadyCancelled(_)
            | BookingError::NoUpcomingFlights(_)
            | BookingError::InsufficientSeats { .. } => AppError::Conflict(message),
            e if e.is_retryable() => AppError::Unavailable(message),
            e if e.is_validation() => AppError::Validation(message),
            _ => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
