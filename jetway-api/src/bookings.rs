use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use jetway_core::booking::{Booking, BookingHistoryQuery, BookingPage, CreateBookingRequest};
use tracing::info;

use crate::error::AppError;
use crate::middleware::Customer;
use crate::state::AppState;

/// Customer routes; the caller wraps them in the customer auth layer.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/history", get(booking_history))
        .route("/v1/bookings/{booking_number}", get(get_booking))
        .route("/v1/bookings/{booking_number}/cancel", post(cancel_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(customer): Extension<Customer>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    match state.bookings.create_booking(customer.user_id, req).await {
        Ok(booking) => {
            state.metrics.bookings_created.inc();
            info!(booking_number = %booking.booking_number, "Booking created via API");
            Ok((StatusCode::CREATED, Json(booking)))
        }
        Err(e) => {
            state.metrics.rejected(e.reason());
            Err(e.into())
        }
    }
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(customer): Extension<Customer>,
    Path(booking_number): Path<String>,
) -> Result<Json<Booking>, AppError> {
    match state
        .cancellations
        .cancel_booking(&booking_number, customer.user_id)
        .await
    {
        Ok(booking) => {
            state.metrics.bookings_cancelled.inc();
            Ok(Json(booking))
        }
        Err(e) => {
            state.metrics.rejected(e.reason());
            Err(e.into())
        }
    }
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(customer): Extension<Customer>,
    Path(booking_number): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .queries
        .get_booking_by_number(&booking_number, customer.user_id)
        .await?;
    Ok(Json(booking))
}

async fn booking_history(
    State(state): State<AppState>,
    Extension(customer): Extension<Customer>,
    Query(query): Query<BookingHistoryQuery>,
) -> Result<Json<BookingPage>, AppError> {
    let page = state.queries.get_booking_history(customer.user_id, query).await?;
    Ok(Json(page))
}
