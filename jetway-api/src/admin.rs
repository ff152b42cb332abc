use axum::{
    extract::{Extension, Json, State},
    routing::put,
    Router,
};
use jetway_core::flight::{Flight, FlightRef};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::middleware::AdminClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateFlightDelayRequest {
    pub flight_id: FlightRef,
    pub delay_minutes: i32,
}

/// Admin routes; the caller wraps them in the admin auth layer.
pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/admin/flights/delay", put(update_flight_delay))
}

async fn update_flight_delay(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminClaims>,
    Json(req): Json<UpdateFlightDelayRequest>,
) -> Result<Json<Flight>, AppError> {
    info!(admin = %admin.sub, flight = %req.flight_id, delay = req.delay_minutes, "Flight delay requested");
    let flight = state
        .flights
        .update_flight_delay(req.flight_id, req.delay_minutes)
        .await?;
    Ok(Json(flight))
}
