use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use jetway_booking::FlightStatusReport;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FlightStatusParams {
    pub ticket_number: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/tickets/status", get(check_flight_status))
}

async fn check_flight_status(
    State(state): State<AppState>,
    Query(params): Query<FlightStatusParams>,
) -> Result<Json<FlightStatusReport>, AppError> {
    let ticket_number = params.ticket_number.trim();
    if ticket_number.is_empty() {
        return Err(AppError::Validation("ticket_number is required".to_string()));
    }
    let report = state.flights.check_flight_status(ticket_number).await?;
    Ok(Json(report))
}
