use axum::{extract::State, routing::post, Json, Router};
use jetway_core::flight::{FlightSearchRequest, FlightSearchResult};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/flights/search", post(search_flights))
}

async fn search_flights(
    State(state): State<AppState>,
    Json(mut request): Json<FlightSearchRequest>,
) -> Result<Json<FlightSearchResult>, AppError> {
    request.origin = request.origin.trim().to_uppercase();
    request.destination = request.destination.trim().to_uppercase();
    if request.origin.is_empty() || request.destination.is_empty() {
        return Err(AppError::Validation("origin and destination are required".to_string()));
    }
    let result = state.flights.search_flights(&request).await?;
    Ok(Json(result))
}
