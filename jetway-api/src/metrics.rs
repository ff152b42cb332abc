use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Booking counters, registered on a registry owned by the app state.
pub struct Metrics {
    registry: Registry,
    pub bookings_created: IntCounter,
    pub bookings_cancelled: IntCounter,
    pub booking_rejections: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings_created = IntCounter::new("jetway_bookings_created_total", "Bookings committed")?;
        registry.register(Box::new(bookings_created.clone()))?;

        let bookings_cancelled = IntCounter::new("jetway_bookings_cancelled_total", "Bookings cancelled")?;
        registry.register(Box::new(bookings_cancelled.clone()))?;

        let booking_rejections = IntCounterVec::new(
            Opts::new("jetway_booking_rejections_total", "Booking operations rejected, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(booking_rejections.clone()))?;

        Ok(Self {
            registry,
            bookings_created,
            bookings_cancelled,
            booking_rejections,
        })
    }

    pub fn rejected(&self, reason: &str) {
        self.booking_rejections.with_label_values(&[reason]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
