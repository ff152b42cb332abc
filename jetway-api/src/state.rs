use std::sync::Arc;
use std::time::Duration;

use jetway_booking::{
    BookingOrchestrator, BookingPolicy, BookingQueries, CancellationEngine, FlightOperations,
    NotificationDispatcher,
};
use jetway_catalog::{FareConfig, FareEngine};
use jetway_core::repository::BookingStore;
use jetway_store::app_config::BusinessRules;
use jetway_store::RedisClient;
use rust_decimal::Decimal;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingOrchestrator>,
    pub cancellations: Arc<CancellationEngine>,
    pub queries: Arc<BookingQueries>,
    pub flights: Arc<FlightOperations>,
    /// Absent: rate limiting is off.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit_per_minute: i64,
    pub auth: AuthConfig,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BookingStore>,
        notifier: NotificationDispatcher,
        rules: &BusinessRules,
        auth: AuthConfig,
        redis: Option<Arc<RedisClient>>,
    ) -> Result<Self, prometheus::Error> {
        let timeout = Duration::from_secs(rules.transaction_timeout_secs);
        let policy = BookingPolicy {
            transaction_timeout: timeout,
            max_attempts: rules.max_booking_attempts,
            require_return_after_departure: rules.require_return_after_departure,
        };

        let mut fare_config = FareConfig::default();
        match Decimal::from_f64_retain(rules.child_fare_ratio) {
            Some(ratio) => fare_config.child_fare_ratio = ratio.round_dp(4),
            None => tracing::warn!(
                ratio = rules.child_fare_ratio,
                "invalid child fare ratio, keeping default"
            ),
        }

        Ok(Self {
            bookings: Arc::new(BookingOrchestrator::new(
                store.clone(),
                FareEngine::new(fare_config),
                notifier.clone(),
                policy,
            )),
            cancellations: Arc::new(CancellationEngine::new(store.clone(), notifier.clone(), timeout)),
            queries: Arc::new(BookingQueries::new(store.clone())),
            flights: Arc::new(FlightOperations::new(store, notifier, timeout)),
            redis,
            rate_limit_per_minute: rules.rate_limit_per_minute,
            auth,
            metrics: Arc::new(Metrics::new()?),
        })
    }
}
