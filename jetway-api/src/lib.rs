use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Method, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod bookings;
pub mod error;
pub mod flights;
pub mod metrics;
pub mod middleware;
pub mod state;
pub mod tickets;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let customer = bookings::routes().route_layer(from_fn_with_state(
        state.clone(),
        middleware::customer_auth_middleware,
    ));
    let admin = admin::routes().route_layer(from_fn_with_state(
        state.clone(),
        middleware::admin_auth_middleware,
    ));

    Router::new()
        .merge(customer)
        .merge(admin)
        .merge(tickets::routes())
        .merge(flights::routes())
        .route("/metrics", get(metrics::metrics_handler))
        .route("/health", get(|| async { "OK" }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };
    let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>().copied() else {
        return next.run(req).await;
    };

    let key = format!("ratelimit:{}", addr.ip());
    match redis.check_rate_limit(&key, state.rate_limit_per_minute, 60).await {
        Ok(true) => next.run(req).await,
        Ok(false) => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response(),
        Err(e) => {
            // Fail open
            tracing::warn!(error = %e, "rate limiter unavailable");
            next.run(req).await
        }
    }
}
