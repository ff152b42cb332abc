use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    /// Numeric user id.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Authenticated customer, injected into request extensions.
#[derive(Debug, Clone, Copy)]
pub struct Customer {
    pub user_id: i64,
}

fn bearer_token(req: &Request) -> Result<&str, StatusCode> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token_data = decode::<CustomerClaims>(
        bearer_token(&req)?,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    if token_data.claims.role != "CUSTOMER" {
        return Err(StatusCode::FORBIDDEN);
    }

    let user_id = token_data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(Customer { user_id });
    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token_data = decode::<AdminClaims>(
        bearer_token(&req)?,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    if token_data.claims.role != "ADMIN" && token_data.claims.role != "SUPER_ADMIN" {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}
