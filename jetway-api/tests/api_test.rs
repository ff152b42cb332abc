use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Datelike, Duration, NaiveTime, Utc};
use jetway_api::middleware::{AdminClaims, CustomerClaims};
use jetway_api::{app, AppState, AuthConfig};
use jetway_booking::{LogSink, NotificationDispatcher};
use jetway_core::flight::{CabinFares, CabinSeats, Flight, FlightRef, FlightStatus, SeatCount};
use jetway_store::app_config::BusinessRules;
use jetway_store::MemoryStore;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn d1(economy_seats: i32) -> Flight {
    Flight {
        id: FlightRef::domestic(1),
        flight_no: "VN201".to_string(),
        airline: "Jetway".to_string(),
        origin: "HAN".to_string(),
        destination: "SGN".to_string(),
        depart_time: NaiveTime::from_hms_opt(7, 15, 0).unwrap(),
        depart_weekday: 0,
        duration_minutes: 125,
        fares: CabinFares {
            economy: Decimal::from(50),
            ..Default::default()
        },
        seats: CabinSeats {
            economy: SeatCount::new(economy_seats),
            ..Default::default()
        },
        delay_minutes: 0,
        status: FlightStatus::OnTime,
    }
}

fn setup(economy_seats: i32) -> (Router, MemoryStore) {
    let store = MemoryStore::new();
    store.add_flight(d1(economy_seats));
    store.add_user(1, "traveller@example.com");

    let shared = Arc::new(store.clone());
    let (notifier, _worker) = NotificationDispatcher::spawn(shared.clone(), Arc::new(LogSink), 16);
    let state = AppState::new(
        shared,
        notifier,
        &BusinessRules::default(),
        AuthConfig {
            secret: SECRET.to_string(),
        },
        None,
    )
    .unwrap();
    (app(state), store)
}

fn exp() -> usize {
    (Utc::now() + Duration::hours(1)).timestamp() as usize
}

fn customer_token(user_id: i64) -> String {
    let claims = CustomerClaims {
        sub: user_id.to_string(),
        email: None,
        role: "CUSTOMER".to_string(),
        exp: exp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn admin_token() -> String {
    let claims = AdminClaims {
        sub: "ops@example.com".to_string(),
        role: "ADMIN".to_string(),
        exp: exp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn booking_body(passengers: usize) -> Value {
    let date = (Utc::now() + Duration::days(30)).date_naive();
    let passengers: Vec<Value> = (0..passengers)
        .map(|i| {
            json!({
                "first_name": "Minh",
                "last_name": format!("Vo{}", i),
                "type": "ADULT",
                "gender": "MALE",
                "dob": "1990-04-12"
            })
        })
        .collect();
    json!({
        "trip_type": "ONE_WAY",
        "outbound_flight": { "flight_id": "D1", "cabin_class": "ECONOMY", "date": date.to_string() },
        "passengers": passengers
    })
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_booking_routes_require_customer_token() {
    let (router, _) = setup(10);

    let (status, _) = send(&router, "POST", "/v1/bookings", None, Some(booking_body(1))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&router, "POST", "/v1/bookings", Some("garbage"), Some(booking_body(1))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&router, "GET", "/v1/bookings/history", Some(&admin_token()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_fetch_and_cancel_booking() {
    let (router, store) = setup(100);
    let token = customer_token(1);

    let (status, booking) = send(&router, "POST", "/v1/bookings", Some(&token), Some(booking_body(1))).await;
    assert_eq!(status, StatusCode::CREATED);
    let total: Decimal = booking["total_amount"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, Decimal::from(50));
    assert_eq!(booking["status"], "CONFIRMED");
    assert_eq!(store.flight(FlightRef::domestic(1)).unwrap().seats.economy.available, 99);

    let number = booking["booking_number"].as_str().unwrap().to_string();

    let (status, fetched) = send(&router, "GET", &format!("/v1/bookings/{}", number), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["passengers"][0]["tickets"].as_array().unwrap().len(), 1);

    // Another user cannot see it.
    let (status, _) = send(&router, "GET", &format!("/v1/bookings/{}", number), Some(&customer_token(2)), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, page) = send(&router, "GET", "/v1/bookings/history?limit=5", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["pages"], 1);

    let cancel_uri = format!("/v1/bookings/{}/cancel", number);
    let (status, cancelled) = send(&router, "POST", &cancel_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(store.flight(FlightRef::domestic(1)).unwrap().seats.economy.available, 100);

    let (status, body) = send(&router, "POST", &cancel_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already cancelled"));
}

#[tokio::test]
async fn test_validation_and_capacity_errors() {
    let (router, _) = setup(1);
    let token = customer_token(1);

    let (status, _) = send(&router, "POST", "/v1/bookings", Some(&token), Some(booking_body(0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&router, "POST", "/v1/bookings", Some(&token), Some(booking_body(2))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Available: 1, Requested: 2"));

    let mut unknown = booking_body(1);
    unknown["outbound_flight"]["flight_id"] = json!("I77");
    let (status, _) = send(&router, "POST", "/v1/bookings", Some(&token), Some(unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&router, "GET", "/v1/bookings/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, metrics) = {
        let response = router
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    };
    assert_eq!(status, StatusCode::OK);
    assert!(metrics.contains("jetway_booking_rejections_total{reason=\"insufficient_seats\"} 1"));
    assert!(metrics.contains("jetway_booking_rejections_total{reason=\"no_passengers\"} 1"));
}

#[tokio::test]
async fn test_ticket_status_and_admin_delay() {
    let (router, _) = setup(10);
    let token = customer_token(1);

    let (_, booking) = send(&router, "POST", "/v1/bookings", Some(&token), Some(booking_body(1))).await;
    let ticket_number = booking["passengers"][0]["tickets"][0]["ticket_number"]
        .as_str()
        .unwrap()
        .to_string();

    let status_uri = format!("/v1/tickets/status?ticket_number={}", ticket_number);
    let (status, report) = send(&router, "GET", &status_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["status"], "ON_TIME");
    assert!(report.get("delay_duration").is_none());

    let delay = json!({ "flight_id": "D1", "delay_minutes": 45 });
    let (status, _) = send(&router, "PUT", "/v1/admin/flights/delay", Some(&token), Some(delay.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, flight) = send(&router, "PUT", "/v1/admin/flights/delay", Some(&admin_token()), Some(delay)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flight["status"], "DELAYED");

    let (_, report) = send(&router, "GET", &status_uri, None, None).await;
    assert_eq!(report["status"], "DELAYED");
    assert_eq!(report["delay_duration"], 45);

    let negative = json!({ "flight_id": "D1", "delay_minutes": -5 });
    let (status, _) = send(&router, "PUT", "/v1/admin/flights/delay", Some(&admin_token()), Some(negative)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&router, "GET", "/v1/tickets/status?ticket_number=TKT-00000000", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_flight_search() {
    let (router, _) = setup(10);

    let today = Utc::now().date_naive();
    let monday = today + Duration::days(7 - today.weekday().num_days_from_monday() as i64);
    let body = json!({
        "origin": "han",
        "destination": "SGN",
        "trip_type": "ONE_WAY",
        "depart_date": monday.to_string(),
        "passengers": 2,
        "cabin_class": "ECONOMY"
    });
    let (status, result) = send(&router, "POST", "/v1/flights/search", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let offers = result["outbound_flights"].as_array().unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["flight_id"], "D1");
    assert_eq!(offers[0]["available_seats"], 10);
    assert!(result.get("return_flights").is_none());

    let mut business = body.clone();
    business["cabin_class"] = json!("BUSINESS");
    let (_, result) = send(&router, "POST", "/v1/flights/search", None, Some(business)).await;
    assert!(result["outbound_flights"].as_array().unwrap().is_empty());

    let mut round_trip = body;
    round_trip["trip_type"] = json!("ROUND_TRIP");
    let (status, _) = send(&router, "POST", "/v1/flights/search", None, Some(round_trip)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
