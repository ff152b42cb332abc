use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Flat record describing one issued ticket, as rendered in the ticket e-mail.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct TicketIssuedEvent {
    pub ticket_number: String,
    pub booking_number: String,
    pub passenger_name: String,
    pub seat_number: String,
    pub gate: String,
    pub barcode: String,
    pub flight_id: String,
    pub flight_no: String,
    pub airline: String,
    pub flight_date: String, // dd-mm-yyyy
    pub origin: String,
    pub destination: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingCancelledEvent {
    pub booking_number: String,
    pub total_amount: Decimal,
    pub cancellation_date: String, // dd-mm-yyyy
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct FlightDelayedEvent {
    pub ticket_number: String,
    pub passenger_name: String,
    pub flight_id: String,
    pub flight_no: String,
    pub delay_minutes: i32,
    pub scheduled_departure: chrono::DateTime<chrono::Utc>,
    pub expected_departure: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    TicketIssued(TicketIssuedEvent),
    BookingCancelled(BookingCancelledEvent),
    FlightDelayed(FlightDelayedEvent),
}

impl NotificationEvent {
    /// Stable key used for partitioning and log correlation.
    pub fn key(&self) -> &str {
        match self {
            NotificationEvent::TicketIssued(e) => &e.ticket_number,
            NotificationEvent::BookingCancelled(e) => &e.booking_number,
            NotificationEvent::FlightDelayed(e) => &e.ticket_number,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            NotificationEvent::TicketIssued(_) => "Your Flight Ticket",
            NotificationEvent::BookingCancelled(_) => "Your Booking Cancellation Confirmation",
            NotificationEvent::FlightDelayed(_) => "Your Flight Has Been Delayed",
        }
    }
}

/// What actually goes over the wire to the mail channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEnvelope {
    pub recipient: String,
    pub subject: String,
    pub event: NotificationEvent,
    pub timestamp: i64,
}

impl NotificationEnvelope {
    pub fn new(recipient: String, event: NotificationEvent) -> Self {
        Self {
            recipient,
            subject: event.subject().to_string(),
            event,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
