use chrono::{DateTime, NaiveDate, Utc};
use jetway_shared::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flight::{CabinClass, FlightKind, FlightRef};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripType {
    OneWay,
    RoundTrip,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::OneWay => "ONE_WAY",
            TripType::RoundTrip => "ROUND_TRIP",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Outbound,
    Return,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "OUTBOUND",
            Direction::Return => "RETURN",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassengerType {
    Adult,
    Child,
}

impl PassengerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassengerType::Adult => "ADULT",
            PassengerType::Child => "CHILD",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

/// Booking and ticket lifecycle. `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

// Tickets mirror their booking's status.
pub type TicketStatus = BookingStatus;

macro_rules! impl_from_str {
    ($ty:ty { $($text:literal => $variant:expr),+ $(,)? }) => {
        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($ty), other)),
                }
            }
        }
    };
}

impl_from_str!(TripType { "ONE_WAY" => TripType::OneWay, "ROUND_TRIP" => TripType::RoundTrip });
impl_from_str!(Direction { "OUTBOUND" => Direction::Outbound, "RETURN" => Direction::Return });
impl_from_str!(PassengerType { "ADULT" => PassengerType::Adult, "CHILD" => PassengerType::Child });
impl_from_str!(Gender { "MALE" => Gender::Male, "FEMALE" => Gender::Female });
impl_from_str!(BookingStatus {
    "CONFIRMED" => BookingStatus::Confirmed,
    "CANCELLED" => BookingStatus::Cancelled,
});

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegSelection {
    pub flight_id: FlightRef,
    pub cabin_class: CabinClass,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerInfo {
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "type")]
    pub passenger_type: PassengerType,
    pub gender: Gender,
    pub dob: NaiveDate,
    #[serde(default)]
    pub passport_number: Option<Masked<String>>,
    #[serde(default)]
    pub passport_expiry: Option<NaiveDate>,
    #[serde(default)]
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub trip_type: TripType,
    pub outbound_flight: LegSelection,
    #[serde(default)]
    pub return_flight: Option<LegSelection>,
    pub passengers: Vec<PassengerInfo>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingHistoryQuery {
    #[serde(default)]
    pub status: Option<BookingStatus>,
    #[serde(default)]
    pub trip_type: Option<TripType>,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for BookingHistoryQuery {
    fn default() -> Self {
        Self {
            status: None,
            trip_type: None,
            sort_order: SortOrder::Desc,
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl BookingHistoryQuery {
    pub fn offset(&self) -> u64 {
        (self.page.max(1) as u64 - 1) * self.limit.max(1) as u64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingPage {
    pub data: Vec<Booking>,
    pub total: u64,
    pub pages: u64,
}

// ============================================================================
// Aggregate
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub booking_number: Uuid,
    pub user_id: i64,
    pub trip_type: TripType,
    /// Legacy `"<outbound>"` or `"<outbound>/<return>"` descriptor.
    pub cabin_class: String,
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub legs: Vec<BookingLeg>,
    pub passengers: Vec<BookingPassenger>,
}

impl Booking {
    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.passengers.iter().flat_map(|p| p.tickets.iter())
    }

    pub fn leg(&self, direction: Direction) -> Option<&BookingLeg> {
        self.legs.iter().find(|l| l.direction == direction)
    }

    pub fn has_upcoming_leg(&self, now: DateTime<Utc>) -> bool {
        self.legs.iter().any(|l| l.departs_at > now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingLeg {
    pub id: i64,
    pub booking_id: i64,
    pub flight_id: FlightRef,
    pub flight_kind: FlightKind,
    pub direction: Direction,
    pub cabin_class: CabinClass,
    pub departs_at: DateTime<Utc>,
    /// Per-passenger fare for this leg, before any passenger discount.
    pub fare_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPassenger {
    pub id: i64,
    pub booking_id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "type")]
    pub passenger_type: PassengerType,
    pub gender: Gender,
    pub dob: NaiveDate,
    pub passport_number: Option<Masked<String>>,
    pub passport_expiry: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub tickets: Vec<Ticket>,
}

impl BookingPassenger {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: i64,
    pub ticket_number: String,
    pub booking_id: i64,
    pub passenger_id: i64,
    pub flight_id: FlightRef,
    /// The booking leg this ticket flies on. A round trip on one flight has two.
    pub leg_id: i64,
    pub seat_number: String,
    pub gate: String,
    pub barcode: String,
    pub status: TicketStatus,
}

// ============================================================================
// Rows handed to a unit of work (ids assigned by the store)
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_number: Uuid,
    pub user_id: i64,
    pub trip_type: TripType,
    pub cabin_class: String,
    pub total_amount: Decimal,
    pub legs: Vec<NewLeg>,
    pub passengers: Vec<PassengerInfo>,
}

#[derive(Debug, Clone)]
pub struct NewLeg {
    pub flight_id: FlightRef,
    pub direction: Direction,
    pub cabin_class: CabinClass,
    pub departs_at: DateTime<Utc>,
    pub fare_amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub ticket_number: String,
    pub booking_id: i64,
    pub passenger_id: i64,
    pub flight_id: FlightRef,
    pub leg_id: i64,
    pub seat_number: String,
    pub gate: String,
    pub barcode: String,
}

/// A confirmed ticket on a given flight, joined with what a delay notice needs.
#[derive(Debug, Clone)]
pub struct TicketHolder {
    pub user_id: i64,
    pub ticket_number: String,
    pub passenger_name: String,
    pub departs_at: DateTime<Utc>,
}

/// Ticket joined with its leg, for status lookups.
#[derive(Debug, Clone)]
pub struct TicketWithLeg {
    pub ticket: Ticket,
    pub departs_at: DateTime<Utc>,
}

// ============================================================================
// Cabin descriptor
// ============================================================================

pub fn cabin_descriptor(outbound: CabinClass, inbound: Option<CabinClass>) -> String {
    match inbound {
        Some(ret) => format!("{}/{}", outbound, ret),
        None => outbound.to_string(),
    }
}
