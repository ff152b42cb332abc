use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::booking::TripType;

/// Which catalog partition a flight lives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightKind {
    Domestic,
    International,
}

impl FlightKind {
    pub const ALL: [FlightKind; 2] = [FlightKind::Domestic, FlightKind::International];

    pub fn tag(&self) -> char {
        match self {
            FlightKind::Domestic => 'D',
            FlightKind::International => 'I',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlightKind::Domestic => "DOMESTIC",
            FlightKind::International => "INTERNATIONAL",
        }
    }
}

impl FromStr for FlightKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DOMESTIC" => Ok(FlightKind::Domestic),
            "INTERNATIONAL" => Ok(FlightKind::International),
            other => Err(format!("unknown flight kind: {}", other)),
        }
    }
}

/// Typed flight identifier. Rendered and persisted as `D<digits>` / `I<digits>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FlightRef {
    pub kind: FlightKind,
    pub number: u32,
}

impl FlightRef {
    pub fn domestic(number: u32) -> Self {
        Self { kind: FlightKind::Domestic, number }
    }

    pub fn international(number: u32) -> Self {
        Self { kind: FlightKind::International, number }
    }
}

impl fmt::Display for FlightRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.tag(), self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid flight identifier: {0:?}")]
pub struct InvalidFlightRef(pub String);

impl FromStr for FlightRef {
    type Err = InvalidFlightRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let kind = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('D') => FlightKind::Domestic,
            Some('I') => FlightKind::International,
            _ => return Err(InvalidFlightRef(s.to_string())),
        };
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidFlightRef(s.to_string()));
        }
        let number = digits
            .parse::<u32>()
            .map_err(|_| InvalidFlightRef(s.to_string()))?;
        Ok(Self { kind, number })
    }
}

impl TryFrom<String> for FlightRef {
    type Error = InvalidFlightRef;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FlightRef> for String {
    fn from(value: FlightRef) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    Economy,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "ECONOMY",
            CabinClass::Business => "BUSINESS",
            CabinClass::First => "FIRST",
        }
    }

    /// Letter printed in front of the seat row.
    pub fn seat_prefix(&self) -> char {
        match self {
            CabinClass::Economy => 'Y',
            CabinClass::Business => 'B',
            CabinClass::First => 'F',
        }
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CabinClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ECONOMY" => Ok(CabinClass::Economy),
            "BUSINESS" => Ok(CabinClass::Business),
            "FIRST" => Ok(CabinClass::First),
            other => Err(format!("unknown cabin class: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    OnTime,
    Delayed,
}

impl FlightStatus {
    pub fn for_delay(delay_minutes: i32) -> Self {
        if delay_minutes > 0 {
            FlightStatus::Delayed
        } else {
            FlightStatus::OnTime
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::OnTime => "ON_TIME",
            FlightStatus::Delayed => "DELAYED",
        }
    }
}

impl FromStr for FlightStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON_TIME" => Ok(FlightStatus::OnTime),
            "DELAYED" => Ok(FlightStatus::Delayed),
            other => Err(format!("unknown flight status: {}", other)),
        }
    }
}

/// Fare per cabin. A zero fare means the cabin is not sold on this flight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct CabinFares {
    pub economy: Decimal,
    pub business: Decimal,
    pub first: Decimal,
}

impl CabinFares {
    pub fn get(&self, cabin: CabinClass) -> Decimal {
        match cabin {
            CabinClass::Economy => self.economy,
            CabinClass::Business => self.business,
            CabinClass::First => self.first,
        }
    }
}

/// Invariant: `0 <= available <= total`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SeatCount {
    pub total: i32,
    pub available: i32,
}

impl SeatCount {
    pub fn new(total: i32) -> Self {
        Self { total, available: total }
    }

    pub fn is_consistent(&self) -> bool {
        0 <= self.available && self.available <= self.total
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CabinSeats {
    pub economy: SeatCount,
    pub business: SeatCount,
    pub first: SeatCount,
}

impl CabinSeats {
    pub fn get(&self, cabin: CabinClass) -> SeatCount {
        match cabin {
            CabinClass::Economy => self.economy,
            CabinClass::Business => self.business,
            CabinClass::First => self.first,
        }
    }

    pub fn get_mut(&mut self, cabin: CabinClass) -> &mut SeatCount {
        match cabin {
            CabinClass::Economy => &mut self.economy,
            CabinClass::Business => &mut self.business,
            CabinClass::First => &mut self.first,
        }
    }
}

/// A scheduled flight as held by the catalog. The schedule repeats weekly, so the
/// departure is a time of day plus a weekday (0 = Monday).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub id: FlightRef,
    pub flight_no: String,
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub depart_time: NaiveTime,
    pub depart_weekday: i32,
    pub duration_minutes: i32,
    pub fares: CabinFares,
    pub seats: CabinSeats,
    pub delay_minutes: i32,
    pub status: FlightStatus,
}

impl Flight {
    pub fn kind(&self) -> FlightKind {
        self.id.kind
    }

    /// Scheduled departure instant when flown on `date` (UTC, seconds truncated).
    pub fn departure_on(&self, date: NaiveDate) -> DateTime<Utc> {
        combine_date_and_time(date, self.depart_time)
    }

    pub fn arrival_on(&self, date: NaiveDate) -> DateTime<Utc> {
        self.departure_on(date) + Duration::minutes(self.duration_minutes as i64)
    }
}

/// Schedule weekday of a calendar date, 0 = Monday.
pub fn schedule_weekday(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_monday() as i32
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightSearchRequest {
    pub origin: String,
    pub destination: String,
    pub trip_type: TripType,
    pub depart_date: NaiveDate,
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    pub passengers: i32,
    pub cabin_class: CabinClass,
}

/// A flight that can seat the requested party on a given date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightOffer {
    pub flight_id: FlightRef,
    pub flight_no: String,
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub departs_at: DateTime<Utc>,
    pub arrives_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub cabin_class: CabinClass,
    pub available_seats: i32,
    pub fare: Decimal,
}

impl FlightOffer {
    pub fn new(flight: &Flight, date: NaiveDate, cabin: CabinClass) -> Self {
        Self {
            flight_id: flight.id,
            flight_no: flight.flight_no.clone(),
            airline: flight.airline.clone(),
            origin: flight.origin.clone(),
            destination: flight.destination.clone(),
            departs_at: flight.departure_on(date),
            arrives_at: flight.arrival_on(date),
            duration_minutes: flight.duration_minutes,
            cabin_class: cabin,
            available_seats: flight.seats.get(cabin).available,
            fare: flight.fares.get(cabin),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightSearchResult {
    pub outbound_flights: Vec<FlightOffer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_flights: Option<Vec<FlightOffer>>,
}

/// Date of travel combined with a time of day, to the minute.
pub fn combine_date_and_time(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    use chrono::Timelike;
    let time = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time);
    date.and_time(time).and_utc()
}
