#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use jetway_booking::{
    BookingOrchestrator, BookingPolicy, CancellationEngine, FlightOperations, NotificationDispatcher,
};
use jetway_catalog::FareEngine;
use jetway_core::booking::{
    Booking, BookingHistoryQuery, BookingStatus, CreateBookingRequest, Gender, LegSelection,
    NewBooking, NewTicket, PassengerInfo, PassengerType, Ticket, TicketHolder, TicketStatus,
    TicketWithLeg, TripType,
};
use jetway_core::error::StoreError;
use jetway_core::flight::{
    CabinClass, CabinFares, CabinSeats, Flight, FlightRef, FlightStatus, SeatCount,
};
use jetway_core::notify::{NotificationSink, NotifyError};
use jetway_core::repository::{BookingStore, FlightCatalog, UnitOfWork};
use jetway_shared::models::events::NotificationEnvelope;
use jetway_store::MemoryStore;
use rust_decimal::Decimal;
use uuid::Uuid;

pub const USER: i64 = 1;

pub fn flight(id: FlightRef, economy_fare: i64, economy_seats: i32) -> Flight {
    Flight {
        id,
        flight_no: format!("JW{}", id.number),
        airline: "Jetway".to_string(),
        origin: "HAN".to_string(),
        destination: "SGN".to_string(),
        depart_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        depart_weekday: 0,
        duration_minutes: 120,
        fares: CabinFares {
            economy: Decimal::from(economy_fare),
            business: Decimal::from(economy_fare * 3),
            ..Default::default()
        },
        seats: CabinSeats {
            economy: SeatCount::new(economy_seats),
            business: SeatCount::new(8),
            ..Default::default()
        },
        delay_minutes: 0,
        status: FlightStatus::OnTime,
    }
}

pub fn days_ahead(days: i64) -> NaiveDate {
    (Utc::now() + chrono::Duration::days(days)).date_naive()
}

pub fn passenger(name: &str, passenger_type: PassengerType) -> PassengerInfo {
    PassengerInfo {
        first_name: name.to_string(),
        last_name: "Tran".to_string(),
        passenger_type,
        gender: Gender::Female,
        dob: NaiveDate::from_ymd_opt(1992, 3, 14).unwrap(),
        passport_number: None,
        passport_expiry: None,
        nationality: None,
    }
}

pub fn adults(count: usize) -> Vec<PassengerInfo> {
    (0..count)
        .map(|i| passenger(&format!("Lan{}", i), PassengerType::Adult))
        .collect()
}

pub fn one_way(flight_id: FlightRef, passengers: Vec<PassengerInfo>) -> CreateBookingRequest {
    CreateBookingRequest {
        trip_type: TripType::OneWay,
        outbound_flight: LegSelection {
            flight_id,
            cabin_class: CabinClass::Economy,
            date: days_ahead(14),
        },
        return_flight: None,
        passengers,
    }
}

pub fn round_trip(
    outbound: FlightRef,
    inbound: FlightRef,
    passengers: Vec<PassengerInfo>,
) -> CreateBookingRequest {
    CreateBookingRequest {
        trip_type: TripType::RoundTrip,
        outbound_flight: LegSelection {
            flight_id: outbound,
            cabin_class: CabinClass::Economy,
            date: days_ahead(14),
        },
        return_flight: Some(LegSelection {
            flight_id: inbound,
            cabin_class: CabinClass::Economy,
            date: days_ahead(21),
        }),
        passengers,
    }
}

pub fn available(store: &MemoryStore, id: FlightRef) -> i32 {
    store.flight(id).unwrap().seats.economy.available
}

/// Sink that keeps every delivered envelope.
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<NotificationEnvelope>>,
}

impl RecordingSink {
    pub fn keys(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event.key().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), NotifyError> {
        self.delivered.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

/// Sink whose channel is always down.
pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn deliver(&self, _envelope: &NotificationEnvelope) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable("mail relay unreachable".to_string()))
    }
}

/// Wait until the background worker has delivered `expected` envelopes.
pub async fn wait_for(sink: &RecordingSink, expected: usize) {
    for _ in 0..100 {
        if sink.len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub orchestrator: BookingOrchestrator,
    pub cancellations: CancellationEngine,
    pub flights: FlightOperations,
}

impl Harness {
    pub fn new(store: MemoryStore, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_backend(store.clone(), Arc::new(store), sink)
    }

    pub fn with_backend(
        store: MemoryStore,
        backend: Arc<dyn BookingStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (notifier, _worker) = NotificationDispatcher::spawn(backend.clone(), sink, 64);
        let policy = BookingPolicy::default();
        let timeout = policy.transaction_timeout;
        Self {
            orchestrator: BookingOrchestrator::new(
                backend.clone(),
                FareEngine::default(),
                notifier.clone(),
                policy,
            ),
            cancellations: CancellationEngine::new(backend.clone(), notifier.clone(), timeout),
            flights: FlightOperations::new(backend, notifier, timeout),
            store,
        }
    }
}

/// Where `FaultyStore` makes its unit of work fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    InsertBooking,
    AdjustSeats { after: usize },
    InsertTickets,
    Commit,
    /// The first seat update succeeds, then the unit of work hangs.
    Stall,
    /// Every seat update loses its race.
    Contention,
}

/// Delegates to a `MemoryStore` but breaks one step of every unit of work.
pub struct FaultyStore {
    inner: MemoryStore,
    fail_at: FailAt,
    begun: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore, fail_at: FailAt) -> Self {
        Self {
            inner,
            fail_at,
            begun: AtomicUsize::new(0),
        }
    }

    /// Units of work opened so far.
    pub fn begun(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }
}

fn injected() -> StoreError {
    StoreError::Backend("injected failure".to_string())
}

#[async_trait]
impl FlightCatalog for FaultyStore {
    async fn get_flight(&self, id: FlightRef) -> Result<Option<Flight>, StoreError> {
        self.inner.get_flight(id).await
    }

    async fn search_flights(
        &self,
        origin: &str,
        destination: &str,
        weekday: i32,
    ) -> Result<Vec<Flight>, StoreError> {
        self.inner.search_flights(origin, destination, weekday).await
    }
}

#[async_trait]
impl BookingStore for FaultyStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FaultyUnitOfWork {
            inner: self.inner.begin().await?,
            fail_at: self.fail_at,
            seat_updates: 0,
        }))
    }

    async fn find_booking(&self, booking_number: Uuid, user_id: i64) -> Result<Option<Booking>, StoreError> {
        self.inner.find_booking(booking_number, user_id).await
    }

    async fn list_bookings(
        &self,
        user_id: i64,
        query: &BookingHistoryQuery,
    ) -> Result<(Vec<Booking>, u64), StoreError> {
        self.inner.list_bookings(user_id, query).await
    }

    async fn find_ticket(&self, ticket_number: &str) -> Result<Option<TicketWithLeg>, StoreError> {
        self.inner.find_ticket(ticket_number).await
    }

    async fn ticket_holders(
        &self,
        flight: FlightRef,
        after: DateTime<Utc>,
    ) -> Result<Vec<TicketHolder>, StoreError> {
        self.inner.ticket_holders(flight, after).await
    }

    async fn user_email(&self, user_id: i64) -> Result<Option<String>, StoreError> {
        self.inner.user_email(user_id).await
    }
}

struct FaultyUnitOfWork {
    inner: Box<dyn UnitOfWork>,
    fail_at: FailAt,
    seat_updates: usize,
}

#[async_trait]
impl UnitOfWork for FaultyUnitOfWork {
    async fn insert_booking(&mut self, booking: &NewBooking) -> Result<Booking, StoreError> {
        if self.fail_at == FailAt::InsertBooking {
            return Err(injected());
        }
        self.inner.insert_booking(booking).await
    }

    async fn insert_tickets(&mut self, tickets: &[NewTicket]) -> Result<Vec<Ticket>, StoreError> {
        if self.fail_at == FailAt::InsertTickets {
            return Err(injected());
        }
        self.inner.insert_tickets(tickets).await
    }

    async fn adjust_seats(
        &mut self,
        flight: FlightRef,
        cabin: CabinClass,
        delta: i32,
    ) -> Result<i32, StoreError> {
        match self.fail_at {
            FailAt::AdjustSeats { after } if self.seat_updates >= after => return Err(injected()),
            FailAt::Contention => return Err(StoreError::SeatUpdateRejected { flight, cabin, delta }),
            _ => {}
        }
        self.seat_updates += 1;
        let remaining = self.inner.adjust_seats(flight, cabin, delta).await?;
        if self.fail_at == FailAt::Stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(remaining)
    }

    async fn lock_booking(
        &mut self,
        booking_number: Uuid,
        user_id: i64,
    ) -> Result<Option<Booking>, StoreError> {
        self.inner.lock_booking(booking_number, user_id).await
    }

    async fn set_booking_status(&mut self, booking_id: i64, status: BookingStatus) -> Result<(), StoreError> {
        self.inner.set_booking_status(booking_id, status).await
    }

    async fn set_ticket_status(&mut self, booking_id: i64, status: TicketStatus) -> Result<u64, StoreError> {
        self.inner.set_ticket_status(booking_id, status).await
    }

    async fn set_flight_delay(
        &mut self,
        flight: FlightRef,
        delay_minutes: i32,
        status: FlightStatus,
    ) -> Result<Option<Flight>, StoreError> {
        self.inner.set_flight_delay(flight, delay_minutes, status).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_at == FailAt::Commit {
            self.inner.rollback().await?;
            return Err(injected());
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}
