use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{
    Booking, BookingHistoryQuery, BookingStatus, NewBooking, NewTicket, Ticket, TicketHolder,
    TicketStatus, TicketWithLeg,
};
use crate::error::StoreError;
use crate::flight::{CabinClass, Flight, FlightRef, FlightStatus};

/// Read-only access to the flight catalog (both partitions).
#[async_trait]
pub trait FlightCatalog: Send + Sync {
    async fn get_flight(&self, id: FlightRef) -> Result<Option<Flight>, StoreError>;

    /// Flights on the route that depart on `weekday` (0 = Monday), across both partitions.
    async fn search_flights(
        &self,
        origin: &str,
        destination: &str,
        weekday: i32,
    ) -> Result<Vec<Flight>, StoreError>;
}

/// Persistence for the booking aggregate.
#[async_trait]
pub trait BookingStore: FlightCatalog {
    /// Open an atomic unit of work. Dropping it without `commit` discards every change.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn find_booking(
        &self,
        booking_number: Uuid,
        user_id: i64,
    ) -> Result<Option<Booking>, StoreError>;

    /// One page of a user's bookings plus the unpaged total.
    async fn list_bookings(
        &self,
        user_id: i64,
        query: &BookingHistoryQuery,
    ) -> Result<(Vec<Booking>, u64), StoreError>;

    async fn find_ticket(&self, ticket_number: &str) -> Result<Option<TicketWithLeg>, StoreError>;

    /// Confirmed tickets on `flight` whose leg departs after `after`.
    async fn ticket_holders(
        &self,
        flight: FlightRef,
        after: DateTime<Utc>,
    ) -> Result<Vec<TicketHolder>, StoreError>;

    async fn user_email(&self, user_id: i64) -> Result<Option<String>, StoreError>;
}

/// One atomic transaction against the store.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Insert the booking with its legs and passengers; returns it with store-assigned ids.
    async fn insert_booking(&mut self, booking: &NewBooking) -> Result<Booking, StoreError>;

    async fn insert_tickets(&mut self, tickets: &[NewTicket]) -> Result<Vec<Ticket>, StoreError>;

    /// Conditional `available += delta`. Must fail with `SeatUpdateRejected` instead of
    /// leaving the counter outside `[0, total]`. Returns the new available count.
    async fn adjust_seats(
        &mut self,
        flight: FlightRef,
        cabin: CabinClass,
        delta: i32,
    ) -> Result<i32, StoreError>;

    /// Load a booking for update, scoped to its owner.
    async fn lock_booking(
        &mut self,
        booking_number: Uuid,
        user_id: i64,
    ) -> Result<Option<Booking>, StoreError>;

    async fn set_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
    ) -> Result<(), StoreError>;

    /// Returns the number of tickets touched.
    async fn set_ticket_status(
        &mut self,
        booking_id: i64,
        status: TicketStatus,
    ) -> Result<u64, StoreError>;

    async fn set_flight_delay(
        &mut self,
        flight: FlightRef,
        delay_minutes: i32,
        status: FlightStatus,
    ) -> Result<Option<Flight>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
