use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jetway_core::booking::{
    Booking, BookingHistoryQuery, BookingLeg, BookingPassenger, BookingStatus, NewBooking,
    NewTicket, SortOrder, Ticket, TicketHolder, TicketStatus, TicketWithLeg,
};
use jetway_core::error::StoreError;
use jetway_core::flight::{CabinClass, Flight, FlightKind, FlightRef, FlightStatus};
use jetway_core::repository::{BookingStore, FlightCatalog, UnitOfWork};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct State {
    flights: HashMap<FlightRef, Flight>,
    users: HashMap<i64, String>,
    bookings: BTreeMap<i64, Booking>,
    row_locks: HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.bookings.values().flat_map(|b| b.tickets())
    }
}

/// In-process store with the same transactional behaviour as the PostgreSQL one:
/// seat counters are changed with a guarded update and restored if the unit of work
/// does not commit, every other write becomes visible only on commit, and
/// `lock_booking` holds a per-booking lock until the unit of work ends.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock_state(&self.state)
    }

    pub fn add_flight(&self, flight: Flight) {
        self.lock().flights.insert(flight.id, flight);
    }

    pub fn add_user(&self, user_id: i64, email: &str) {
        self.lock().users.insert(user_id, email.to_string());
    }

    /// Snapshot of a flight as committed (plus any in-flight seat changes).
    pub fn flight(&self, id: FlightRef) -> Option<Flight> {
        self.lock().flights.get(&id).cloned()
    }

    pub fn booking_count(&self) -> usize {
        self.lock().bookings.len()
    }

    pub fn ticket_count(&self) -> usize {
        self.lock().tickets().count()
    }

    pub fn passenger_count(&self) -> usize {
        self.lock().bookings.values().map(|b| b.passengers.len()).sum()
    }
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    // A panic while holding the lock cannot leave State half-written: every mutation
    // is a single insert or counter update.
    state.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl FlightCatalog for MemoryStore {
    async fn get_flight(&self, id: FlightRef) -> Result<Option<Flight>, StoreError> {
        Ok(self.lock().flights.get(&id).cloned())
    }

    async fn search_flights(
        &self,
        origin: &str,
        destination: &str,
        weekday: i32,
    ) -> Result<Vec<Flight>, StoreError> {
        let state = self.lock();
        let mut found: Vec<Flight> = state
            .flights
            .values()
            .filter(|f| f.origin == origin && f.destination == destination && f.depart_weekday == weekday)
            .cloned()
            .collect();
        found.sort_by_key(|f| (f.id.kind != FlightKind::Domestic, f.id.number));
        Ok(found)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnitOfWork {
            state: self.state.clone(),
            seat_undo: Vec::new(),
            staged: Vec::new(),
            row_guards: Vec::new(),
        }))
    }

    async fn find_booking(&self, booking_number: Uuid, user_id: i64) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .lock()
            .bookings
            .values()
            .find(|b| b.booking_number == booking_number && b.user_id == user_id)
            .cloned())
    }

    async fn list_bookings(
        &self,
        user_id: i64,
        query: &BookingHistoryQuery,
    ) -> Result<(Vec<Booking>, u64), StoreError> {
        let state = self.lock();
        let mut matching: Vec<&Booking> = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .filter(|b| query.status.map_or(true, |s| b.status == s))
            .filter(|b| query.trip_type.map_or(true, |t| b.trip_type == t))
            .collect();

        matching.sort_by_key(|b| (b.created_at, b.id));
        if query.sort_order == SortOrder::Desc {
            matching.reverse();
        }

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit.max(1) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find_ticket(&self, ticket_number: &str) -> Result<Option<TicketWithLeg>, StoreError> {
        let state = self.lock();
        for booking in state.bookings.values() {
            if let Some(ticket) = booking.tickets().find(|t| t.ticket_number == ticket_number) {
                let departs_at = booking
                    .legs
                    .iter()
                    .find(|l| l.id == ticket.leg_id)
                    .map(|l| l.departs_at)
                    .ok_or_else(|| StoreError::Backend(format!("ticket {} has no leg", ticket_number)))?;
                return Ok(Some(TicketWithLeg {
                    ticket: ticket.clone(),
                    departs_at,
                }));
            }
        }
        Ok(None)
    }

    async fn ticket_holders(
        &self,
        flight: FlightRef,
        after: DateTime<Utc>,
    ) -> Result<Vec<TicketHolder>, StoreError> {
        let state = self.lock();
        let mut holders = Vec::new();
        for booking in state.bookings.values() {
            for passenger in &booking.passengers {
                for ticket in passenger
                    .tickets
                    .iter()
                    .filter(|t| t.flight_id == flight && t.status == BookingStatus::Confirmed)
                {
                    let Some(leg) = booking.legs.iter().find(|l| l.id == ticket.leg_id) else {
                        continue;
                    };
                    if leg.departs_at > after {
                        holders.push(TicketHolder {
                            user_id: booking.user_id,
                            ticket_number: ticket.ticket_number.clone(),
                            passenger_name: passenger.full_name(),
                            departs_at: leg.departs_at,
                        });
                    }
                }
            }
        }
        Ok(holders)
    }

    async fn user_email(&self, user_id: i64) -> Result<Option<String>, StoreError> {
        Ok(self.lock().users.get(&user_id).cloned())
    }
}

/// Checks every staged ticket against the bookings it will land in, committed or staged,
/// so that a commit either applies all of its writes or none of them.
fn validate_staged(state: &State, staged: &[Staged]) -> Result<(), StoreError> {
    let staged_bookings: HashMap<i64, &Booking> = staged
        .iter()
        .filter_map(|s| match s {
            Staged::Booking(b) => Some((b.id, b)),
            _ => None,
        })
        .collect();

    for write in staged {
        let Staged::Tickets(tickets) = write else {
            continue;
        };
        for ticket in tickets {
            let booking = state
                .bookings
                .get(&ticket.booking_id)
                .or_else(|| staged_bookings.get(&ticket.booking_id).copied());
            let Some(booking) = booking else {
                return Err(StoreError::Backend(format!(
                    "ticket {} references unknown booking {}",
                    ticket.ticket_number, ticket.booking_id
                )));
            };
            if !booking.passengers.iter().any(|p| p.id == ticket.passenger_id) {
                return Err(StoreError::Backend(format!(
                    "ticket {} references unknown passenger {}",
                    ticket.ticket_number, ticket.passenger_id
                )));
            }
            if !booking.legs.iter().any(|l| l.id == ticket.leg_id) {
                return Err(StoreError::Backend(format!(
                    "ticket {} references unknown leg {}",
                    ticket.ticket_number, ticket.leg_id
                )));
            }
        }
    }
    Ok(())
}

/// Writes held back until commit.
enum Staged {
    Booking(Booking),
    Tickets(Vec<Ticket>),
    BookingStatus(i64, BookingStatus),
    TicketStatus(i64, TicketStatus),
    FlightDelay(FlightRef, i32, FlightStatus),
}

pub struct MemoryUnitOfWork {
    state: Arc<Mutex<State>>,
    /// Applied seat deltas, reverted unless the unit of work commits.
    seat_undo: Vec<(FlightRef, CabinClass, i32)>,
    staged: Vec<Staged>,
    row_guards: Vec<OwnedMutexGuard<()>>,
}

impl MemoryUnitOfWork {
    fn staged_bookings(&self) -> impl Iterator<Item = &Booking> {
        self.staged.iter().filter_map(|s| match s {
            Staged::Booking(b) => Some(b),
            _ => None,
        })
    }

    fn staged_tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.staged.iter().flat_map(|s| match s {
            Staged::Tickets(t) => t.as_slice(),
            _ => &[],
        })
    }

    fn revert_seats(&mut self) {
        if self.seat_undo.is_empty() {
            return;
        }
        let mut state = lock_state(&self.state);
        for (flight, cabin, delta) in self.seat_undo.drain(..).rev() {
            if let Some(f) = state.flights.get_mut(&flight) {
                f.seats.get_mut(cabin).available -= delta;
            }
        }
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        self.revert_seats();
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_booking(&mut self, booking: &NewBooking) -> Result<Booking, StoreError> {
        let mut state = lock_state(&self.state);
        let taken = state
            .bookings
            .values()
            .chain(self.staged_bookings())
            .any(|b| b.booking_number == booking.booking_number);
        if taken {
            return Err(StoreError::Conflict(format!("booking number {}", booking.booking_number)));
        }

        let id = state.next_id();
        let legs = booking
            .legs
            .iter()
            .map(|leg| BookingLeg {
                id: state.next_id(),
                booking_id: id,
                flight_id: leg.flight_id,
                flight_kind: leg.flight_id.kind,
                direction: leg.direction,
                cabin_class: leg.cabin_class,
                departs_at: leg.departs_at,
                fare_amount: leg.fare_amount,
            })
            .collect();
        let passengers = booking
            .passengers
            .iter()
            .map(|p| BookingPassenger {
                id: state.next_id(),
                booking_id: id,
                first_name: p.first_name.clone(),
                last_name: p.last_name.clone(),
                passenger_type: p.passenger_type,
                gender: p.gender,
                dob: p.dob,
                passport_number: p.passport_number.clone(),
                passport_expiry: p.passport_expiry,
                nationality: p.nationality.clone(),
                tickets: Vec::new(),
            })
            .collect();
        drop(state);

        let created = Booking {
            id,
            booking_number: booking.booking_number,
            user_id: booking.user_id,
            trip_type: booking.trip_type,
            cabin_class: booking.cabin_class.clone(),
            total_amount: booking.total_amount,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
            legs,
            passengers,
        };
        self.staged.push(Staged::Booking(created.clone()));
        Ok(created)
    }

    async fn insert_tickets(&mut self, tickets: &[NewTicket]) -> Result<Vec<Ticket>, StoreError> {
        let mut state = lock_state(&self.state);
        let mut issued: Vec<Ticket> = Vec::with_capacity(tickets.len());

        for t in tickets {
            let clash = state
                .tickets()
                .chain(self.staged_tickets())
                .chain(issued.iter())
                .find(|existing| existing.ticket_number == t.ticket_number || existing.barcode == t.barcode);
            if let Some(existing) = clash {
                return Err(StoreError::Conflict(format!("ticket token {}", existing.ticket_number)));
            }

            issued.push(Ticket {
                id: state.next_id(),
                ticket_number: t.ticket_number.clone(),
                booking_id: t.booking_id,
                passenger_id: t.passenger_id,
                flight_id: t.flight_id,
                leg_id: t.leg_id,
                seat_number: t.seat_number.clone(),
                gate: t.gate.clone(),
                barcode: t.barcode.clone(),
                status: BookingStatus::Confirmed,
            });
        }
        drop(state);

        self.staged.push(Staged::Tickets(issued.clone()));
        Ok(issued)
    }

    async fn adjust_seats(
        &mut self,
        flight: FlightRef,
        cabin: CabinClass,
        delta: i32,
    ) -> Result<i32, StoreError> {
        let mut state = lock_state(&self.state);
        let record = state
            .flights
            .get_mut(&flight)
            .ok_or_else(|| StoreError::NotFound(format!("flight {}", flight)))?;

        let seats = record.seats.get_mut(cabin);
        let next = seats.available + delta;
        if next < 0 || next > seats.total {
            return Err(StoreError::SeatUpdateRejected { flight, cabin, delta });
        }
        seats.available = next;
        drop(state);

        self.seat_undo.push((flight, cabin, delta));
        debug!(%flight, %cabin, delta, remaining = next, "memory seat counter adjusted");
        Ok(next)
    }

    async fn lock_booking(&mut self, booking_number: Uuid, user_id: i64) -> Result<Option<Booking>, StoreError> {
        let row_lock = {
            let mut state = lock_state(&self.state);
            let exists = state
                .bookings
                .values()
                .any(|b| b.booking_number == booking_number && b.user_id == user_id);
            if !exists {
                return Ok(None);
            }
            state.row_locks.entry(booking_number).or_default().clone()
        };

        let guard = row_lock.lock_owned().await;
        self.row_guards.push(guard);

        // Re-read after the lock: a concurrent holder may have committed a change.
        Ok(lock_state(&self.state)
            .bookings
            .values()
            .find(|b| b.booking_number == booking_number && b.user_id == user_id)
            .cloned())
    }

    async fn set_booking_status(&mut self, booking_id: i64, status: BookingStatus) -> Result<(), StoreError> {
        let known = lock_state(&self.state).bookings.contains_key(&booking_id)
            || self.staged_bookings().any(|b| b.id == booking_id);
        if !known {
            return Err(StoreError::NotFound(format!("booking id {}", booking_id)));
        }
        self.staged.push(Staged::BookingStatus(booking_id, status));
        Ok(())
    }

    async fn set_ticket_status(&mut self, booking_id: i64, status: TicketStatus) -> Result<u64, StoreError> {
        let committed = lock_state(&self.state)
            .bookings
            .get(&booking_id)
            .map(|b| b.tickets().count())
            .unwrap_or(0);
        let staged = self.staged_tickets().filter(|t| t.booking_id == booking_id).count();
        self.staged.push(Staged::TicketStatus(booking_id, status));
        Ok((committed + staged) as u64)
    }

    async fn set_flight_delay(
        &mut self,
        flight: FlightRef,
        delay_minutes: i32,
        status: FlightStatus,
    ) -> Result<Option<Flight>, StoreError> {
        let current = lock_state(&self.state).flights.get(&flight).cloned();
        let Some(mut updated) = current else {
            return Ok(None);
        };
        updated.delay_minutes = delay_minutes;
        updated.status = status;
        self.staged.push(Staged::FlightDelay(flight, delay_minutes, status));
        Ok(Some(updated))
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let mut state = lock_state(&self.state);
        validate_staged(&state, &self.staged)?;

        for write in std::mem::take(&mut self.staged) {
            match write {
                Staged::Booking(booking) => {
                    state.bookings.insert(booking.id, booking);
                }
                Staged::Tickets(tickets) => {
                    for ticket in tickets {
                        let passenger = state
                            .bookings
                            .get_mut(&ticket.booking_id)
                            .and_then(|b| b.passengers.iter_mut().find(|p| p.id == ticket.passenger_id));
                        if let Some(p) = passenger {
                            p.tickets.push(ticket);
                        }
                    }
                }
                Staged::BookingStatus(id, status) => {
                    if let Some(b) = state.bookings.get_mut(&id) {
                        b.status = status;
                    }
                }
                Staged::TicketStatus(booking_id, status) => {
                    if let Some(b) = state.bookings.get_mut(&booking_id) {
                        for p in &mut b.passengers {
                            for t in &mut p.tickets {
                                t.status = status;
                            }
                        }
                    }
                }
                Staged::FlightDelay(flight, delay, status) => {
                    if let Some(f) = state.flights.get_mut(&flight) {
                        f.delay_minutes = delay;
                        f.status = status;
                    }
                }
            }
        }
        drop(state);

        // Seat changes are now permanent; releasing the row locks happens on drop.
        self.seat_undo.clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Drop reverts the seat changes and releases row locks; staged writes are discarded.
        Ok(())
    }
}
