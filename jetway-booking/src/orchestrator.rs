use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use jetway_catalog::{FareEngine, SeatInventory};
use jetway_core::booking::{
    cabin_descriptor, Booking, CreateBookingRequest, Direction, LegSelection, NewBooking, NewLeg,
    PassengerInfo, TripType,
};
use jetway_core::error::{BookingError, BookingResult};
use jetway_core::flight::{CabinClass, Flight, FlightRef};
use jetway_core::repository::{BookingStore, UnitOfWork};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::notifications::{Notification, NotificationDispatcher};
use crate::tickets::TicketIssuer;
use crate::uow::{abort_on_contention, finish, within};

/// Knobs for booking creation.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// Upper bound for one attempt's unit of work.
    pub transaction_timeout: Duration,
    /// Attempts made when a unit of work is aborted by contention.
    pub max_attempts: u32,
    /// Reject round trips whose return date is not strictly after the outbound date.
    pub require_return_after_departure: bool,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            transaction_timeout: Duration::from_secs(10),
            max_attempts: 3,
            require_return_after_departure: true,
        }
    }
}

/// A leg whose flight has been resolved and priced.
#[derive(Debug, Clone)]
struct PlannedLeg {
    flight: Flight,
    direction: Direction,
    cabin: CabinClass,
    date: NaiveDate,
    fare: Decimal,
}

#[derive(Debug, Clone)]
struct Plan {
    legs: Vec<PlannedLeg>,
    total: Decimal,
}

/// Turns an itinerary selection into a committed booking with its tickets.
pub struct BookingOrchestrator {
    store: Arc<dyn BookingStore>,
    fares: FareEngine,
    issuer: TicketIssuer,
    notifier: NotificationDispatcher,
    policy: BookingPolicy,
}

impl BookingOrchestrator {
    pub fn new(
        store: Arc<dyn BookingStore>,
        fares: FareEngine,
        notifier: NotificationDispatcher,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            store,
            fares,
            issuer: TicketIssuer::new(),
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    pub async fn create_booking(
        &self,
        user_id: i64,
        request: CreateBookingRequest,
    ) -> BookingResult<Booking> {
        let selections = self.selections(&request)?;
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            // Re-planned on every attempt so a retry sees the counters the last attempt lost to.
            let plan = self.plan(&selections, &request.passengers).await?;
            let work = self.execute(user_id, request.trip_type, &plan, &request.passengers);

            match within(self.policy.transaction_timeout, work).await {
                Ok(booking) => {
                    info!(
                        booking_number = %booking.booking_number,
                        user_id,
                        total = %booking.total_amount,
                        passengers = booking.passengers.len(),
                        attempt,
                        "Booking confirmed"
                    );
                    let flights: Vec<Flight> = plan.legs.into_iter().map(|l| l.flight).collect();
                    let events = self.issuer.issued_events(&booking, &flights);
                    self.notifier.dispatch(Notification { user_id, events });
                    return Ok(booking);
                }
                Err(BookingError::TransactionAborted(reason)) if attempt < max_attempts => {
                    warn!(user_id, attempt, %reason, "booking attempt aborted, retrying");
                }
                Err(e) => {
                    warn!(user_id, attempt, reason = e.reason(), error = %e, "booking rejected");
                    return Err(e);
                }
            }
        }
    }

    /// Shape checks that need no I/O. Returns the legs to book in travel order.
    fn selections<'a>(
        &self,
        request: &'a CreateBookingRequest,
    ) -> BookingResult<Vec<(Direction, &'a LegSelection)>> {
        if request.passengers.is_empty() {
            return Err(BookingError::NoPassengers);
        }

        let mut legs = vec![(Direction::Outbound, &request.outbound_flight)];
        match (request.trip_type, &request.return_flight) {
            (TripType::RoundTrip, None) => return Err(BookingError::MissingReturnLeg),
            (TripType::RoundTrip, Some(ret)) => {
                let departure = request.outbound_flight.date;
                if self.policy.require_return_after_departure && ret.date <= departure {
                    return Err(BookingError::InvalidReturnDate {
                        departure,
                        return_date: ret.date,
                    });
                }
                legs.push((Direction::Return, ret));
            }
            (TripType::OneWay, Some(ret)) => {
                warn!(flight = %ret.flight_id, "return leg on a one-way request ignored");
            }
            (TripType::OneWay, None) => {}
        }
        Ok(legs)
    }

    /// Resolve flights, price them and check availability. Reads only.
    async fn plan(
        &self,
        selections: &[(Direction, &LegSelection)],
        passengers: &[PassengerInfo],
    ) -> BookingResult<Plan> {
        let mut legs = Vec::with_capacity(selections.len());
        for (direction, selection) in selections {
            let flight = self
                .store
                .get_flight(selection.flight_id)
                .await?
                .ok_or(BookingError::FlightNotFound(selection.flight_id))?;
            let fare = self.fares.fare(&flight, selection.cabin_class)?;
            legs.push(PlannedLeg {
                flight,
                direction: *direction,
                cabin: selection.cabin_class,
                date: selection.date,
                fare,
            });
        }

        // Both legs are checked before anything is written. A round trip on the same
        // flight and cabin needs the seats twice.
        let count = passengers.len() as i32;
        let mut demand: HashMap<(FlightRef, CabinClass), i32> = HashMap::new();
        for leg in &legs {
            let requested = demand.entry((leg.flight.id, leg.cabin)).or_insert(0);
            *requested += count;
            SeatInventory::ensure_available(&leg.flight, leg.cabin, *requested)?;
        }

        let outbound = legs
            .iter()
            .find(|l| l.direction == Direction::Outbound)
            .map(|l| (&l.flight, l.cabin))
            .ok_or(BookingError::MissingReturnLeg)?;
        let inbound = legs
            .iter()
            .find(|l| l.direction == Direction::Return)
            .map(|l| (&l.flight, l.cabin));
        let total = self.fares.total_price(outbound, inbound, passengers)?;

        Ok(Plan { legs, total })
    }

    async fn execute(
        &self,
        user_id: i64,
        trip_type: TripType,
        plan: &Plan,
        passengers: &[PassengerInfo],
    ) -> BookingResult<Booking> {
        let mut uow = self.store.begin().await.map_err(abort_on_contention)?;
        let result = self
            .write(uow.as_mut(), user_id, trip_type, plan, passengers)
            .await;
        finish(uow, result).await
    }

    async fn write(
        &self,
        uow: &mut dyn UnitOfWork,
        user_id: i64,
        trip_type: TripType,
        plan: &Plan,
        passengers: &[PassengerInfo],
    ) -> BookingResult<Booking> {
        let outbound_cabin = plan
            .legs
            .iter()
            .find(|l| l.direction == Direction::Outbound)
            .map(|l| l.cabin)
            .ok_or(BookingError::MissingReturnLeg)?;
        let return_cabin = plan
            .legs
            .iter()
            .find(|l| l.direction == Direction::Return)
            .map(|l| l.cabin);

        let new_booking = NewBooking {
            booking_number: Uuid::new_v4(),
            user_id,
            trip_type,
            cabin_class: cabin_descriptor(outbound_cabin, return_cabin),
            total_amount: plan.total,
            legs: plan
                .legs
                .iter()
                .map(|l| NewLeg {
                    flight_id: l.flight.id,
                    direction: l.direction,
                    cabin_class: l.cabin,
                    departs_at: l.flight.departure_on(l.date),
                    fare_amount: l.fare,
                })
                .collect(),
            passengers: passengers.to_vec(),
        };

        let mut booking = uow
            .insert_booking(&new_booking)
            .await
            .map_err(abort_on_contention)?;

        let count = passengers.len() as i32;
        for leg in &plan.legs {
            SeatInventory::decrement(uow, leg.flight.id, leg.cabin, count).await?;
        }

        self.issuer.issue(uow, &mut booking).await?;
        Ok(booking)
    }
}
