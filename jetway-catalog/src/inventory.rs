use jetway_core::error::{BookingError, BookingResult, StoreError};
use jetway_core::flight::{CabinClass, Flight, FlightRef};
use jetway_core::repository::{FlightCatalog, UnitOfWork};
use tracing::{debug, warn};

/// Per-(flight, cabin) available-seat counters.
///
/// Checks are advisory reads; the real guard is the store's conditional update, which runs
/// inside the caller's unit of work and never commits on its own.
pub struct SeatInventory;

impl SeatInventory {
    /// Read-only check against an already loaded flight.
    pub fn ensure_available(flight: &Flight, cabin: CabinClass, requested: i32) -> BookingResult<()> {
        let available = flight.seats.get(cabin).available;
        if available < requested {
            return Err(BookingError::InsufficientSeats {
                flight: flight.id,
                cabin,
                available,
                requested,
            });
        }
        Ok(())
    }

    /// Read-only check that resolves the flight first. Returns the current available count.
    pub async fn check_availability<C>(
        catalog: &C,
        flight_id: FlightRef,
        cabin: CabinClass,
        requested: i32,
    ) -> BookingResult<i32>
    where
        C: FlightCatalog + ?Sized,
    {
        let flight = catalog
            .get_flight(flight_id)
            .await?
            .ok_or(BookingError::FlightNotFound(flight_id))?;
        Self::ensure_available(&flight, cabin, requested)?;
        Ok(flight.seats.get(cabin).available)
    }

    /// Take `count` seats inside `uow`. A lost race aborts the unit of work.
    pub async fn decrement(
        uow: &mut dyn UnitOfWork,
        flight: FlightRef,
        cabin: CabinClass,
        count: i32,
    ) -> BookingResult<i32> {
        Self::adjust(uow, flight, cabin, -count).await
    }

    /// Give `count` seats back inside `uow`.
    pub async fn increment(
        uow: &mut dyn UnitOfWork,
        flight: FlightRef,
        cabin: CabinClass,
        count: i32,
    ) -> BookingResult<i32> {
        Self::adjust(uow, flight, cabin, count).await
    }

    async fn adjust(
        uow: &mut dyn UnitOfWork,
        flight: FlightRef,
        cabin: CabinClass,
        delta: i32,
    ) -> BookingResult<i32> {
        match uow.adjust_seats(flight, cabin, delta).await {
            Ok(remaining) => {
                debug!(%flight, %cabin, delta, remaining, "seat counter adjusted");
                Ok(remaining)
            }
            Err(e @ StoreError::SeatUpdateRejected { .. }) => {
                warn!(%flight, %cabin, delta, "conditional seat update rejected");
                Err(BookingError::TransactionAborted(e.to_string()))
            }
            Err(StoreError::NotFound(_)) => Err(BookingError::FlightNotFound(flight)),
            Err(e) => Err(e.into()),
        }
    }
}
