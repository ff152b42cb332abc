use chrono::NaiveDate;

use crate::flight::{CabinClass, FlightRef};

/// Failures raised by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A guarded seat update matched no row: the counter moved under us.
    #[error("Seat counter for {flight} {cabin} rejected a change of {delta}")]
    SeatUpdateRejected {
        flight: FlightRef,
        cabin: CabinClass,
        delta: i32,
    },

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Serialization failure: {0}")]
    Serialization(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Errors that mean "the unit of work lost a race and may succeed if replayed".
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            StoreError::SeatUpdateRejected { .. } | StoreError::Conflict(_) | StoreError::Serialization(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Flight {0} not found")]
    FlightNotFound(FlightRef),

    #[error("{cabin} class is not available for flight {flight}")]
    UnavailableCabinClass { flight: FlightRef, cabin: CabinClass },

    #[error("Return flight required for round trip")]
    MissingReturnLeg,

    #[error("Return date {return_date} must be after departure date {departure}")]
    InvalidReturnDate {
        departure: NaiveDate,
        return_date: NaiveDate,
    },

    #[error("At least one passenger is required")]
    NoPassengers,

    #[error("Not enough {cabin} seats available on flight {flight}. Available: {available}, Requested: {requested}")]
    InsufficientSeats {
        flight: FlightRef,
        cabin: CabinClass,
        available: i32,
        requested: i32,
    },

    #[error("Booking #{0} not found")]
    BookingNotFound(String),

    #[error("Booking #{0} is already cancelled")]
    AlreadyCancelled(String),

    #[error("Cannot cancel booking #{0} - all flights have departed")]
    NoUpcomingFlights(String),

    #[error("Ticket {0} not found")]
    TicketNotFound(String),

    #[error("Delay must be a non-negative number of minutes, got {0}")]
    InvalidDelay(i32),

    #[error("Transaction timed out after {0} seconds")]
    TransactionTimeout(u64),

    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Infrastructure-level failures: nothing was persisted and the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::TransactionAborted(_) | BookingError::TransactionTimeout(_)
        )
    }

    /// Rejections detected before any mutation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BookingError::FlightNotFound(_)
                | BookingError::UnavailableCabinClass { .. }
                | BookingError::MissingReturnLeg
                | BookingError::InvalidReturnDate { .. }
                | BookingError::NoPassengers
                | BookingError::InsufficientSeats { .. }
                | BookingError::InvalidDelay(_)
        )
    }

    /// Short label used for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            BookingError::FlightNotFound(_) => "flight_not_found",
            BookingError::UnavailableCabinClass { .. } => "unavailable_cabin_class",
            BookingError::MissingReturnLeg => "missing_return_leg",
            BookingError::InvalidReturnDate { .. } => "invalid_return_date",
            BookingError::NoPassengers => "no_passengers",
            BookingError::InsufficientSeats { .. } => "insufficient_seats",
            BookingError::BookingNotFound(_) => "booking_not_found",
            BookingError::AlreadyCancelled(_) => "already_cancelled",
            BookingError::NoUpcomingFlights(_) => "no_upcoming_flights",
            BookingError::TicketNotFound(_) => "ticket_not_found",
            BookingError::InvalidDelay(_) => "invalid_delay",
            BookingError::TransactionTimeout(_) => "transaction_timeout",
            BookingError::TransactionAborted(_) => "transaction_aborted",
            BookingError::Store(_) => "store",
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_seats_message() {
        let err = BookingError::InsufficientSeats {
            flight: FlightRef::domestic(1),
            cabin: CabinClass::Economy,
            available: 1,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "Not enough ECONOMY seats available on flight D1. Available: 1, Requested: 3"
        );
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_contention_classification() {
        let rejected = StoreError::SeatUpdateRejected {
            flight: FlightRef::international(3),
            cabin: CabinClass::First,
            delta: -2,
        };
        assert!(rejected.is_contention());
        assert!(!StoreError::Backend("connection reset".into()).is_contention());
        assert!(BookingError::TransactionAborted("x".into()).is_retryable());
    }
}
