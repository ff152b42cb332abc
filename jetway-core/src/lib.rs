pub mod booking;
pub mod error;
pub mod flight;
pub mod notify;
pub mod repository;

pub use booking::{Booking, BookingLeg, BookingPassenger, BookingStatus, Ticket};
pub use error::{BookingError, BookingResult, StoreError};
pub use flight::{CabinClass, Flight, FlightKind, FlightOffer, FlightRef, FlightSearchRequest, FlightSearchResult};
pub use repository::{BookingStore, FlightCatalog, UnitOfWork};
