mod breaker;
pub mod cancellation;
pub mod flights;
pub mod notifications;
pub mod orchestrator;
pub mod queries;
pub mod tickets;
mod uow;

pub use cancellation::CancellationEngine;
pub use flights::{FlightOperations, FlightStatusReport};
pub use notifications::{LogSink, Notification, NotificationDispatcher};
pub use orchestrator::{BookingOrchestrator, BookingPolicy};
pub use queries::BookingQueries;
pub use tickets::TicketIssuer;
