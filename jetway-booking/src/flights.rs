use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use jetway_core::booking::TripType;
use jetway_core::error::{BookingError, BookingResult};
use jetway_core::flight::{
    schedule_weekday, CabinClass, Flight, FlightOffer, FlightRef, FlightSearchRequest,
    FlightSearchResult, FlightStatus,
};
use jetway_core::repository::BookingStore;
use jetway_shared::models::events::{FlightDelayedEvent, NotificationEvent};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::notifications::{Notification, NotificationDispatcher};
use crate::uow::{abort_on_contention, finish, within};

/// What a passenger sees when checking a ticket's flight.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlightStatusReport {
    pub ticket_number: String,
    pub flight_id: FlightRef,
    pub status: FlightStatus,
    /// dd-mm-yyyy
    pub flight_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
}

/// Flight-level operations. These change flight state only; bookings and tickets are read.
pub struct FlightOperations {
    store: Arc<dyn BookingStore>,
    notifier: NotificationDispatcher,
    transaction_timeout: Duration,
}

impl FlightOperations {
    pub fn new(
        store: Arc<dyn BookingStore>,
        notifier: NotificationDispatcher,
        transaction_timeout: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            transaction_timeout,
        }
    }

    /// Flights on the route that can seat the whole party in the requested cabin. A round
    /// trip also searches the reverse route on the return date.
    pub async fn search_flights(&self, request: &FlightSearchRequest) -> BookingResult<FlightSearchResult> {
        if request.passengers < 1 {
            return Err(BookingError::NoPassengers);
        }
        let return_date = match request.trip_type {
            TripType::OneWay => None,
            TripType::RoundTrip => {
                let return_date = request.return_date.ok_or(BookingError::MissingReturnLeg)?;
                if return_date <= request.depart_date {
                    return Err(BookingError::InvalidReturnDate {
                        departure: request.depart_date,
                        return_date,
                    });
                }
                Some(return_date)
            }
        };

        let outbound_flights = self
            .search_one_way(&request.origin, &request.destination, request.depart_date, request)
            .await?;
        let return_flights = match return_date {
            Some(date) => Some(
                self.search_one_way(&request.destination, &request.origin, date, request)
                    .await?,
            ),
            None => None,
        };

        debug!(
            origin = %request.origin,
            destination = %request.destination,
            outbound = outbound_flights.len(),
            returning = return_flights.as_ref().map(Vec::len).unwrap_or(0),
            "flight search"
        );
        Ok(FlightSearchResult {
            outbound_flights,
            return_flights,
        })
    }

    async fn search_one_way(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
        request: &FlightSearchRequest,
    ) -> BookingResult<Vec<FlightOffer>> {
        let flights = self
            .store
            .search_flights(origin, destination, schedule_weekday(date))
            .await?;
        Ok(flights
            .iter()
            .filter(|f| sells(f, request.cabin_class, request.passengers))
            .map(|f| FlightOffer::new(f, date, request.cabin_class))
            .collect())
    }

    pub async fn check_flight_status(&self, ticket_number: &str) -> BookingResult<FlightStatusReport> {
        let found = self
            .store
            .find_ticket(ticket_number)
            .await?
            .ok_or_else(|| BookingError::TicketNotFound(ticket_number.to_string()))?;
        let flight_id = found.ticket.flight_id;
        let flight = self
            .store
            .get_flight(flight_id)
            .await?
            .ok_or(BookingError::FlightNotFound(flight_id))?;

        let delay_duration = match flight.status {
            FlightStatus::Delayed => Some(flight.delay_minutes),
            FlightStatus::OnTime => None,
        };

        Ok(FlightStatusReport {
            ticket_number: found.ticket.ticket_number,
            flight_id,
            status: flight.status,
            flight_date: found.departs_at.format("%d-%m-%Y").to_string(),
            delay_duration,
            gate: Some(found.ticket.gate),
        })
    }

    /// Record a delay on a flight and notify every holder of a confirmed ticket on an
    /// upcoming leg. Zero minutes puts the flight back on time without notifying anyone.
    pub async fn update_flight_delay(&self, flight_id: FlightRef, delay_minutes: i32) -> BookingResult<Flight> {
        if delay_minutes < 0 {
            return Err(BookingError::InvalidDelay(delay_minutes));
        }

        let status = FlightStatus::for_delay(delay_minutes);
        let flight = within(self.transaction_timeout, self.execute(flight_id, delay_minutes, status)).await?;
        info!(flight = %flight_id, delay_minutes, status = status.as_str(), "Flight delay updated");

        if delay_minutes > 0 {
            self.notify_holders(&flight).await;
        }
        Ok(flight)
    }

    async fn execute(
        &self,
        flight_id: FlightRef,
        delay_minutes: i32,
        status: FlightStatus,
    ) -> BookingResult<Flight> {
        let mut uow = self.store.begin().await.map_err(abort_on_contention)?;
        let result = match uow.set_flight_delay(flight_id, delay_minutes, status).await {
            Ok(Some(flight)) => Ok(flight),
            Ok(None) => Err(BookingError::FlightNotFound(flight_id)),
            Err(e) => Err(abort_on_contention(e)),
        };
        finish(uow, result).await
    }

    async fn notify_holders(&self, flight: &Flight) {
        let holders = match self.store.ticket_holders(flight.id, Utc::now()).await {
            Ok(holders) => holders,
            Err(e) => {
                error!(flight = %flight.id, error = %e, "failed to load ticket holders for delay notice");
                return;
            }
        };

        let mut by_user: BTreeMap<i64, Vec<NotificationEvent>> = BTreeMap::new();
        for holder in holders {
            let expected = holder.departs_at + chrono::Duration::minutes(flight.delay_minutes as i64);
            by_user
                .entry(holder.user_id)
                .or_default()
                .push(NotificationEvent::FlightDelayed(FlightDelayedEvent {
                    ticket_number: holder.ticket_number,
                    passenger_name: holder.passenger_name,
                    flight_id: flight.id.to_string(),
                    flight_no: flight.flight_no.clone(),
                    delay_minutes: flight.delay_minutes,
                    scheduled_departure: holder.departs_at,
                    expected_departure: expected,
                }));
        }

        for (user_id, events) in by_user {
            self.notifier.dispatch(Notification { user_id, events });
        }
    }
}

/// The cabin is sold and has room for the whole party.
fn sells(flight: &Flight, cabin: CabinClass, passengers: i32) -> bool {
    !flight.fares.get(cabin).is_zero() && flight.seats.get(cabin).available >= passengers
}
