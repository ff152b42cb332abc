use jetway_core::booking::{Booking, NewTicket, Ticket};
use jetway_core::error::BookingResult;
use jetway_core::flight::{CabinClass, Flight};
use jetway_core::repository::UnitOfWork;
use jetway_shared::models::events::{NotificationEvent, TicketIssuedEvent};
use rand::Rng;
use uuid::Uuid;

use crate::uow::abort_on_contention;

const SEAT_ROWS: u32 = 30;
const SEAT_LETTERS: u8 = 6;
const GATES: u32 = 20;

/// Generates one ticket per (passenger, leg) inside the booking's unit of work.
///
/// Seats are symbolic: cabin prefix plus a random row and letter. Two tickets may land on the
/// same seat code; there is no seat map behind them.
#[derive(Debug, Clone, Default)]
pub struct TicketIssuer;

impl TicketIssuer {
    pub fn new() -> Self {
        Self
    }

    /// Persist tickets for every passenger on every leg and attach them to `booking`.
    pub async fn issue(
        &self,
        uow: &mut dyn UnitOfWork,
        booking: &mut Booking,
    ) -> BookingResult<Vec<Ticket>> {
        let drafts = self.draft(booking);
        let tickets = uow.insert_tickets(&drafts).await.map_err(abort_on_contention)?;

        for passenger in &mut booking.passengers {
            passenger.tickets = tickets
                .iter()
                .filter(|t| t.passenger_id == passenger.id)
                .cloned()
                .collect();
        }

        tracing::debug!(
            booking_number = %booking.booking_number,
            tickets = tickets.len(),
            "tickets issued"
        );
        Ok(tickets)
    }

    /// Unsaved tickets, `legs × passengers` of them, passenger-major.
    pub fn draft(&self, booking: &Booking) -> Vec<NewTicket> {
        let mut rng = rand::thread_rng();
        let mut drafts = Vec::with_capacity(booking.legs.len() * booking.passengers.len());

        for passenger in &booking.passengers {
            for leg in &booking.legs {
                drafts.push(NewTicket {
                    ticket_number: ticket_number(),
                    booking_id: booking.id,
                    passenger_id: passenger.id,
                    flight_id: leg.flight_id,
                    leg_id: leg.id,
                    seat_number: seat_code(&mut rng, leg.cabin_class),
                    gate: gate(&mut rng),
                    barcode: barcode(),
                });
            }
        }
        drafts
    }

    /// Flat e-mail records for every ticket of a freshly created booking.
    pub fn issued_events(&self, booking: &Booking, flights: &[Flight]) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        for passenger in &booking.passengers {
            for ticket in &passenger.tickets {
                let Some(flight) = flights.iter().find(|f| f.id == ticket.flight_id) else {
                    tracing::warn!(ticket = %ticket.ticket_number, "flight details missing for ticket");
                    continue;
                };
                let flight_date = booking
                    .legs
                    .iter()
                    .find(|l| l.id == ticket.leg_id)
                    .map(|l| l.departs_at.format("%d-%m-%Y").to_string())
                    .unwrap_or_default();

                events.push(NotificationEvent::TicketIssued(TicketIssuedEvent {
                    ticket_number: ticket.ticket_number.clone(),
                    booking_number: booking.booking_number.to_string(),
                    passenger_name: passenger.full_name(),
                    seat_number: ticket.seat_number.clone(),
                    gate: ticket.gate.clone(),
                    barcode: ticket.barcode.clone(),
                    flight_id: ticket.flight_id.to_string(),
                    flight_no: flight.flight_no.clone(),
                    airline: flight.airline.clone(),
                    flight_date,
                    origin: flight.origin.clone(),
                    destination: flight.destination.clone(),
                }));
            }
        }
        events
    }
}

/// `TKT-` + 8 upper-case hex characters.
pub fn ticket_number() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("TKT-{}", id[..8].to_uppercase())
}

/// `BAR-` + 12 upper-case hex characters, independent of the ticket number.
pub fn barcode() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("BAR-{}", id[..12].to_uppercase())
}

pub fn seat_code<R: Rng>(rng: &mut R, cabin: CabinClass) -> String {
    let row = rng.gen_range(1..=SEAT_ROWS);
    let letter = (b'A' + rng.gen_range(0..SEAT_LETTERS)) as char;
    format!("{}{}{}", cabin.seat_prefix(), row, letter)
}

pub fn gate<R: Rng>(rng: &mut R) -> String {
    format!("G{}", rng.gen_range(1..=GATES))
}
