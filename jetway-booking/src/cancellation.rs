use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jetway_catalog::SeatInventory;
use jetway_core::booking::{Booking, BookingStatus};
use jetway_core::error::{BookingError, BookingResult};
use jetway_core::repository::{BookingStore, UnitOfWork};
use jetway_shared::models::events::{BookingCancelledEvent, NotificationEvent};
use tracing::{info, warn};
use uuid::Uuid;

use crate::notifications::{Notification, NotificationDispatcher};
use crate::uow::{abort_on_contention, finish, within};

/// Cancels a confirmed booking and gives its seats back, all in one unit of work.
pub struct CancellationEngine {
    store: Arc<dyn BookingStore>,
    notifier: NotificationDispatcher,
    transaction_timeout: Duration,
}

impl CancellationEngine {
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

    /// Cancel `booking_number` on behalf of its owner. A booking owned by someone else
    /// is reported as not found.
    pub async fn cancel_booking(&self, booking_number: &str, user_id: i64) -> BookingResult<Booking> {
        let number = Uuid::parse_str(booking_number)
            .map_err(|_| BookingError::BookingNotFound(booking_number.to_string()))?;

        let result = within(self.transaction_timeout, self.execute(number, user_id, Utc::now())).await;
        let booking = match result {
            Ok(booking) => booking,
            Err(e) => {
                warn!(%booking_number, user_id, reason = e.reason(), "cancellation rejected");
                return Err(e);
            }
        };

        info!(
            booking_number = %booking.booking_number,
            user_id,
            legs = booking.legs.len(),
            passengers = booking.passengers.len(),
            "Booking cancelled"
        );

        let event = NotificationEvent::BookingCancelled(BookingCancelledEvent {
            booking_number: booking.booking_number.to_string(),
            total_amount: booking.total_amount,
            cancellation_date: Utc::now().format("%d-%m-%Y").to_string(),
        });
        self.notifier.dispatch(Notification {
            user_id,
            events: vec![event],
        });

        Ok(booking)
    }

    async fn execute(&self, number: Uuid, user_id: i64, now: DateTime<Utc>) -> BookingResult<Booking> {
        let mut uow = self.store.begin().await.map_err(abort_on_contention)?;
        let result = Self::reverse(uow.as_mut(), number, user_id, now).await;
        finish(uow, result).await
    }

    async fn reverse(
        uow: &mut dyn UnitOfWork,
        number: Uuid,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> BookingResult<Booking> {
        let mut booking = uow
            .lock_booking(number, user_id)
            .await
            .map_err(abort_on_contention)?
            .ok_or_else(|| BookingError::BookingNotFound(number.to_string()))?;

        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled(number.to_string()));
        }
        if !booking.has_upcoming_leg(now) {
            return Err(BookingError::NoUpcomingFlights(number.to_string()));
        }

        uow.set_booking_status(booking.id, BookingStatus::Cancelled)
            .await
            .map_err(abort_on_contention)?;
        uow.set_ticket_status(booking.id, BookingStatus::Cancelled)
            .await
            .map_err(abort_on_contention)?;

        let count = booking.passengers.len() as i32;
        for leg in &booking.legs {
            SeatInventory::increment(uow, leg.flight_id, leg.cabin_class, count).await?;
        }

        booking.status = BookingStatus::Cancelled;
        for passenger in &mut booking.passengers {
            for ticket in &mut passenger.tickets {
                ticket.status = BookingStatus::Cancelled;
            }
        }
        Ok(booking)
    }
}
