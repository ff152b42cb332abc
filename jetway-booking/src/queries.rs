use std::sync::Arc;

use jetway_core::booking::{Booking, BookingHistoryQuery, BookingPage};
use jetway_core::error::{BookingError, BookingResult};
use jetway_core::repository::BookingStore;
use uuid::Uuid;

const MAX_PAGE_SIZE: u32 = 100;

/// Read side of the booking aggregate. Every lookup is scoped to the owning user.
pub struct BookingQueries {
    store: Arc<dyn BookingStore>,
}

impl BookingQueries {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn get_booking_by_number(&self, booking_number: &str, user_id: i64) -> BookingResult<Booking> {
        let not_found = || BookingError::BookingNotFound(booking_number.to_string());
        let number = Uuid::parse_str(booking_number).map_err(|_| not_found())?;
        self.store
            .find_booking(number, user_id)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn get_booking_history(
        &self,
        user_id: i64,
        mut query: BookingHistoryQuery,
    ) -> BookingResult<BookingPage> {
        query.page = query.page.max(1);
        query.limit = query.limit.clamp(1, MAX_PAGE_SIZE);

        let (data, total) = self.store.list_bookings(user_id, &query).await?;
        Ok(BookingPage {
            data,
            total,
            pages: page_count(total, query.limit),
        })
    }
}

fn page_count(total: u64, limit: u32) -> u64 {
    total.div_ceil(limit.max(1) as u64)
}
