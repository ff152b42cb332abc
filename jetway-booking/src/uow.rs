use std::future::Future;
use std::time::Duration;

use jetway_core::error::{BookingError, BookingResult, StoreError};
use jetway_core::repository::UnitOfWork;
use tracing::error;

/// Contention inside a transaction becomes a retryable abort; anything else stays a store error.
pub(crate) fn abort_on_contention(e: StoreError) -> BookingError {
    if e.is_contention() {
        BookingError::TransactionAborted(e.to_string())
    } else {
        BookingError::Store(e)
    }
}

/// Commit on success, roll back on failure.
pub(crate) async fn finish<T>(uow: Box<dyn UnitOfWork>, result: BookingResult<T>) -> BookingResult<T> {
    match result {
        Ok(value) => {
            uow.commit().await.map_err(abort_on_contention)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = uow.rollback().await {
                error!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Bound a whole unit of work. Dropping the future drops the unit of work, which discards it.
pub(crate) async fn within<F, T>(limit: Duration, work: F) -> BookingResult<T>
where
    F: Future<Output = BookingResult<T>>,
{
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => {
            error!(timeout_secs = limit.as_secs(), "unit of work timed out");
            Err(BookingError::TransactionTimeout(limit.as_secs()))
        }
    }
}
