use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Failure detected, failing fast
    HalfOpen, // Testing if the channel is back
}

/// Guards the notification channel so a dead mail relay fails fast instead of
/// stalling the dispatcher queue.
pub struct CircuitBreaker {
    pub name: String,
    state: RwLock<CircuitState>,
    failure_count: AtomicUsize,
    failure_threshold: usize,
    reset_timeout: Duration,
    last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold,
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    #[cfg(test)]
    async fn state(&self) -> CircuitState {
        *self.state.read().await
    }

    /// Whether a call may go through right now.
    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let last_fail = *self.last_failure.read().await;
                match last_fail {
                    Some(instant) if instant.elapsed() > self.reset_timeout => {
                        *self.state.write().await = CircuitState::HalfOpen;
                        tracing::info!(breaker = %self.name, "circuit moving to half-open");
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            tracing::info!(breaker = %self.name, "circuit recovered");
        }
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            *self.last_failure.write().await = Some(Instant::now());
            tracing::error!(breaker = %self.name, failures = count, "circuit tripped open");
        }
    }
}
