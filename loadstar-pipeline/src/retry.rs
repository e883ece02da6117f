//! Bounded retry for store bootstrap.
//!
//! Connectivity retry lives here, with the collaborator that establishes
//! the connection — invoked once before the coordinator starts, never
//! interleaved with business logic. Only transient store conditions are
//! retried; SQL-level errors surface immediately.

use std::path::Path;
use std::time::Duration;

use loadstar_core::store::{Store, StoreError};

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retrying after the given 1-based failed attempt:
    /// base_delay doubled per prior failure.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Open the store, retrying transient failures up to `max_attempts`.
    ///
    /// Exhaustion (or a non-transient error) is returned to the caller,
    /// which treats it as fatal: no entity has been attempted yet.
    pub fn open_store(&self, path: &Path, windows: &[usize]) -> Result<Store, StoreError> {
        let mut attempt = 1;
        loop {
            match Store::open(path, windows) {
                Ok(store) => return Ok(store),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    log::warn!(
                        "store open attempt {attempt}/{} failed: {e}; retrying in {delay:?}",
                        self.max_attempts
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
