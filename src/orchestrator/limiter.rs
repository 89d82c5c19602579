use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::{sleep_until, Instant};

use crate::errors::BackendError;

/// Caps concurrent backend calls and spaces out their start times.
pub struct RequestLimiter {
    permits: Semaphore,
    min_spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestLimiter {
    pub fn new(max_concurrent: usize, min_spacing: Duration) -> Self {
        Self {
            permits: Semaphore::new(max_concurrent.max(1)),
            min_spacing,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits for a free permit, then for this caller's start slot.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, BackendError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BackendError::Network("request limiter closed".into()))?;
        let start = self.reserve_slot(Instant::now());
        sleep_until(start).await;
        Ok(permit)
    }

    fn reserve_slot(&self, now: Instant) -> Instant {
        let mut slot = self.next_slot.lock();
        let start = match *slot {
            Some(next) if next > now => next,
            _ => now,
        };
        *slot = Some(start + self.min_spacing);
        start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn call_starts_are_spaced() {
        let limiter = Arc::new(RequestLimiter::new(3, Duration::from_millis(500)));
        let origin = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                Instant::now()
            }));
        }
        let mut starts = Vec::new();
        for h in handles {
            starts.push(h.await.unwrap() - origin);
        }
        starts.sort();
        assert_eq!(starts[0], Duration::ZERO);
        assert!(starts[1] >= Duration::from_millis(500));
        assert!(starts[2] >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn permits_bound_concurrency() {
        let limiter = RequestLimiter::new(1, Duration::ZERO);
        let first = limiter.acquire().await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), limiter.acquire()).await;
        assert!(second.is_err());
        drop(first);
        assert!(limiter.acquire().await.is_ok());
    }

    #[test]
    fn spacing_resets_after_idle() {
        let limiter = RequestLimiter::new(1, Duration::from_millis(500));
        let t0 = Instant::now();
        assert_eq!(limiter.reserve_slot(t0), t0);
        assert_eq!(limiter.reserve_slot(t0), t0 + Duration::from_millis(500));
        let later = t0 + Duration::from_secs(10);
        assert_eq!(limiter.reserve_slot(later), later);
    }
}
