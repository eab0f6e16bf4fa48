//! Bounded retry loop for asynchronously rendered content.

use std::future::Future;
use std::time::Duration;

/// Re-runs a probe at a fixed interval until it yields a value or attempts run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    pub attempts: u32,
    pub interval: Duration,
}

impl Poller {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Probe until it returns `Some`. At least one attempt is always made and
    /// no sleep follows the final attempt.
    pub async fn until<T, F, Fut>(&self, mut probe: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(value) = probe().await {
                log::debug!("Poll satisfied on attempt {}/{}", attempt, attempts);
                return Some(value);
            }
            if attempt < attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        None
    }
}
