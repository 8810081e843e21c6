//! # Clock abstraction.
//!
//! Wrappers and the scheduler never read wall-clock time or sleep directly: they go through
//! a [`Clock`], so tests can move time deterministically.
//!
//! - [`SystemClock`] - production: `Utc::now()` and `tokio::time::sleep`.
//! - [`MockClock`] - wall time derived from tokio's clock. Under `tokio::time::pause`
//!   (or `#[tokio::test(start_paused = true)]`) it only moves when tokio's clock moves,
//!   and timers fire in order as the runtime auto-advances.
//!
//! ```text
//! MockClock::now() = start + (tokio::time::Instant::now() - origin)
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::time::Instant;

/// Shared handle to a clock.
pub type ClockRef = Arc<dyn Clock>;

/// Source of time and timers.
pub trait Clock: Send + Sync + 'static {
    /// Current wall-clock time (UTC).
    fn now(&self) -> DateTime<Utc>;

    /// A future that completes once `delay` has elapsed.
    ///
    /// Meant to be raced against [`Scope::cancelled`](crate::Scope::cancelled).
    fn after(&self, delay: Duration) -> BoxFuture<'static, ()>;
}

/// Real time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn after(&self, delay: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(delay))
    }
}

/// Test clock following tokio's (pausable) clock from a fixed wall-clock start.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use chrono::{TimeZone, Utc};
/// use runlet::{Clock, MockClock};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// tokio::time::pause();
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let clock = MockClock::new(start);
///
/// clock.advance(Duration::from_secs(90)).await;
/// assert_eq!(clock.now(), start + chrono::Duration::seconds(90));
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MockClock {
    start: DateTime<Utc>,
    origin: Instant,
}

impl MockClock {
    /// Creates a clock reading `start` now.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            origin: Instant::now(),
        }
    }

    /// Moves tokio's paused clock forward by `by`, firing due timers.
    ///
    /// # Panics
    /// Panics (inside tokio) if time is not paused.
    pub async fn advance(&self, by: Duration) {
        tokio::time::advance(by).await;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|d| self.start.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn after(&self, delay: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn test_mock_clock_follows_paused_time() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = MockClock::new(start);
        assert_eq!(clock.now(), start);

        clock.after(Duration::from_secs(3600)).await;
        assert_eq!(clock.now(), start + chrono::Duration::hours(1));
    }

    #[tokio::test]
    async fn test_system_clock_after_elapses() {
        let clock = SystemClock;
        let before = clock.now();
        clock.after(Duration::from_millis(5)).await;
        assert!(clock.now() >= before);
    }
}
