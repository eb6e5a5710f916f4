//! Time source abstraction so the dispatch loop can run against simulated
//! time in tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Sleeps until `deadline`; returns immediately when it already passed.
    async fn sleep_until(&self, deadline: DateTime<Utc>);
}

/// Wall-clock time via `tokio::time`.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        let remaining = deadline - self.now();
        if let Ok(duration) = remaining.to_std() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// A clock that jumps forward instead of sleeping. `sleep_until` completes
/// immediately and sets the clock to the deadline.
pub struct SimulatedClock {
    now: Mutex<DateTime<Utc>>,
}

impl SimulatedClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        let mut now = self.now.lock();
        if deadline > *now {
            *now = deadline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_simulated_clock_jumps_to_deadline() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
        let clock = SimulatedClock::starting_at(t0);
        clock.sleep_until(t0 + TimeDelta::minutes(15)).await;
        assert_eq!(clock.now(), t0 + TimeDelta::minutes(15));

        // sleeping into the past does not move the clock backwards
        clock.sleep_until(t0).await;
        assert_eq!(clock.now(), t0 + TimeDelta::minutes(15));
    }
}
