//! PTS clock and packet pacing.
//!
//! Both use `tokio::time::Instant`, so they follow tokio's paused clock in
//! tests.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// PTS / DTS tick rate.
pub const PTS_CLOCK_HZ: u64 = 90_000;

/// PTS values are 33 bits wide.
pub const PTS_MASK: u64 = 0x1_FFFF_FFFF;

/// Presentation timestamps relative to the first call.
#[derive(Debug, Default)]
pub struct PtsClock {
    reference: Option<Instant>,
}

impl PtsClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// PTS for "now". The first call fixes the reference instant and
    /// returns 0; later calls never go backwards.
    pub fn next_pts(&mut self) -> u64 {
        let now = Instant::now();
        match self.reference {
            Some(reference) => duration_to_pts(now.saturating_duration_since(reference)),
            None => {
                self.reference = Some(now);
                0
            }
        }
    }
}

/// Convert an elapsed duration to 90 kHz ticks, rounded to nearest and
/// wrapped to 33 bits.
pub fn duration_to_pts(elapsed: Duration) -> u64 {
    let nanos = elapsed.as_nanos();
    let ticks = (nanos * PTS_CLOCK_HZ as u128 + 500_000_000) / 1_000_000_000;
    (ticks as u64) & PTS_MASK
}

/// Enforces a minimum spacing between packet emissions.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until `interval` has passed since the last recorded emission.
    /// Returns immediately when nothing was emitted yet.
    pub async fn wait(&self) {
        let Some(last) = self.last_emit else {
            return;
        };
        let deadline = last + self.interval;
        if Instant::now() < deadline {
            trace!(
                remaining_ms = (deadline - Instant::now()).as_millis() as u64,
                "Pacing caption packet"
            );
            tokio::time::sleep_until(deadline).await;
        }
    }

    /// Record an emission at the current instant.
    pub fn mark(&mut self) {
        self.last_emit = Some(Instant::now());
    }

    pub fn last_emit(&self) -> Option<Instant> {
        self.last_emit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_to_pts() {
        assert_eq!(duration_to_pts(Duration::ZERO), 0);
        assert_eq!(duration_to_pts(Duration::from_secs(1)), 90_000);
        assert_eq!(duration_to_pts(Duration::from_millis(100)), 9_000);
        // 1 tick = 11111.1 ns; rounding to nearest
        assert_eq!(duration_to_pts(Duration::from_nanos(5_555)), 0);
        assert_eq!(duration_to_pts(Duration::from_nanos(5_556)), 1);
    }

    #[test]
    fn test_duration_to_pts_wraps_at_33_bits() {
        let wrap_secs = (PTS_MASK + 1) / PTS_CLOCK_HZ;
        let rest = (PTS_MASK + 1) % PTS_CLOCK_HZ;
        assert_eq!(rest, 64_592);
        let elapsed = Duration::from_secs(wrap_secs) + Duration::from_secs(1);
        assert_eq!(duration_to_pts(elapsed), PTS_CLOCK_HZ - rest);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pts_starts_at_zero_and_tracks_clock() {
        let mut clock = PtsClock::new();
        assert_eq!(clock.next_pts(), 0);
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.next_pts(), 22_500);
        assert_eq!(clock.next_pts(), 22_500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_waits_remaining_time() {
        let mut pacer = Pacer::new(Duration::from_millis(100));
        let start = Instant::now();
        pacer.wait().await;
        assert_eq!(Instant::now(), start);

        pacer.mark();
        tokio::time::advance(Duration::from_millis(30)).await;
        pacer.wait().await;
        assert_eq!(Instant::now() - start, Duration::from_millis(100));

        pacer.mark();
        tokio::time::advance(Duration::from_millis(150)).await;
        let before = Instant::now();
        pacer.wait().await;
        assert_eq!(Instant::now(), before);
    }
}
