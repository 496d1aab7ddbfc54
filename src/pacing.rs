//! Randomized pauses between UI steps.

use std::time::Duration;

use rand::Rng;

/// Named suspension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacePoint {
    /// Before a top-level navigation.
    Navigate,
    /// After scrolling an entry into view.
    Scroll,
    /// After opening a conversation.
    Open,
    /// Between extraction steps.
    Step,
    /// Between typed characters.
    Keystroke,
    /// Between typing and sending.
    BeforeSend,
    /// After returning to the list.
    Restore,
}

/// Inclusive `[min, max]` delay range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaceRange {
    pub min: Duration,
    pub max: Duration,
}

impl PaceRange {
    pub const ZERO: PaceRange = PaceRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    /// Uniform sample from the range. A reversed range yields `min`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

/// Delay table for every [`PacePoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    pub navigate: PaceRange,
    pub scroll: PaceRange,
    pub open: PaceRange,
    pub step: PaceRange,
    pub keystroke: PaceRange,
    pub before_send: PaceRange,
    pub restore: PaceRange,
}

impl Default for Pacer {
    fn default() -> Self {
        Self {
            navigate: PaceRange::millis(1_000, 3_000),
            scroll: PaceRange::millis(500, 1_000),
            open: PaceRange::millis(2_000, 3_000),
            step: PaceRange::millis(500, 1_500),
            keystroke: PaceRange::millis(50, 150),
            before_send: PaceRange::millis(500, 1_000),
            restore: PaceRange::millis(1_000, 2_000),
        }
    }
}

impl Pacer {
    /// No delays at all.
    pub fn instant() -> Self {
        Self {
            navigate: PaceRange::ZERO,
            scroll: PaceRange::ZERO,
            open: PaceRange::ZERO,
            step: PaceRange::ZERO,
            keystroke: PaceRange::ZERO,
            before_send: PaceRange::ZERO,
            restore: PaceRange::ZERO,
        }
    }

    pub fn range(&self, point: PacePoint) -> PaceRange {
        match point {
            PacePoint::Navigate => self.navigate,
            PacePoint::Scroll => self.scroll,
            PacePoint::Open => self.open,
            PacePoint::Step => self.step,
            PacePoint::Keystroke => self.keystroke,
            PacePoint::BeforeSend => self.before_send,
            PacePoint::Restore => self.restore,
        }
    }

    /// Sleep for a random duration from the point's range.
    pub async fn pause(&self, point: PacePoint) {
        let delay = self.range(point).sample(&mut rand::thread_rng());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn samples_stay_in_range() {
        let range = PaceRange::millis(50, 150);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let d = range.sample(&mut rng);
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn degenerate_range_returns_min() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(PaceRange::millis(300, 100).sample(&mut rng), Duration::from_millis(300));
        assert_eq!(PaceRange::ZERO.sample(&mut rng), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_sleeps_within_range() {
        let pacer = Pacer::default();
        let started = tokio::time::Instant::now();
        pacer.pause(PacePoint::Open).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed <= Duration::from_secs(3) + Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn instant_pacer_never_sleeps() {
        let pacer = Pacer::instant();
        let started = tokio::time::Instant::now();
        pacer.pause(PacePoint::Navigate).await;
        pacer.pause(PacePoint::Keystroke).await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
