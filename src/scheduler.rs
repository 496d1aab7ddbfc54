//! Periodic triage runs inside a daily active window.

use std::future::Future;
use std::time::Duration;

use chrono::Timelike;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::ScheduleConfig;

/// Local hours `[start, end)` during which runs may start.
///
/// `start > end` wraps past midnight; `start == end` is never active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl ActiveWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            self.start_hour <= hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Source of the current local hour.
pub trait Clock: Send + Sync {
    fn local_hour(&self) -> u32;
}

/// Wall clock in the process's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local_hour(&self) -> u32 {
        chrono::Local::now().hour()
    }
}

/// Runs a job immediately and then every interval, while inside the window.
pub struct Scheduler<C: Clock = SystemClock> {
    window: ActiveWindow,
    interval: Duration,
    clock: C,
}

impl Scheduler<SystemClock> {
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(config: &ScheduleConfig, clock: C) -> Self {
        Self {
            window: ActiveWindow::new(config.start_hour, config.end_hour),
            interval: config.check_interval,
            clock,
        }
    }

    pub fn window(&self) -> ActiveWindow {
        self.window
    }

    /// Tick until `shutdown` resolves. Returns how many times `job` ran.
    ///
    /// A run in progress completes before shutdown is observed.
    pub async fn run<F, Fut>(&self, mut job: F, shutdown: impl Future<Output = ()>) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        info!(
            start_hour = self.window.start_hour,
            end_hour = self.window.end_hour,
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut runs = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(runs, "Scheduler shutting down");
                    return runs;
                }
                _ = ticker.tick() => {
                    let hour = self.clock.local_hour();
                    if self.window.contains(hour) {
                        job().await;
                        runs += 1;
                    } else {
                        debug!(hour, "Outside active window, skipping run");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use super::*;

    struct FixedClock(Arc<AtomicU32>);

    impl Clock for FixedClock {
        fn local_hour(&self) -> u32 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn config(start_hour: u32, end_hour: u32, minutes: u64) -> ScheduleConfig {
        ScheduleConfig {
            start_hour,
            end_hour,
            check_interval: Duration::from_secs(minutes * 60),
        }
    }

    #[test]
    fn window_is_half_open() {
        let window = ActiveWindow::new(8, 20);
        assert!(!window.contains(7));
        assert!(window.contains(8));
        assert!(window.contains(19));
        assert!(!window.contains(20));
    }

    #[test]
    fn window_wraps_past_midnight() {
        let window = ActiveWindow::new(22, 6);
        assert!(window.contains(23));
        assert!(window.contains(0));
        assert!(window.contains(5));
        assert!(!window.contains(6));
        assert!(!window.contains(12));
    }

    #[test]
    fn empty_window_never_active() {
        let window = ActiveWindow::new(9, 9);
        assert!((0..24).all(|h| !window.contains(h)));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_interval() {
        let hour = Arc::new(AtomicU32::new(10));
        let scheduler = Scheduler::with_clock(&config(8, 20, 60), FixedClock(hour));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let runs = scheduler
            .run(
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                },
                tokio::time::sleep(Duration::from_secs(150 * 60)),
            )
            .await;

        assert_eq!(runs, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn outside_window_nothing_runs() {
        let hour = Arc::new(AtomicU32::new(23));
        let scheduler = Scheduler::with_clock(&config(8, 20, 60), FixedClock(hour));
        let runs = scheduler
            .run(|| async {}, tokio::time::sleep(Duration::from_secs(5 * 3600)))
            .await;
        assert_eq!(runs, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn window_is_checked_on_every_tick() {
        let hour = Arc::new(AtomicU32::new(7));
        let scheduler = Scheduler::with_clock(&config(8, 20, 60), FixedClock(hour.clone()));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30 * 60)).await;
            hour.store(9, Ordering::SeqCst);
        });
        let runs = scheduler
            .run(|| async {}, tokio::time::sleep(Duration::from_secs(90 * 60)))
            .await;
        assert_eq!(runs, 1);
    }
}
