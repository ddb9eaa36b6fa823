use log::{info, warn};
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

/// Periodic trigger for ambient fetches. At most one timer exists at a time.
#[derive(Debug, Default)]
pub struct RefreshScheduler {
    timer: Option<Interval>,
    period_secs: u64,
    active: bool,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the current timer and, for a non-zero interval, arms a new one
    /// whose first tick is a full period away.
    pub fn configure(&mut self, interval_secs: u64) {
        self.timer = None;
        self.period_secs = interval_secs;
        self.active = interval_secs > 0;

        if interval_secs == 0 {
            info!("Auto-refresh disabled");
            return;
        }

        let period = Duration::from_secs(interval_secs);
        // The timer also needs room for the deadline after the first tick.
        let first = Instant::now()
            .checked_add(period)
            .filter(|first| first.checked_add(period).is_some());
        let Some(first) = first else {
            warn!(
                "Auto-refresh interval of {} seconds is beyond the clock's range, it will never fire",
                interval_secs
            );
            return;
        };

        let mut timer = interval_at(first, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        info!("Auto-refresh every {} seconds", interval_secs);
    }

    /// Drives the "auto-refresh active" indicator.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn period_secs(&self) -> u64 {
        self.period_secs
    }

    /// Resolves on the next tick. Never resolves while disarmed.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
