use crate::domain::clock::{ReferenceClock, TimeTracker};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const MIN_PERIOD: Duration = Duration::from_millis(1);
const MAX_PERIOD: Duration = Duration::from_secs(60);

/// Publishes a fresh [`TimeTracker`] every `period` until stopped or dropped.
/// The period is clamped so "now" refreshes at least once a minute.
/// Must be started from inside a tokio runtime.
pub struct ClockTicker {
    receiver: watch::Receiver<TimeTracker>,
    task: JoinHandle<()>,
    period: Duration,
}

impl ClockTicker {
    pub fn start(clock: ReferenceClock, period: Duration) -> Self {
        let initial = clock.snapshot();
        let (sender, receiver) = watch::channel(initial.clone());
        let period = period.clamp(MIN_PERIOD, MAX_PERIOD);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            let mut current_day = initial.today();
            loop {
                interval.tick().await;
                let snapshot = clock.snapshot();
                if snapshot.today() != current_day {
                    current_day = snapshot.today();
                    tracing::info!(day = %current_day, "reference day rolled over");
                }
                if sender.send(snapshot).is_err() {
                    break;
                }
            }
        });

        Self {
            receiver,
            task,
            period,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TimeTracker> {
        self.receiver.clone()
    }

    pub fn latest(&self) -> TimeTracker {
        self.receiver.borrow().clone()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for ClockTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
