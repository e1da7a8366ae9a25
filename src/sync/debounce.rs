// src/sync/debounce.rs

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

/// A cancel-and-reschedule timer slot.
///
/// At most one timer is pending per slot. Rescheduling cancels the pending
/// timer; once a timer fires, its task runs detached and is never cancelled
/// by the slot.
#[derive(Debug, Default)]
pub struct ScheduledTask {
    timer: Option<Timer>,
}

#[derive(Debug)]
struct Timer {
    handle: JoinHandle<()>,
    /// Set by whichever side gets there first: the timer firing, or a cancel.
    claimed: Arc<AtomicBool>,
}

impl ScheduledTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` after `delay` unless the slot is rescheduled or
    /// cancelled first.
    pub fn reschedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let claimed = Arc::new(AtomicBool::new(false));
        let flag = claimed.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if flag.swap(true, Ordering::SeqCst) {
                return;
            }
            tokio::spawn(task);
        });
        self.timer = Some(Timer { handle, claimed });
    }

    /// Drops the pending timer. Returns whether one was pending, i.e.
    /// whether its task is now guaranteed never to run.
    pub fn cancel(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                let was_pending = !timer.claimed.swap(true, Ordering::SeqCst);
                timer.handle.abort();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timer
            .as_ref()
            .is_some_and(|timer| !timer.claimed.load(Ordering::SeqCst))
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_quiet_period() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut slot = ScheduledTask::new();

        slot.reschedule(Duration::from_millis(400), counter_task(&fired));
        assert!(slot.is_pending());

        tokio::time::sleep(Duration::from_millis(399)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!slot.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_restarts_the_countdown() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut slot = ScheduledTask::new();

        for _ in 0..5 {
            slot.reschedule(Duration::from_millis(400), counter_task(&fired));
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_reports_pending_state() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut slot = ScheduledTask::new();

        assert!(!slot.cancel());
        slot.reschedule(Duration::from_millis(50), counter_task(&fired));
        assert!(slot.cancel());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_firing_reports_nothing_pending() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut slot = ScheduledTask::new();

        slot.reschedule(Duration::from_millis(50), counter_task(&fired));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!slot.is_pending());
        assert!(!slot.cancel());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fired_task_survives_a_later_reschedule() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut slot = ScheduledTask::new();
        let slow = {
            let fired = fired.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(1_000)).await;
                fired.fetch_add(1, Ordering::SeqCst);
            }
        };

        slot.reschedule(Duration::from_millis(10), slow);
        tokio::time::sleep(Duration::from_millis(20)).await;
        // The timer already fired; this only arms a new one.
        slot.reschedule(Duration::from_millis(10), counter_task(&fired));

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
