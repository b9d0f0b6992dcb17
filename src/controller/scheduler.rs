use std::time::Duration;

use tokio::{
    select,
    sync::watch,
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};

/// Periodic driver for a tick function. Ticks run inline in a single task,
/// so they never overlap, and a tick that overruns causes the missed ones
/// to be skipped.
pub struct Scheduler {
    period: watch::Sender<Duration>,
    task: Option<TickTask>,
}

struct TickTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    const MIN_PERIOD: Duration = Duration::from_millis(1);

    pub fn new(period: Duration) -> Self {
        let (period, _) = watch::channel(period.max(Self::MIN_PERIOD));
        Scheduler { period, task: None }
    }

    /// Starts ticking every `period`, the first tick one period from now.
    /// A task that is already running is stopped first.
    pub async fn start<F, Fut>(&mut self, period: Duration, tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop().await;
        self.set_interval(period);

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(Self::tick_task(self.period.subscribe(), stop_rx, tick));

        self.task = Some(TickTask { stop, handle });
    }

    /// Stops the task and waits for it. Once this returns no further tick will
    /// begin; a tick that was in flight has run to completion.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        let _ = task.stop.send(true);

        if let Err(error) = task.handle.await {
            if error.is_panic() {
                tracing::error!("Tick task panicked: {error}");
            }
        }
    }

    pub fn set_interval(&self, period: Duration) {
        self.period.send_replace(period.max(Self::MIN_PERIOD));
    }

    pub fn interval(&self) -> Duration {
        *self.period.borrow()
    }

    pub fn subscribe_interval(&self) -> watch::Receiver<Duration> {
        self.period.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    #[tracing::instrument(skip_all)]
    async fn tick_task<F, Fut>(
        mut period: watch::Receiver<Duration>,
        mut stop: watch::Receiver<bool>,
        mut tick: F,
    ) where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut timer = Self::timer(*period.borrow_and_update());

        tracing::debug!("Scheduler started, period {:?}", timer.period());

        loop {
            select! {
                biased;

                _ = stop.changed() => break,

                changed = period.changed() => {
                    if changed.is_err() {
                        break;
                    }

                    timer = Self::timer(*period.borrow_and_update());
                    tracing::debug!("Scheduler period changed to {:?}", timer.period());
                    continue;
                }

                _ = timer.tick() => {}
            }

            tick().await;
        }

        tracing::debug!("Scheduler stopped");
    }

    fn timer(period: Duration) -> Interval {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use tokio::time::sleep;

    use super::*;

    fn counting(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let counter = counter.clone();

        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new(Duration::from_secs(1));

        scheduler
            .start(Duration::from_millis(100), counting(&ticks))
            .await;

        assert!(scheduler.is_running());

        sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(300)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        scheduler.stop().await;
        assert!(!scheduler.is_running());

        sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ticks_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicUsize::new(0));

        let tick = {
            let (active, overlapped, ticks) = (active.clone(), overlapped.clone(), ticks.clone());

            move || {
                let (active, overlapped, ticks) =
                    (active.clone(), overlapped.clone(), ticks.clone());

                async move {
                    if active.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlapped.store(true, Ordering::SeqCst);
                    }

                    sleep(Duration::from_millis(250)).await;

                    active.fetch_sub(1, Ordering::SeqCst);
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        };

        let mut scheduler = Scheduler::new(Duration::from_millis(100));
        scheduler.start(Duration::from_millis(100), tick).await;

        sleep(Duration::from_secs(2)).await;
        scheduler.stop().await;

        assert!(!overlapped.load(Ordering::SeqCst));
        assert!(ticks.load(Ordering::SeqCst) < 20);
        assert!(ticks.load(Ordering::SeqCst) >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_applies_to_running_task() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new(Duration::from_secs(1));

        scheduler.start(Duration::from_secs(10), counting(&ticks)).await;
        scheduler.set_interval(Duration::from_millis(100));

        sleep(Duration::from_millis(550)).await;
        scheduler.stop().await;

        assert_eq!(ticks.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.interval(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_tick() {
        let finished = Arc::new(AtomicBool::new(false));

        let tick = {
            let finished = finished.clone();

            move || {
                let finished = finished.clone();

                async move {
                    sleep(Duration::from_millis(200)).await;
                    finished.store(true, Ordering::SeqCst);
                }
            }
        };

        let mut scheduler = Scheduler::new(Duration::from_millis(50));
        scheduler.start(Duration::from_millis(50), tick).await;

        sleep(Duration::from_millis(60)).await;
        assert!(!finished.load(Ordering::SeqCst));

        scheduler.stop().await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_task() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new(Duration::from_millis(100));

        scheduler.start(Duration::from_millis(100), counting(&first)).await;
        sleep(Duration::from_millis(150)).await;

        scheduler.start(Duration::from_millis(100), counting(&second)).await;
        sleep(Duration::from_millis(250)).await;
        scheduler.stop().await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }
}
