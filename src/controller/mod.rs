use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::{Mutex, watch},
    task,
    time::timeout,
};

use crate::{
    config::Config,
    defs::{ControllerState, DetectionResult, Mode, RpmTier, Status, StatusCode},
    error::{ControlError, DetectorFailure},
    hardware::{ActuatorCommand, ActuatorLink, Detector},
};

pub use self::scheduler::Scheduler;

pub mod scheduler;

/// Supervises one fan: polls the detector on a fixed period and turns what it
/// sees into motor and rotation commands.
///
/// Handles are cheap to clone and all refer to the same fan. Setters and ticks
/// are serialized on the controller state, power transitions additionally on
/// the scheduler.
#[derive(Clone)]
pub struct FanController {
    inner: Arc<Inner>,
}

struct Inner {
    detector: Arc<dyn Detector>,
    link: Arc<dyn ActuatorLink>,
    state: Mutex<ControllerState>,
    scheduler: Mutex<Scheduler>,
    interval: watch::Receiver<Duration>,
    power_timeout: Duration,
    polling: Arc<AtomicBool>,
}

/// Clears the in-flight flag once the blocking poll finishes or is dropped.
struct PollGuard(Arc<AtomicBool>);

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
pub struct FanControllerBuilder {
    interval: Option<Duration>,
    power_timeout: Option<Duration>,
    mode: Mode,
    rpm_tier: RpmTier,
}

impl FanController {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);
    pub const DEFAULT_POWER_TIMEOUT: Duration = Duration::from_secs(5);

    /// Dead band around the centre, in degrees, inside which no rotation is requested.
    pub const DEAD_BAND: u64 = 5;

    pub fn builder() -> FanControllerBuilder {
        FanControllerBuilder::default()
    }

    /* == Public API == */

    pub async fn set_power(&self, power: bool) -> Result<(), ControlError> {
        tracing::info!("Power: {power}");

        if power {
            self.power_on().await
        } else {
            self.power_off().await
        }
    }

    pub async fn set_mode(&self, mode: Mode) {
        let mut state = self.inner.state.lock().await;
        state.mode = mode;

        if state.fanning {
            self.reconcile_rotation(mode).await;
        }

        tracing::info!("Mode: {mode}");
    }

    pub async fn set_rpm_tier(&self, rpm_tier: RpmTier) {
        self.inner.state.lock().await.rpm_tier = rpm_tier;
        tracing::info!("RPM tier: {}", rpm_tier.get());
    }

    pub async fn set_interval(&self, interval: Duration) {
        self.inner.scheduler.lock().await.set_interval(interval);
    }

    pub async fn status(&self) -> Status {
        Status::from(&*self.inner.state.lock().await)
    }

    pub async fn state(&self) -> ControllerState {
        *self.inner.state.lock().await
    }

    /// Runs one detection pass. Normally driven by the scheduler.
    pub async fn tick(&self) {
        if !self.inner.state.lock().await.running {
            return;
        }

        // A detection that takes longer than a period is worthless
        let limit = *self.inner.interval.borrow();

        let detection = match self.poll(limit).await {
            Ok(detection) => detection,
            Err(error) => {
                tracing::warn!("{error}, skipping tick");
                DetectionResult::UNKNOWN
            }
        };

        let mut state = self.inner.state.lock().await;

        // Powered off while the detector was busy
        if !state.running {
            tracing::debug!("Discarding stale detection {:?}", detection.status);
            return;
        }

        self.apply(&mut state, detection).await;
    }

    /* == Power sequencing == */

    async fn power_on(&self) -> Result<(), ControlError> {
        let mut scheduler = self.inner.scheduler.lock().await;

        {
            let mut state = self.inner.state.lock().await;
            state.power = true;

            if state.running {
                return Ok(());
            }
        }

        let detector = self.inner.detector.clone();
        let powered =
            Self::blocking("power_up", self.inner.power_timeout, move || detector.power_up()).await;

        match powered {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!("Detector failed to power up");
                return Err(DetectorFailure::PowerUp.into());
            }
            Err(error) => {
                tracing::error!("{error}");
                return Err(error.into());
            }
        }

        self.inner.state.lock().await.running = true;

        let controller = Arc::downgrade(&self.inner);
        let interval = scheduler.interval();

        scheduler
            .start(interval, move || Self::scheduled_tick(controller.clone()))
            .await;

        tracing::info!("Detection loop running every {interval:?}");
        Ok(())
    }

    async fn power_off(&self) -> Result<(), ControlError> {
        let mut scheduler = self.inner.scheduler.lock().await;

        {
            let mut state = self.inner.state.lock().await;
            state.power = false;
            state.running = false;
            state.fanning = false;

            self.send(ActuatorCommand::FanOff).await;
            self.send(ActuatorCommand::RotationOff).await;
        }

        scheduler.stop().await;

        let detector = self.inner.detector.clone();
        let powered_off =
            Self::blocking("power_off", self.inner.power_timeout, move || detector.power_off())
                .await;

        match powered_off {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::warn!("Detector failed to power off");
                Err(DetectorFailure::PowerOff.into())
            }
            Err(error) => {
                tracing::warn!("{error}");
                Err(error.into())
            }
        }
    }

    async fn scheduled_tick(inner: Weak<Inner>) {
        if let Some(inner) = inner.upgrade() {
            FanController { inner }.tick().await;
        }
    }

    /* == Detection == */

    async fn apply(&self, state: &mut ControllerState, detection: DetectionResult) {
        tracing::debug!("Detected {} (theta {:.4})", detection.status, detection.theta);

        match detection.status {
            StatusCode::Idle => {
                self.send(ActuatorCommand::FanOff).await;
                self.send(ActuatorCommand::RotationOff).await;
                state.fanning = false;
            }

            StatusCode::Active => {
                self.activate(state).await;
            }

            StatusCode::Tracking => {
                self.activate(state).await;

                if state.mode == Mode::AutoTrack {
                    let Some(angle) = detection.angle_degrees() else {
                        tracing::warn!("Ignoring non-finite theta {}", detection.theta);
                        return;
                    };

                    tracing::debug!("Angle: {angle}°");

                    if angle.unsigned_abs() >= Self::DEAD_BAND {
                        self.send(ActuatorCommand::rotate(angle)).await;
                    }
                }
            }

            StatusCode::Unknown => {}
        }
    }

    /// Turns the fan on, but only on the rising edge. Active frames are gated
    /// the same way as Tracking, so a run of them sends a single fan-on.
    async fn activate(&self, state: &mut ControllerState) {
        if !state.fanning {
            self.send(ActuatorCommand::FanOn).await;
            self.reconcile_rotation(state.mode).await;
        }

        state.fanning = true;
    }

    async fn reconcile_rotation(&self, mode: Mode) {
        match mode {
            Mode::TopOpen => self.send(ActuatorCommand::RotationOn).await,
            Mode::AutoTrack => self.send(ActuatorCommand::RotationOff).await,
            Mode::Neutral => {}
        }
    }

    /* == I/O == */

    async fn send(&self, command: ActuatorCommand) {
        if let Err(error) = self.inner.link.send(command).await {
            tracing::error!("Dropped {command}: {error}");
        }
    }

    /// At most one poll is outstanding, including one that already timed out.
    async fn poll(&self, limit: Duration) -> Result<DetectionResult, DetectorFailure> {
        if self.inner.polling.swap(true, Ordering::AcqRel) {
            return Err(DetectorFailure::Busy("poll_state"));
        }

        let guard = PollGuard(self.inner.polling.clone());
        let detector = self.inner.detector.clone();

        Self::blocking("poll_state", limit, move || {
            let _guard = guard;
            detector.poll_state()
        })
        .await
    }

    async fn blocking<T, F>(
        call: &'static str,
        limit: Duration,
        f: F,
    ) -> Result<T, DetectorFailure>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        match timeout(limit, task::spawn_blocking(f)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(DetectorFailure::Panicked(call)),
            Err(_) => Err(DetectorFailure::Timeout(call, limit)),
        }
    }
}

impl FanControllerBuilder {
    pub fn with_config(mut self, config: &Config) -> Self {
        self.interval = Some(config.controller.interval());
        self.power_timeout = Some(config.detector.power_timeout());
        self.mode = config.controller.mode;
        self.rpm_tier = config.controller.rpm_tier;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_power_timeout(mut self, power_timeout: Duration) -> Self {
        self.power_timeout = Some(power_timeout);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rpm_tier(mut self, rpm_tier: RpmTier) -> Self {
        self.rpm_tier = rpm_tier;
        self
    }

    pub fn build(self, detector: Arc<dyn Detector>, link: Arc<dyn ActuatorLink>) -> FanController {
        let interval = self.interval.unwrap_or(FanController::DEFAULT_INTERVAL);

        let state = ControllerState {
            mode: self.mode,
            rpm_tier: self.rpm_tier,
            ..Default::default()
        };

        let scheduler = Scheduler::new(interval);

        FanController {
            inner: Arc::new(Inner {
                detector,
                link,
                state: Mutex::new(state),
                interval: scheduler.subscribe_interval(),
                scheduler: Mutex::new(scheduler),
                power_timeout: self
                    .power_timeout
                    .unwrap_or(FanController::DEFAULT_POWER_TIMEOUT),
                polling: Arc::new(AtomicBool::new(false)),
            }),
        }
    }
}
