use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    config::DetectorSettings,
    defs::{DetectionResult, StatusCode},
    error::LinkError,
};

use super::{ActuatorCommand, ActuatorLink, Detector};

/// Detector that hands out queued results, one per poll.
pub struct MockDetector {
    frames: Mutex<VecDeque<DetectionResult>>,
    power_up_succeeds: AtomicBool,
    poll_delay: Mutex<Duration>,
    power_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub power_ups: AtomicUsize,
    pub power_offs: AtomicUsize,
    pub polls: AtomicUsize,
}

impl MockDetector {
    pub fn new() -> Self {
        MockDetector {
            frames: Mutex::default(),
            power_up_succeeds: AtomicBool::new(true),
            poll_delay: Mutex::default(),
            power_delay: Mutex::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            power_ups: AtomicUsize::new(0),
            power_offs: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let detector = Self::new();
        detector.power_up_succeeds.store(false, Ordering::SeqCst);
        detector
    }

    pub fn push(&self, status: StatusCode, theta: f64) {
        self.frames
            .lock()
            .unwrap()
            .push_back(DetectionResult::new(status, theta));
    }

    pub fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.lock().unwrap() = delay;
    }

    /// Delays both `power_up` and `power_off`.
    pub fn set_power_delay(&self, delay: Duration) {
        *self.power_delay.lock().unwrap() = delay;
    }
}

fn pause(delay: &Mutex<Duration>) {
    let delay = *delay.lock().unwrap();

    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

impl Detector for MockDetector {
    fn configure(&self, _settings: &DetectorSettings) {}

    fn power_up(&self) -> bool {
        self.power_ups.fetch_add(1, Ordering::SeqCst);
        pause(&self.power_delay);
        self.power_up_succeeds.load(Ordering::SeqCst)
    }

    fn power_off(&self) -> bool {
        self.power_offs.fetch_add(1, Ordering::SeqCst);
        pause(&self.power_delay);
        true
    }

    fn poll_state(&self) -> DetectionResult {
        self.polls.fetch_add(1, Ordering::SeqCst);

        let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(concurrent, Ordering::SeqCst);

        pause(&self.poll_delay);

        let detection = self
            .frames
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DetectionResult::UNKNOWN);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        detection
    }
}

/// Link that records every command it is asked to send.
#[derive(Default)]
pub struct MockLink {
    sent: Mutex<Vec<ActuatorCommand>>,
    broken: AtomicBool,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the commands recorded so far.
    pub fn take(&self) -> Vec<ActuatorCommand> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

#[async_trait]
impl ActuatorLink for MockLink {
    async fn send(&self, command: ActuatorCommand) -> Result<(), LinkError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(LinkError::Timeout(Duration::ZERO));
        }

        self.sent.lock().unwrap().push(command);
        Ok(())
    }
}
