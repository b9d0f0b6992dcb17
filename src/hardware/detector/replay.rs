use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{config::DetectorSettings, defs::DetectionResult};

use super::Detector;

/// Plays back a fixed sequence of detections in a loop, so the control
/// loop can be exercised without the sensor library.
pub struct ReplayDetector {
    frames: Vec<DetectionResult>,
    cursor: AtomicUsize,
    powered: AtomicBool,
}

impl ReplayDetector {
    pub fn new(frames: Vec<DetectionResult>) -> Self {
        ReplayDetector {
            frames,
            cursor: AtomicUsize::new(0),
            powered: AtomicBool::new(false),
        }
    }
}

impl Detector for ReplayDetector {
    fn configure(&self, settings: &DetectorSettings) {
        tracing::debug!("Replay detector ignores settings {settings:?}");
    }

    fn power_up(&self) -> bool {
        self.cursor.store(0, Ordering::Relaxed);
        self.powered.store(true, Ordering::Relaxed);
        true
    }

    fn power_off(&self) -> bool {
        self.powered.store(false, Ordering::Relaxed);
        true
    }

    fn poll_state(&self) -> DetectionResult {
        if self.frames.is_empty() || !self.powered.load(Ordering::Relaxed) {
            return DetectionResult::UNKNOWN;
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        self.frames[index]
    }
}
