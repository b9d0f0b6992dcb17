use std::{
    ffi::c_int,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
    config::DetectorSettings,
    defs::{DetectionResult, StatusCode},
};

use super::Detector;

mod ffi {
    use std::ffi::c_int;

    #[link(name = "smartfan")]
    unsafe extern "C" {
        pub fn power_up() -> bool;
        pub fn power_off() -> bool;
        pub fn state(theta: *mut f64) -> c_int;
        pub fn set_iter(iterations: c_int);
        pub fn set_idleness(threshold: c_int);
        pub fn set_theta(tolerance: f64);
    }
}

/// Binding onto `libsmartfan`. The library keeps global state and is not
/// reentrant, so every call goes through one lock.
#[derive(Default)]
pub struct NativeDetector {
    lock: Mutex<()>,
}

impl NativeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Detector for NativeDetector {
    fn configure(&self, settings: &DetectorSettings) {
        let _guard = self.guard();

        // SAFETY: plain value setters with no pointer arguments
        unsafe {
            ffi::set_iter(settings.iteration_count as c_int);
            ffi::set_idleness(settings.idleness_threshold as c_int);
            ffi::set_theta(settings.theta_tolerance);
        }
    }

    fn power_up(&self) -> bool {
        let _guard = self.guard();
        let success = unsafe { ffi::power_up() };

        tracing::debug!("smartfan power_up(): {success}");
        success
    }

    fn power_off(&self) -> bool {
        let _guard = self.guard();
        let success = unsafe { ffi::power_off() };

        tracing::debug!("smartfan power_off(): {success}");
        success
    }

    fn poll_state(&self) -> DetectionResult {
        let _guard = self.guard();
        let mut theta = 0f64;

        // SAFETY: `theta` outlives the call and the library writes a single double
        let code = unsafe { ffi::state(&mut theta) };

        DetectionResult::new(StatusCode::from(code), theta)
    }
}
