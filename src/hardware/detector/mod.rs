use std::sync::Arc;

use eyre::Result;

use crate::{
    config::{DetectorConfig, DetectorSettings, DetectorSource},
    defs::DetectionResult,
};

pub use self::replay::ReplayDetector;

#[cfg(feature = "native")]
pub use self::native::NativeDetector;

#[cfg(feature = "native")]
mod native;
mod replay;

/// The occupancy and orientation sensing capability. Its internals
/// are opaque, all calls may block for an unbounded amount of time.
pub trait Detector: Send + Sync {
    fn configure(&self, settings: &DetectorSettings);

    fn power_up(&self) -> bool;

    fn power_off(&self) -> bool;

    fn poll_state(&self) -> DetectionResult;
}

/// Opens and configures the detector selected in the configuration.
pub fn open(config: &DetectorConfig) -> Result<Arc<dyn Detector>> {
    let detector: Arc<dyn Detector> = match &config.source {
        DetectorSource::Native => open_native()?,
        DetectorSource::Replay { frames } => {
            tracing::info!("Replaying {} detector frames", frames.len());
            Arc::new(ReplayDetector::new(frames.clone()))
        }
    };

    detector.configure(&config.settings);

    Ok(detector)
}

#[cfg(feature = "native")]
fn open_native() -> Result<Arc<dyn Detector>> {
    Ok(Arc::new(NativeDetector::new()))
}

#[cfg(not(feature = "native"))]
fn open_native() -> Result<Arc<dyn Detector>> {
    eyre::bail!("Built without the `native` feature, use a Replay detector source instead")
}
