use std::{f64::consts::PI, fmt, path::PathBuf, time::Duration};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::defs::{DetectionResult, Mode, RpmTier};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub serial: SerialConfig,
    pub controller: ControllerConfig,
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let data = fs::read(path)
            .await
            .wrap_err_with(|| format!("Failed to read config {path}"))?;

        Self::parse(&data).wrap_err_with(|| format!("Failed to parse config {path}"))
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty map
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Config::default());
        }

        Ok(serde_yaml::from_slice(data)?)
    }
}

/* == Detector == */

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorConfig {
    #[serde(flatten)]
    pub settings: DetectorSettings,
    pub power_timeout_ms: u64,
    pub source: DetectorSource,
}

/// Tuning passed once to the detector library when it is opened.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub iteration_count: i32,
    pub idleness_threshold: i32,
    /// Angular tolerance in radians.
    pub theta_tolerance: f64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum DetectorSource {
    #[default]
    Native,
    Replay { frames: Vec<DetectionResult> },
}

impl DetectorConfig {
    pub fn power_timeout(&self) -> Duration {
        Duration::from_millis(self.power_timeout_ms)
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            settings: DetectorSettings::default(),
            power_timeout_ms: 5000,
            source: DetectorSource::default(),
        }
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        DetectorSettings {
            iteration_count: 10,
            idleness_threshold: 60,
            theta_tolerance: PI / 4.,
        }
    }
}

/* == Serial == */

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    pub path: PathBuf,
    pub baud_rate: u32,
    pub write_timeout_ms: u64,
}

impl SerialConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            path: PathBuf::from("/dev/ttyUSB0"),
            baud_rate: 9600,
            write_timeout_ms: 200,
        }
    }
}

/* == Controller == */

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub interval_ms: u64,
    pub mode: Mode,
    pub rpm_tier: RpmTier,
}

impl ControllerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            interval_ms: 1000,
            mode: Mode::default(),
            rpm_tier: RpmTier::default(),
        }
    }
}

/* == Display == */

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.detector.source {
            DetectorSource::Native => "native".to_owned(),
            DetectorSource::Replay { frames } => format!("replay ({} frames)", frames.len()),
        };

        writeln!(f, "Configuration:")?;
        writeln!(
            f,
            "  detector   {source}, iterations {}, idleness {}, tolerance {:.3} rad",
            self.detector.settings.iteration_count,
            self.detector.settings.idleness_threshold,
            self.detector.settings.theta_tolerance,
        )?;
        writeln!(
            f,
            "  serial     {} @ {} baud",
            self.serial.path.display(),
            self.serial.baud_rate
        )?;
        write!(
            f,
            "  controller every {} ms, mode {}, rpm tier {}",
            self.controller.interval_ms,
            self.controller.mode,
            self.controller.rpm_tier.get()
        )
    }
}
