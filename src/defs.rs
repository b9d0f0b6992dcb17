use std::f64::consts::PI;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::ControlError;

/* == Mode == */

/// Governs whether the rotation actuator follows the detected angle or stays fixed.
#[derive(
    Copy, Clone, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize, ValueEnum,
)]
#[clap(rename_all = "kebab-case")]
pub enum Mode {
    // Do not modify order
    TopOpen,
    Neutral,
    #[default]
    AutoTrack,
}

impl TryFrom<u8> for Mode {
    type Error = ControlError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Mode::TopOpen),
            1 => Ok(Mode::Neutral),
            2 => Ok(Mode::AutoTrack),
            other => Err(ControlError::InvalidInput(format!("mode {other} is not 0, 1 or 2"))),
        }
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        mode as u8
    }
}

/* == RpmTier == */

/// Fan speed profile selector. Stored and reported, it does not drive the motor.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RpmTier(u8);

impl RpmTier {
    pub const MAX: u8 = 2;

    pub fn new(tier: u8) -> Result<Self, ControlError> {
        if tier > Self::MAX {
            return Err(ControlError::InvalidInput(format!(
                "rpm tier {tier} exceeds {}",
                Self::MAX
            )));
        }

        Ok(RpmTier(tier))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for RpmTier {
    type Error = ControlError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        RpmTier::new(value)
    }
}

impl From<RpmTier> for u8 {
    fn from(tier: RpmTier) -> Self {
        tier.0
    }
}

/* == Detection == */

#[derive(Copy, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum StatusCode {
    Idle,
    Active,
    Tracking,
    Unknown,
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        match code {
            0 => StatusCode::Idle,
            1 => StatusCode::Active,
            2 => StatusCode::Tracking,
            _ => StatusCode::Unknown,
        }
    }
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DetectionResult {
    pub status: StatusCode,
    #[serde(default)]
    pub theta: f64,
}

impl DetectionResult {
    pub const UNKNOWN: Self = DetectionResult::new(StatusCode::Unknown, 0.);

    pub const fn new(status: StatusCode, theta: f64) -> Self {
        Self { status, theta }
    }

    /// The detected angle in whole degrees, with halves rounded towards positive infinity.
    /// `None` when theta is not a finite number. Out-of-range angles saturate.
    pub fn angle_degrees(&self) -> Option<i64> {
        let degrees = (self.theta * 180. / PI + 0.5).floor();
        degrees.is_finite().then_some(degrees as i64)
    }
}

/* == Controller state == */

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ControllerState {
    pub power: bool,
    pub mode: Mode,
    pub rpm_tier: RpmTier,
    pub running: bool,
    pub fanning: bool,
}

/// The externally presented subset of [`ControllerState`].
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Status {
    pub power: bool,
    pub mode: Mode,
    pub rpm_tier: RpmTier,
}

impl From<&ControllerState> for Status {
    fn from(state: &ControllerState) -> Self {
        Status {
            power: state.power,
            mode: state.mode,
            rpm_tier: state.rpm_tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_index() {
        assert_eq!(Mode::try_from(0).unwrap(), Mode::TopOpen);
        assert_eq!(Mode::try_from(2).unwrap(), Mode::AutoTrack);
        assert!(matches!(Mode::try_from(3), Err(ControlError::InvalidInput(_))));
        assert_eq!(u8::from(Mode::Neutral), 1);
    }

    #[test]
    fn test_rpm_tier_bounds() {
        assert_eq!(RpmTier::new(2).unwrap().get(), 2);
        assert!(RpmTier::new(3).is_err());
        assert!(serde_yaml::from_str::<RpmTier>("7").is_err());
    }

    #[test]
    fn test_unmapped_status_is_unknown() {
        assert_eq!(StatusCode::from(2), StatusCode::Tracking);
        assert_eq!(StatusCode::from(-1), StatusCode::Unknown);
        assert_eq!(StatusCode::from(42), StatusCode::Unknown);
    }

    #[test]
    fn test_angle_rounding() {
        let degrees = |d: f64| DetectionResult::new(StatusCode::Tracking, d.to_radians());

        assert_eq!(DetectionResult::new(StatusCode::Tracking, PI / 18.).angle_degrees(), Some(10));
        assert_eq!(degrees(4.4).angle_degrees(), Some(4));
        assert_eq!(degrees(4.6).angle_degrees(), Some(5));
        assert_eq!(degrees(-4.6).angle_degrees(), Some(-5));
        assert_eq!(degrees(-4.4).angle_degrees(), Some(-4));
    }

    #[test]
    fn test_angle_of_garbage_theta() {
        let angle = |theta: f64| DetectionResult::new(StatusCode::Tracking, theta).angle_degrees();

        assert_eq!(angle(f64::NAN), None);
        assert_eq!(angle(f64::INFINITY), None);
        assert_eq!(angle(f64::NEG_INFINITY), None);
        assert_eq!(angle(-1e300), Some(i64::MIN));
        assert_eq!(angle(1e300), Some(i64::MAX));
    }
}
