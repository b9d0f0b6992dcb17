use async_trait::async_trait;
use clap::ValueEnum;
use strum::Display;

use crate::error::LinkError;

pub use self::serial::{DryRunLink, SerialLink};

mod serial;

/// A logical command understood by the fan's motor board. Each maps onto exactly one byte.
#[derive(Copy, Clone, Debug, Display, Eq, Hash, PartialEq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
pub enum ActuatorCommand {
    FanOn,
    FanOff,
    RotationOn,
    RotationOff,
    RotatePositive,
    RotateNegative,
    RotateNeutral,
}

impl ActuatorCommand {
    pub fn token(self) -> u8 {
        match self {
            ActuatorCommand::FanOn => b'n',
            ActuatorCommand::FanOff => b'o',
            ActuatorCommand::RotationOn => b'a',
            ActuatorCommand::RotationOff => b'm',
            ActuatorCommand::RotatePositive => b'+',
            ActuatorCommand::RotateNegative => b'-',
            ActuatorCommand::RotateNeutral => b'0',
        }
    }

    /// Directional rotate command for an angle in degrees, outside of any dead band.
    pub fn rotate(angle: i64) -> Self {
        match angle.signum() {
            1 => ActuatorCommand::RotatePositive,
            -1 => ActuatorCommand::RotateNegative,
            _ => ActuatorCommand::RotateNeutral,
        }
    }
}

/// Byte-oriented channel to the physical fan. No acknowledgement is expected.
#[async_trait]
pub trait ActuatorLink: Send + Sync {
    async fn send(&self, command: ActuatorCommand) -> Result<(), LinkError>;
}
