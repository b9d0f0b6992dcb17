pub mod actuator;
pub mod detector;

#[cfg(test)]
pub mod mock;

pub use actuator::{ActuatorCommand, ActuatorLink, DryRunLink, SerialLink};
pub use detector::Detector;
