use std::{io, time::Duration};

use thiserror::Error;

/// Failure to deliver a command to the actuator. Never fatal, the command is dropped.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Serial write failed: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port unavailable: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Serial write timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serial writer task failed")]
    Join,
}

#[derive(Debug, Error)]
pub enum DetectorFailure {
    #[error("Detector failed to power up")]
    PowerUp,

    #[error("Detector failed to power off")]
    PowerOff,

    #[error("Detector call {0} timed out after {1:?}")]
    Timeout(&'static str, Duration),

    #[error("Detector call {0} panicked")]
    Panicked(&'static str),

    #[error("Detector call {0} still in flight")]
    Busy(&'static str),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Detector(#[from] DetectorFailure),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
