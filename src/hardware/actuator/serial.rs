use std::{
    io::Write,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serialport::SerialPort;
use tokio::{task, time::timeout};

use crate::{config::SerialConfig, error::LinkError};

use super::{ActuatorCommand, ActuatorLink};

pub struct SerialLink {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    write_timeout: Duration,
}

impl SerialLink {
    pub fn open(config: &SerialConfig) -> Result<Self, LinkError> {
        let path = config.path.to_string_lossy();
        tracing::info!("Opening serial port {path} at {} baud", config.baud_rate);

        let port = serialport::new(path, config.baud_rate)
            .timeout(config.write_timeout())
            .open()?;

        Ok(SerialLink {
            port: Arc::new(Mutex::new(port)),
            write_timeout: config.write_timeout(),
        })
    }
}

#[async_trait]
impl ActuatorLink for SerialLink {
    async fn send(&self, command: ActuatorCommand) -> Result<(), LinkError> {
        let port = self.port.clone();
        let token = command.token();

        // The port may block up to its own timeout, keep it off the runtime threads
        let write = task::spawn_blocking(move || -> Result<(), LinkError> {
            let mut port = port.lock().map_err(|_| LinkError::Join)?;
            port.write_all(&[token])?;
            port.flush()?;
            Ok(())
        });

        match timeout(self.write_timeout, write).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(LinkError::Join),
            Err(_) => return Err(LinkError::Timeout(self.write_timeout)),
        }

        tracing::debug!("Sent {command} ({})", token as char);
        Ok(())
    }
}

/// Stands in for the serial port when no fan is attached.
#[derive(Default)]
pub struct DryRunLink;

#[async_trait]
impl ActuatorLink for DryRunLink {
    async fn send(&self, command: ActuatorCommand) -> Result<(), LinkError> {
        tracing::info!("[dry run] {command} ({})", command.token() as char);
        Ok(())
    }
}
