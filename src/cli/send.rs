use eyre::Result;

use crate::{
    config::Config,
    hardware::{ActuatorCommand, ActuatorLink, SerialLink},
};

pub async fn send(config_path: &str, command: ActuatorCommand) -> Result<()> {
    let config = Config::load(config_path).await?;
    let link = SerialLink::open(&config.serial)?;

    link.send(command).await?;

    tracing::info!("Sent {command} to {}", config.serial.path.display());
    Ok(())
}
