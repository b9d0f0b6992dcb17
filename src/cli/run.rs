use std::sync::Arc;

use eyre::Result;

use crate::{
    config::Config,
    controller::FanController,
    defs::{Mode, RpmTier},
    hardware::{ActuatorLink, DryRunLink, SerialLink, detector},
};

pub async fn launch(
    config_path: &str,
    dry_run: bool,
    mode: Option<Mode>,
    rpm_tier: Option<u8>,
) -> Result<()> {
    let config = Config::load(config_path).await?;
    tracing::info!("{config}");

    let detector = detector::open(&config.detector)?;

    let link: Arc<dyn ActuatorLink> = if dry_run {
        Arc::new(DryRunLink)
    } else {
        Arc::new(SerialLink::open(&config.serial)?)
    };

    let mut builder = FanController::builder().with_config(&config);

    if let Some(mode) = mode {
        builder = builder.with_mode(mode);
    }

    if let Some(rpm_tier) = rpm_tier {
        builder = builder.with_rpm_tier(RpmTier::new(rpm_tier)?);
    }

    let controller = builder.build(detector, link);

    controller.set_power(true).await?;

    shutdown_signal().await?;
    tracing::info!("Shutting down...");

    // Off commands are issued even if the detector refuses to power off
    if let Err(error) = controller.set_power(false).await {
        tracing::warn!("Unclean shutdown: {error}");
    }

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }

    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
