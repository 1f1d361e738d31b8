use super::driver::CameraDriver;
use super::simulated::SimulatedCamera;
use crate::config::{CameraBackend, LaserFenceConfig};
use crate::error::{LaserFenceError, Result};
use tracing::debug;

/// Builder selecting the camera family named in the configuration
pub struct CameraBuilder {
    config: Option<LaserFenceConfig>,
}

impl CameraBuilder {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn config(mut self, config: LaserFenceConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Box<dyn CameraDriver>> {
        let config = self
            .config
            .ok_or_else(|| LaserFenceError::system("Camera configuration must be specified"))?;

        debug!("Building {:?} camera driver", config.camera.backend);

        match config.camera.backend {
            CameraBackend::Simulated => Ok(Box::new(SimulatedCamera::new(
                config.simulated.clone(),
                config.camera.resolution,
            ))),
            CameraBackend::Replay => build_replay(&config),
        }
    }
}

impl Default for CameraBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "imaging")]
fn build_replay(config: &LaserFenceConfig) -> Result<Box<dyn CameraDriver>> {
    Ok(Box::new(super::replay::ReplayCamera::new(&config.replay)))
}

#[cfg(not(feature = "imaging"))]
fn build_replay(_config: &LaserFenceConfig) -> Result<Box<dyn CameraDriver>> {
    Err(LaserFenceError::validation(
        "Replay backend requires the `imaging` feature",
    ))
}
