use super::types::AppState;
use crate::camera::{CameraBuilder, CameraDriver};
use crate::config::LaserFenceConfig;
use crate::error::Result;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Owns the camera, the result sink and the cancellation token for one run
pub struct LaserFenceApp {
    pub(super) config: LaserFenceConfig,
    pub(super) camera: Box<dyn CameraDriver>,
    pub(super) output: Box<dyn Write + Send>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) state: AppState,
}

impl LaserFenceApp {
    /// Create an application writing results to stdout
    pub fn new(config: LaserFenceConfig) -> Result<Self> {
        let camera = CameraBuilder::new().config(config.clone()).build()?;
        Ok(Self::with_parts(config, camera, Box::new(std::io::stdout())))
    }

    /// Create an application around an existing camera and result sink
    pub fn with_parts(
        config: LaserFenceConfig,
        camera: Box<dyn CameraDriver>,
        output: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            config,
            camera,
            output,
            cancellation_token: CancellationToken::new(),
            state: AppState::Stopped,
        }
    }

    pub fn config(&self) -> &LaserFenceConfig {
        &self.config
    }

    /// Token that stops the capture session when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub(super) fn set_state(&mut self, state: AppState) {
        debug!("Application state changed: {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}
