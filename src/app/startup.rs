use super::{AppState, LaserFenceApp};
use crate::archive;
use crate::camera::registers::{power_on, software_trigger_present, PowerOnPolicy};
use crate::camera::GrabTimeout;
use crate::capture::CaptureSession;
use crate::error::{CameraError, Result};
use std::path::Path;
use tracing::{error, info};

impl LaserFenceApp {
    /// Validate the configuration and bring the camera up ready to capture
    ///
    /// Nothing touches the camera or the filesystem until validation passes.
    pub(super) fn start(&mut self) -> Result<CaptureSession> {
        info!("Starting laserfence ({} camera)", self.camera.family());
        self.set_state(AppState::Starting);

        self.config.validate()?;
        let session = CaptureSession::from_capture_count(self.config.session.capture_count)?;

        archive::ensure_writable(Path::new(&self.config.archive.path)).map_err(|e| {
            error!("Archive directory check failed: {}", e);
            e
        })?;

        self.bring_up_camera().map_err(|e| {
            error!("Camera bring-up failed: {}", e);
            e
        })?;

        self.set_state(AppState::Running);
        info!("Camera ready, mask {}", self.config.mask);
        Ok(session)
    }

    fn bring_up_camera(&mut self) -> Result<()> {
        let camera_config = self.config.camera.clone();
        let camera = self.camera.as_mut();

        camera.connect(camera_config.index)?;

        let trigger_supported = if camera_config.trigger.source.is_external() {
            camera.supports_external_trigger()?
        } else {
            software_trigger_present(&mut *camera)?
        };
        if !trigger_supported {
            return Err(CameraError::TriggerUnsupported.into());
        }

        let policy = PowerOnPolicy {
            attempts: camera_config.power_on_attempts,
            interval: camera_config.power_on_interval(),
        };
        power_on(&mut *camera, &policy)?;

        camera.configure_trigger(&camera_config.trigger)?;
        info!(
            "Trigger configured: mode {}, {} frames per event, {:?} edge, source {:?}",
            camera_config.trigger.mode,
            camera_config.trigger.parameter,
            camera_config.trigger.polarity,
            camera_config.trigger.source
        );

        camera.set_grab_timeout(GrabTimeout::from_config(camera_config.grab_timeout_ms))?;
        camera.start_capture()?;
        Ok(())
    }
}
