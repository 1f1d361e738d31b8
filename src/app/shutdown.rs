use super::{AppState, LaserFenceApp};
use tracing::{error, info};

impl LaserFenceApp {
    /// Return the camera to an idle state and release it
    ///
    /// Every step runs even if an earlier one fails; failures are logged and
    /// reported through the return value only.
    pub(super) fn shutdown(&mut self) -> bool {
        if !self.camera.is_connected() {
            self.set_state(AppState::Stopped);
            return true;
        }

        info!("Shutting down camera");
        self.set_state(AppState::Stopping);
        let mut clean = true;

        if let Err(e) = self.camera.disable_trigger() {
            error!("Error disabling trigger: {}", e);
            clean = false;
        }

        if let Err(e) = self.camera.stop_capture() {
            error!("Error stopping capture: {}", e);
            clean = false;
        }

        if let Err(e) = self.camera.disconnect() {
            error!("Error disconnecting camera: {}", e);
            clean = false;
        }

        self.set_state(if clean {
            AppState::Stopped
        } else {
            AppState::Failed
        });
        info!("Shutdown complete (clean: {})", clean);
        clean
    }
}
