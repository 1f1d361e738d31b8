use super::registers::{self, PRESENCE_INQUIRY, TRIGGER_MODE, TRIGGER_ON_OFF};
use crate::config::TriggerConfig;
use crate::error::CameraError;
use crate::frame::{Frame, RawFrame};
use std::fmt;

/// How long frame retrieval may block after a trigger fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabTimeout {
    Infinite,
    Millis(u32),
}

impl GrabTimeout {
    pub fn from_config(ms: Option<u32>) -> Self {
        match ms {
            Some(ms) => GrabTimeout::Millis(ms),
            None => GrabTimeout::Infinite,
        }
    }
}

impl fmt::Display for GrabTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrabTimeout::Infinite => write!(f, "infinite"),
            GrabTimeout::Millis(ms) => write!(f, "{} ms", ms),
        }
    }
}

/// Capability interface implemented once per camera family
///
/// The register plane (`read_register`/`write_register`) carries power-up,
/// trigger readiness and trigger mode; the helpers in
/// [`registers`](super::registers) and the default methods here are written
/// against it so every family shares the same sequencing.
pub trait CameraDriver: Send {
    /// Short family name used in logs
    fn family(&self) -> &'static str;

    fn connect(&mut self, index: u32) -> Result<(), CameraError>;

    fn disconnect(&mut self) -> Result<(), CameraError>;

    fn is_connected(&self) -> bool;

    fn read_register(&mut self, address: u32) -> Result<u32, CameraError>;

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), CameraError>;

    fn set_grab_timeout(&mut self, timeout: GrabTimeout) -> Result<(), CameraError>;

    fn start_capture(&mut self) -> Result<(), CameraError>;

    fn stop_capture(&mut self) -> Result<(), CameraError>;

    /// Block until the next frame is delivered or the grab timeout expires
    fn retrieve_frame(&mut self) -> Result<RawFrame, CameraError>;

    /// Convert a retrieved frame to 8-bit grayscale
    fn convert(&self, raw: RawFrame) -> Result<Frame, CameraError> {
        raw.into_mono8()
    }

    /// Whether the trigger mode register reports trigger support
    fn supports_external_trigger(&mut self) -> Result<bool, CameraError> {
        let value = self.read_register(TRIGGER_MODE)?;
        Ok(value & PRESENCE_INQUIRY != 0)
    }

    /// Enable triggering with the given mode, parameter, polarity and source
    fn configure_trigger(&mut self, trigger: &TriggerConfig) -> Result<(), CameraError> {
        let current = self.read_register(TRIGGER_MODE)?;
        let value = (current & PRESENCE_INQUIRY) | registers::encode_trigger_mode(trigger);
        self.write_register(TRIGGER_MODE, value)
    }

    /// Turn trigger mode off, leaving the other trigger fields untouched
    fn disable_trigger(&mut self) -> Result<(), CameraError> {
        let current = self.read_register(TRIGGER_MODE)?;
        self.write_register(TRIGGER_MODE, current & !TRIGGER_ON_OFF)
    }
}
