pub mod app;
pub mod archive;
pub mod camera;
pub mod capture;
pub mod config;
pub mod emitter;
pub mod error;
pub mod frame;
pub mod frame_buffer;
pub mod judge;
pub mod region;

pub use app::{AppState, LaserFenceApp};
pub use archive::{DiskArchiver, SessionMetadata};
pub use camera::{CameraBuilder, CameraDriver, GrabTimeout, MockCamera, SimulatedCamera};
pub use capture::{CaptureSession, EndReason, PairCaptureLoop, PairResult, SessionMode, SessionOutcome};
pub use config::{CameraBackend, LaserFenceConfig};
pub use emitter::ResultEmitter;
pub use error::{LaserFenceError, Result};
pub use frame::{Frame, PixelFormat, RawFrame};
pub use frame_buffer::FrameBuffer;
pub use judge::{PassFailJudge, Verdict};
pub use region::{sum_region, Mask};

#[cfg(feature = "imaging")]
pub use camera::ReplayCamera;
