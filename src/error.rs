use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaserFenceError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Frame buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Region error: {0}")]
    Region(#[from] RegionError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("No permission to write to {}: {source}", path.display())]
    FilesystemPermission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("System error: {message}")]
    System { message: String },
}

impl LaserFenceError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Whether the capture loop may discard the current pair and try again
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LaserFenceError::Camera(CameraError::Retrieve { .. })
                | LaserFenceError::Camera(CameraError::Conversion { .. })
        )
    }

    /// Process exit code reported by the binary
    pub fn exit_code(&self) -> i32 {
        match self {
            LaserFenceError::Validation { .. } | LaserFenceError::Config(_) => 2,
            LaserFenceError::FilesystemPermission { .. } => 3,
            LaserFenceError::Camera(_) => 4,
            _ => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to connect to camera {index}: {details}")]
    Connect { index: u32, details: String },

    #[error("Camera is not connected")]
    NotConnected,

    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },

    #[error("Camera does not support an external trigger")]
    TriggerUnsupported,

    #[error("Register 0x{address:03X} access failed: {details}")]
    Register { address: u32, details: String },

    #[error("Timed out during {operation}")]
    Timeout { operation: String },

    #[error("Camera power-on failed: {details}")]
    PowerOn { details: String },

    #[error("Camera did not power up after {attempts} attempts")]
    PowerOnTimeout { attempts: u32 },

    #[error("Frame retrieval failed: {details}")]
    Retrieve { details: String },

    #[error("Frame conversion failed: {details}")]
    Conversion { details: String },
}

impl CameraError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CameraError::Timeout { .. })
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Giving up after {attempts} consecutive failed pairs: {last}")]
    PairFailed { attempts: u32, last: String },

    #[error("No trigger within {waited_ms} ms")]
    TriggerTimeout { waited_ms: u64 },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BufferError {
    #[error("Frame buffer capacity must be greater than 0")]
    ZeroCapacity,

    #[error("Slot {index} is beyond frame buffer capacity {capacity}")]
    Overflow { index: usize, capacity: usize },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegionError {
    #[error("Invalid mask ({row1},{col1})-({row2},{col2}): corners are inverted")]
    InvalidMask {
        row1: u32,
        col1: u32,
        row2: u32,
        col2: u32,
    },

    #[error("Mask ({row1},{col1})-({row2},{col2}) exceeds {width}x{height} frame")]
    MaskOutOfBounds {
        row1: u32,
        col1: u32,
        row2: u32,
        col2: u32,
        width: u32,
        height: u32,
    },
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {}: {details}", path.display())]
    Encode { path: PathBuf, details: String },

    #[error("Failed to serialize session metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LaserFenceError>;
