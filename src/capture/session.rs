use crate::error::{LaserFenceError, Result};
use std::fmt;

/// How long a capture session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Capture pairs until cancelled, reusing a single buffer slot
    Streaming,
    /// Capture exactly this many frames (an even count), then persist them
    Batch(u32),
}

/// Session parameters fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSession {
    mode: SessionMode,
}

impl CaptureSession {
    pub fn streaming() -> Self {
        Self {
            mode: SessionMode::Streaming,
        }
    }

    /// Build a session from a requested frame count; 0 streams forever
    pub fn from_capture_count(count: u32) -> Result<Self> {
        match count {
            0 => Ok(Self::streaming()),
            n if n % 2 == 1 => Err(LaserFenceError::validation(format!(
                "Capture count must be even, got {}",
                n
            ))),
            n => Ok(Self {
                mode: SessionMode::Batch(n),
            }),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_batch(&self) -> bool {
        matches!(self.mode, SessionMode::Batch(_))
    }

    /// Frame slots the session needs
    pub fn buffer_capacity(&self) -> usize {
        match self.mode {
            SessionMode::Streaming => 1,
            SessionMode::Batch(n) => n as usize,
        }
    }

    /// Pairs that end the session, if it ends on its own
    pub fn pairs_required(&self) -> Option<u64> {
        match self.mode {
            SessionMode::Streaming => None,
            SessionMode::Batch(n) => Some(u64::from(n / 2)),
        }
    }

    pub fn is_complete(&self, pairs_completed: u64) -> bool {
        self.pairs_required()
            .map(|required| pairs_completed >= required)
            .unwrap_or(false)
    }

    /// Buffer slots receiving the two frames of pair `pair_index`
    pub fn slots_for_pair(&self, pair_index: u64) -> (usize, usize) {
        match self.mode {
            SessionMode::Streaming => (0, 0),
            SessionMode::Batch(_) => {
                let first = (pair_index * 2) as usize;
                (first, first + 1)
            }
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Streaming => write!(f, "streaming"),
            SessionMode::Batch(n) => write!(f, "batch of {} frames", n),
        }
    }
}
