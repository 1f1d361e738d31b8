mod pair_loop;
mod session;

pub use pair_loop::{EndReason, PairCaptureLoop, PairResult, SessionOutcome};
pub use session::{CaptureSession, SessionMode};
