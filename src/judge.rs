//! Threshold verdict on a completed pair.
//!
//! The score is `sumFirst - sumSecond`: a beam breaking the fence between the
//! two exposures darkens the second frame inside the mask. The verdict is
//! informational and never changes the emitted result line.

use crate::capture::PairResult;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassFailJudge {
    threshold: i64,
}

impl PassFailJudge {
    pub fn new(threshold: i64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    pub fn score(result: &PairResult) -> i64 {
        result.sum_first as i64 - result.sum_second as i64
    }

    pub fn judge(&self, result: &PairResult) -> Verdict {
        if Self::score(result) > self.threshold {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }
}
