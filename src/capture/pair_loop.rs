use super::session::CaptureSession;
use crate::archive::DiskArchiver;
use crate::camera::registers::{
    fire_software_trigger, wait_for_trigger_ready, TriggerPollPolicy, TriggerWait,
};
use crate::camera::CameraDriver;
use crate::config::{TriggerConfig, TriggerSource};
use crate::emitter::ResultEmitter;
use crate::error::{CaptureError, LaserFenceError, Result};
use crate::frame_buffer::FrameBuffer;
use crate::judge::{PassFailJudge, Verdict};
use crate::region::{sum_region, Mask};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Region sums of one completed pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairResult {
    pub counter: u64,
    pub sum_first: u64,
    pub sum_second: u64,
    pub timestamp: DateTime<Utc>,
}

impl PairResult {
    pub fn epoch_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Completed,
    Cancelled,
}

/// What a finished session produced
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub pairs_completed: u64,
    pub reason: EndReason,
    pub archived_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    WaitTrigger,
    CaptureFirst,
    CaptureSecond,
    Emit,
    Terminate(EndReason),
}

/// Trigger-synchronized paired-frame acquisition
///
/// Each iteration waits for the camera to arm, captures two frames into the
/// pair's buffer slots, sums the mask region of each and emits one result
/// line. A batch session stops after its last pair and flushes the buffer to
/// disk; a streaming session runs until cancelled.
pub struct PairCaptureLoop<'a, W: Write> {
    camera: &'a mut dyn CameraDriver,
    session: CaptureSession,
    mask: Mask,
    emitter: &'a mut ResultEmitter<W>,
    cancel: CancellationToken,
    poll: TriggerPollPolicy,
    software_trigger: bool,
    max_pair_retries: u32,
    judge: Option<PassFailJudge>,
    archiver: Option<DiskArchiver>,
    buffer: FrameBuffer,
}

impl<'a, W: Write> PairCaptureLoop<'a, W> {
    pub fn new(
        camera: &'a mut dyn CameraDriver,
        session: CaptureSession,
        mask: Mask,
        emitter: &'a mut ResultEmitter<W>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let buffer = FrameBuffer::allocate(session.buffer_capacity())?;
        let trigger = TriggerConfig::default();

        Ok(Self {
            camera,
            session,
            mask,
            emitter,
            cancel,
            poll: TriggerPollPolicy::from_config(&trigger),
            software_trigger: false,
            max_pair_retries: 3,
            judge: None,
            archiver: None,
            buffer,
        })
    }

    pub fn with_trigger(mut self, trigger: &TriggerConfig) -> Self {
        self.poll = TriggerPollPolicy::from_config(trigger);
        self.software_trigger = trigger.source == TriggerSource::Software;
        self
    }

    pub fn with_max_pair_retries(mut self, retries: u32) -> Self {
        self.max_pair_retries = retries;
        self
    }

    pub fn with_judge(mut self, judge: Option<PassFailJudge>) -> Self {
        self.judge = judge;
        self
    }

    /// Archive pairs and flush the buffer at the end; ignored when streaming
    pub fn with_archiver(mut self, archiver: DiskArchiver) -> Self {
        if self.session.is_batch() {
            self.archiver = Some(archiver);
        }
        self
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Run until the session completes, is cancelled or hits a fatal error
    pub fn run(&mut self) -> Result<SessionOutcome> {
        info!("Starting {} capture session", self.session.mode());

        let mut state = LoopState::WaitTrigger;
        let mut counter: u64 = 0;
        let mut consecutive_failures: u32 = 0;
        let mut sum_first: u64 = 0;
        let mut sum_second: u64 = 0;

        let reason = loop {
            let (first_slot, second_slot) = self.session.slots_for_pair(counter);

            state = match state {
                LoopState::WaitTrigger => self.wait_trigger(counter)?,
                LoopState::CaptureFirst => match self.capture_into(first_slot) {
                    Ok(sum) => {
                        sum_first = sum;
                        if self.cancel.is_cancelled() {
                            debug!("Cancelled between captures, discarding pair {}", counter);
                            LoopState::Terminate(EndReason::Cancelled)
                        } else {
                            LoopState::CaptureSecond
                        }
                    }
                    Err(e) => self.discard_pair(counter, e, &mut consecutive_failures)?,
                },
                LoopState::CaptureSecond => match self.capture_into(second_slot) {
                    Ok(sum) => {
                        sum_second = sum;
                        LoopState::Emit
                    }
                    Err(e) => self.discard_pair(counter, e, &mut consecutive_failures)?,
                },
                LoopState::Emit => {
                    let result = PairResult {
                        counter,
                        sum_first,
                        sum_second,
                        timestamp: Utc::now(),
                    };
                    self.emit(&result, first_slot, second_slot)?;
                    counter += 1;
                    consecutive_failures = 0;
                    LoopState::WaitTrigger
                }
                LoopState::Terminate(reason) => break reason,
            };
        };

        let archived_files = self.flush(counter)?;
        let stats = self.buffer.stats();
        info!(
            "Capture session ended ({:?}) after {} pairs; buffer {} writes, {} overwrites",
            reason, counter, stats.writes, stats.overwrites
        );

        Ok(SessionOutcome {
            pairs_completed: counter,
            reason,
            archived_files,
        })
    }

    fn wait_trigger(&mut self, counter: u64) -> Result<LoopState> {
        if self.cancel.is_cancelled() {
            return Ok(LoopState::Terminate(EndReason::Cancelled));
        }
        if self.session.is_complete(counter) {
            return Ok(LoopState::Terminate(EndReason::Completed));
        }

        match wait_for_trigger_ready(&mut *self.camera, &self.poll, &self.cancel)? {
            TriggerWait::Cancelled => Ok(LoopState::Terminate(EndReason::Cancelled)),
            TriggerWait::Ready => {
                if self.software_trigger {
                    fire_software_trigger(&mut *self.camera)?;
                }
                Ok(LoopState::CaptureFirst)
            }
        }
    }

    fn capture_into(&mut self, slot: usize) -> Result<u64> {
        let raw = self.camera.retrieve_frame()?;
        let frame = self.camera.convert(raw)?;
        let sum = sum_region(&frame, &self.mask)?;
        self.buffer.write(slot, frame)?;
        Ok(sum)
    }

    fn discard_pair(
        &mut self,
        counter: u64,
        error: LaserFenceError,
        consecutive_failures: &mut u32,
    ) -> Result<LoopState> {
        if !error.is_recoverable() {
            return Err(error);
        }

        *consecutive_failures += 1;
        if *consecutive_failures > self.max_pair_retries {
            return Err(CaptureError::PairFailed {
                attempts: *consecutive_failures,
                last: error.to_string(),
            }
            .into());
        }

        warn!(
            "Discarding pair {} ({}/{} retries): {}",
            counter, consecutive_failures, self.max_pair_retries, error
        );
        self.restart_acquisition()?;
        Ok(LoopState::WaitTrigger)
    }

    /// Drop frames still queued from a failed trigger event so the next pair
    /// starts on a fresh event
    fn restart_acquisition(&mut self) -> Result<()> {
        self.camera.stop_capture()?;
        self.camera.start_capture()?;
        debug!("Acquisition restarted after discarded pair");
        Ok(())
    }

    fn emit(&mut self, result: &PairResult, first_slot: usize, second_slot: usize) -> Result<()> {
        self.emitter.emit(result)?;

        if let Some(judge) = &self.judge {
            let score = PassFailJudge::score(result);
            match judge.judge(result) {
                Verdict::Pass => debug!("Pair {} PASS (score {})", result.counter, score),
                Verdict::Fail => warn!(
                    "Pair {} FAIL (score {} > {})",
                    result.counter,
                    score,
                    judge.threshold()
                ),
            }
        }

        if let Some(archiver) = self.archiver.as_mut() {
            match (self.buffer.get(first_slot), self.buffer.get(second_slot)) {
                (Some(first), Some(second)) => {
                    archiver.archive_pair(first, second, result.counter)?;
                }
                _ => warn!("Pair {} missing from frame buffer, not archived", result.counter),
            }
        }

        Ok(())
    }

    fn flush(&mut self, pairs_completed: u64) -> Result<Vec<PathBuf>> {
        let Some(archiver) = self.archiver.as_mut() else {
            return Ok(Vec::new());
        };

        let completed_slots = (pairs_completed * 2) as usize;
        archiver.flush_buffer(&self.buffer, completed_slots)?;
        Ok(archiver.written_files().to_vec())
    }
}
