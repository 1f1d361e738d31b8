//! Register-level sequences shared by every camera family.
//!
//! Addresses and bit layouts follow the IIDC register map used by
//! industrial machine-vision cameras.

use super::driver::CameraDriver;
use crate::config::{TriggerConfig, TriggerPolarity};
use crate::error::{CameraError, CaptureError, Result};
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Trigger inquiry register (software trigger presence in bit 16)
pub const TRIGGER_INQUIRY: u32 = 0x530;
/// Camera power register
pub const CAMERA_POWER: u32 = 0x610;
/// Software trigger register; bit 31 reads busy, writing it fires
pub const SOFTWARE_TRIGGER: u32 = 0x62C;
/// Trigger mode register
pub const TRIGGER_MODE: u32 = 0x830;

pub const POWER_ON: u32 = 0x8000_0000;
pub const TRIGGER_BUSY: u32 = 0x8000_0000;
pub const FIRE_SOFTWARE_TRIGGER: u32 = 0x8000_0000;
pub const SOFTWARE_TRIGGER_PRESENT: u32 = 0x0001_0000;

// Trigger mode register fields
pub const PRESENCE_INQUIRY: u32 = 1 << 31;
pub const TRIGGER_ON_OFF: u32 = 1 << 25;
pub const TRIGGER_POLARITY_HIGH: u32 = 1 << 24;
const TRIGGER_SOURCE_SHIFT: u32 = 21;
const TRIGGER_SOURCE_MASK: u32 = 0x7;
const TRIGGER_MODE_SHIFT: u32 = 16;
const TRIGGER_MODE_MASK: u32 = 0xF;
const TRIGGER_PARAMETER_MASK: u32 = 0xFFF;

/// Encode trigger settings into the trigger mode register layout (ON bit set)
pub fn encode_trigger_mode(trigger: &TriggerConfig) -> u32 {
    let mut value = TRIGGER_ON_OFF;
    if trigger.polarity == TriggerPolarity::Rising {
        value |= TRIGGER_POLARITY_HIGH;
    }
    value |= (trigger.source.register_value() & TRIGGER_SOURCE_MASK) << TRIGGER_SOURCE_SHIFT;
    value |= (trigger.mode & TRIGGER_MODE_MASK) << TRIGGER_MODE_SHIFT;
    value |= trigger.parameter & TRIGGER_PARAMETER_MASK;
    value
}

/// Source field of a trigger mode register value
pub fn decode_trigger_source(value: u32) -> u32 {
    (value >> TRIGGER_SOURCE_SHIFT) & TRIGGER_SOURCE_MASK
}

/// Frames-per-trigger field of a trigger mode register value
pub fn decode_trigger_parameter(value: u32) -> u32 {
    value & TRIGGER_PARAMETER_MASK
}

/// Retry budget for the power-up status poll
#[derive(Debug, Clone)]
pub struct PowerOnPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PowerOnPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(100),
        }
    }
}

/// Power the camera on and wait for the power bit to latch
///
/// Register read timeouts are expected while the sensor boots and are
/// retried within the budget; any other read error aborts immediately.
pub fn power_on<C: CameraDriver + ?Sized>(
    camera: &mut C,
    policy: &PowerOnPolicy,
) -> std::result::Result<(), CameraError> {
    info!("Powering on {} camera", camera.family());

    camera
        .write_register(CAMERA_POWER, POWER_ON)
        .map_err(|e| CameraError::PowerOn {
            details: e.to_string(),
        })?;

    let mut last_read_timed_out = false;
    for attempt in 1..=policy.attempts {
        thread::sleep(policy.interval);

        match camera.read_register(CAMERA_POWER) {
            Ok(value) if value & POWER_ON != 0 => {
                info!("Camera powered up after {} status reads", attempt);
                return Ok(());
            }
            Ok(value) => {
                last_read_timed_out = false;
                debug!(
                    "Power register reads 0x{:08X} (attempt {}/{})",
                    value, attempt, policy.attempts
                );
            }
            Err(e) if e.is_timeout() => {
                last_read_timed_out = true;
                debug!(
                    "Power register read timed out during power-up (attempt {}/{})",
                    attempt, policy.attempts
                );
            }
            Err(e) => {
                return Err(CameraError::PowerOn {
                    details: e.to_string(),
                });
            }
        }
    }

    if last_read_timed_out {
        Err(CameraError::PowerOnTimeout {
            attempts: policy.attempts,
        })
    } else {
        Err(CameraError::PowerOn {
            details: format!("power bit not set after {} reads", policy.attempts),
        })
    }
}

/// Poll cadence and optional deadline for the trigger-ready wait
#[derive(Debug, Clone)]
pub struct TriggerPollPolicy {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl TriggerPollPolicy {
    pub fn from_config(trigger: &TriggerConfig) -> Self {
        Self {
            interval: trigger.poll_interval(),
            timeout: trigger.wait_timeout(),
        }
    }
}

/// Result of waiting for the trigger to arm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerWait {
    Ready,
    Cancelled,
}

/// Wait until the camera can accept the next trigger
///
/// Cancellation is checked before every register read. A register error is
/// fatal; exceeding the policy timeout ends the wait with
/// [`CaptureError::TriggerTimeout`].
pub fn wait_for_trigger_ready<C: CameraDriver + ?Sized>(
    camera: &mut C,
    policy: &TriggerPollPolicy,
    cancel: &CancellationToken,
) -> Result<TriggerWait> {
    let started = Instant::now();
    let mut polls: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            debug!("Trigger wait cancelled after {} polls", polls);
            return Ok(TriggerWait::Cancelled);
        }

        let value = camera.read_register(SOFTWARE_TRIGGER)?;
        polls += 1;

        if value & TRIGGER_BUSY == 0 {
            trace!("Trigger ready after {} polls", polls);
            return Ok(TriggerWait::Ready);
        }

        if let Some(timeout) = policy.timeout {
            let waited = started.elapsed();
            if waited >= timeout {
                warn!("Trigger not ready after {:?} ({} polls)", waited, polls);
                return Err(CaptureError::TriggerTimeout {
                    waited_ms: waited.as_millis() as u64,
                }
                .into());
            }
        }

        thread::sleep(policy.interval);
    }
}

/// Whether the camera implements the software trigger register
pub fn software_trigger_present<C: CameraDriver + ?Sized>(
    camera: &mut C,
) -> std::result::Result<bool, CameraError> {
    let value = camera.read_register(TRIGGER_INQUIRY)?;
    Ok(value & SOFTWARE_TRIGGER_PRESENT != 0)
}

/// Fire one software trigger pulse
pub fn fire_software_trigger<C: CameraDriver + ?Sized>(
    camera: &mut C,
) -> std::result::Result<(), CameraError> {
    trace!("Firing software trigger");
    camera.write_register(SOFTWARE_TRIGGER, FIRE_SOFTWARE_TRIGGER)
}
