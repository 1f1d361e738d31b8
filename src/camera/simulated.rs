use super::driver::{CameraDriver, GrabTimeout};
use super::registers::{
    decode_trigger_parameter, decode_trigger_source, CAMERA_POWER, FIRE_SOFTWARE_TRIGGER,
    POWER_ON, PRESENCE_INQUIRY, SOFTWARE_TRIGGER, SOFTWARE_TRIGGER_PRESENT, TRIGGER_BUSY,
    TRIGGER_INQUIRY, TRIGGER_MODE, TRIGGER_ON_OFF,
};
use crate::config::{SimulatedConfig, TriggerSource};
use crate::error::CameraError;
use crate::frame::{PixelFormat, RawFrame};
use std::collections::HashMap;
use tracing::{debug, info, trace};

/// In-process emulation of a triggered multishot camera
///
/// Models the registers the capture sequence touches: the power register
/// latches after a configurable number of status reads, the software
/// trigger register reads busy for `ready_polls` reads after each pair, and
/// each trigger releases as many frames as the trigger parameter asks for.
/// An external (GPIO) source is treated as pulsing whenever the camera is
/// armed; a software source only delivers frames after a fire.
pub struct SimulatedCamera {
    config: SimulatedConfig,
    width: u32,
    height: u32,
    registers: HashMap<u32, u32>,
    connected: bool,
    capturing: bool,
    grab_timeout: GrabTimeout,
    power_reads_remaining: u32,
    busy_reads_remaining: u32,
    frames_pending: u32,
    frame_in_pair: u32,
    sequence: u64,
}

impl SimulatedCamera {
    pub fn new(config: SimulatedConfig, resolution: (u32, u32)) -> Self {
        let mut registers = HashMap::new();
        registers.insert(TRIGGER_MODE, PRESENCE_INQUIRY);
        registers.insert(TRIGGER_INQUIRY, SOFTWARE_TRIGGER_PRESENT);
        registers.insert(CAMERA_POWER, 0);

        Self {
            config,
            width: resolution.0,
            height: resolution.1,
            registers,
            connected: false,
            capturing: false,
            grab_timeout: GrabTimeout::Infinite,
            power_reads_remaining: 0,
            busy_reads_remaining: 0,
            frames_pending: 0,
            frame_in_pair: 0,
            sequence: 0,
        }
    }

    /// Frames delivered so far
    pub fn frame_count(&self) -> u64 {
        self.sequence
    }

    pub fn grab_timeout(&self) -> GrabTimeout {
        self.grab_timeout
    }

    fn ensure_connected(&self) -> Result<(), CameraError> {
        if self.connected {
            Ok(())
        } else {
            Err(CameraError::NotConnected)
        }
    }

    fn trigger_mode(&self) -> u32 {
        self.registers.get(&TRIGGER_MODE).copied().unwrap_or(0)
    }

    fn external_source(&self) -> bool {
        decode_trigger_source(self.trigger_mode()) != TriggerSource::Software.register_value()
    }

    fn frames_per_trigger(&self) -> u32 {
        let mode = self.trigger_mode();
        if mode & TRIGGER_ON_OFF == 0 {
            1
        } else {
            decode_trigger_parameter(mode).max(1)
        }
    }
}

impl CameraDriver for SimulatedCamera {
    fn family(&self) -> &'static str {
        "simulated"
    }

    fn connect(&mut self, index: u32) -> Result<(), CameraError> {
        if index != 0 {
            return Err(CameraError::Connect {
                index,
                details: "simulated bus has a single camera".to_string(),
            });
        }
        info!(
            "Connected to simulated camera {} ({}x{})",
            index, self.width, self.height
        );
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), CameraError> {
        self.ensure_connected()?;
        self.connected = false;
        self.capturing = false;
        debug!("Simulated camera disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_register(&mut self, address: u32) -> Result<u32, CameraError> {
        self.ensure_connected()?;

        match address {
            CAMERA_POWER => {
                let value = self.registers.get(&CAMERA_POWER).copied().unwrap_or(0);
                if self.power_reads_remaining > 0 {
                    self.power_reads_remaining -= 1;
                    Ok(value & !POWER_ON)
                } else {
                    Ok(value)
                }
            }
            SOFTWARE_TRIGGER => {
                if self.busy_reads_remaining > 0 {
                    self.busy_reads_remaining -= 1;
                    Ok(TRIGGER_BUSY)
                } else {
                    Ok(0)
                }
            }
            _ => self
                .registers
                .get(&address)
                .copied()
                .ok_or_else(|| CameraError::Register {
                    address,
                    details: "unmapped register".to_string(),
                }),
        }
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), CameraError> {
        self.ensure_connected()?;
        trace!("Simulated register write 0x{:03X} <- 0x{:08X}", address, value);

        match address {
            CAMERA_POWER => {
                if value & POWER_ON != 0 {
                    self.power_reads_remaining = self.config.power_up_reads;
                }
                self.registers.insert(CAMERA_POWER, value);
            }
            SOFTWARE_TRIGGER => {
                if value & FIRE_SOFTWARE_TRIGGER != 0 {
                    if self.busy_reads_remaining > 0 {
                        return Err(CameraError::Register {
                            address,
                            details: "software trigger fired while busy".to_string(),
                        });
                    }
                    self.frames_pending = self.frames_per_trigger();
                    self.frame_in_pair = 0;
                }
            }
            TRIGGER_MODE => {
                self.registers
                    .insert(TRIGGER_MODE, value | PRESENCE_INQUIRY);
            }
            _ => {
                self.registers.insert(address, value);
            }
        }
        Ok(())
    }

    fn set_grab_timeout(&mut self, timeout: GrabTimeout) -> Result<(), CameraError> {
        self.ensure_connected()?;
        debug!("Simulated grab timeout set to {}", timeout);
        self.grab_timeout = timeout;
        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), CameraError> {
        self.ensure_connected()?;
        if self.registers.get(&CAMERA_POWER).copied().unwrap_or(0) & POWER_ON == 0 {
            return Err(CameraError::Configuration {
                details: "camera is not powered".to_string(),
            });
        }
        self.capturing = true;
        self.busy_reads_remaining = self.config.ready_polls;
        info!("Simulated capture started");
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<(), CameraError> {
        self.ensure_connected()?;
        self.capturing = false;
        self.frames_pending = 0;
        info!("Simulated capture stopped");
        Ok(())
    }

    fn retrieve_frame(&mut self) -> Result<RawFrame, CameraError> {
        self.ensure_connected()?;
        if !self.capturing {
            return Err(CameraError::Retrieve {
                details: "capture not started".to_string(),
            });
        }

        if self.frames_pending == 0 {
            if self.external_source() {
                // Armed camera on a GPIO line: the next pulse arrives now
                self.frames_pending = self.frames_per_trigger();
                self.frame_in_pair = 0;
            } else {
                return Err(CameraError::Retrieve {
                    details: format!(
                        "no software trigger fired (grab timeout {})",
                        self.grab_timeout
                    ),
                });
            }
        }

        let intensity = if self.frame_in_pair % 2 == 0 {
            self.config.first_intensity
        } else {
            self.config.second_intensity
        };

        let pixels = vec![intensity; self.width as usize * self.height as usize];
        let frame = RawFrame::new(self.sequence, self.width, self.height, PixelFormat::Mono8, pixels);

        self.sequence += 1;
        self.frame_in_pair += 1;
        self.frames_pending -= 1;
        if self.frames_pending == 0 {
            self.busy_reads_remaining = self.config.ready_polls;
        }

        trace!("Simulated frame {} (intensity {})", frame.sequence, intensity);
        Ok(frame)
    }
}
