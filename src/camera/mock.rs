use super::driver::{CameraDriver, GrabTimeout};
use super::registers::{CAMERA_POWER, POWER_ON, PRESENCE_INQUIRY, SOFTWARE_TRIGGER, TRIGGER_INQUIRY, TRIGGER_MODE};
use crate::error::CameraError;
use crate::frame::{PixelFormat, RawFrame};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Hardware call recorded by [`MockCamera`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Connect(u32),
    Disconnect,
    ReadRegister(u32),
    WriteRegister(u32, u32),
    SetGrabTimeout(GrabTimeout),
    StartCapture,
    StopCapture,
    Retrieve,
}

/// Shared view of the calls a mock received, usable after the mock is boxed
#[derive(Debug, Clone, Default)]
pub struct MockCallLog(Arc<Mutex<Vec<MockCall>>>);

impl MockCallLog {
    fn push(&self, call: MockCall) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.0.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.calls().is_empty()
    }

    pub fn count(&self, call: &MockCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn retrieves(&self) -> usize {
        self.count(&MockCall::Retrieve)
    }
}

/// Scripted camera driver for tests without real hardware
///
/// Register reads and frame retrievals are served from scripts; once a
/// script runs dry the mock answers like a healthy, powered, armed camera
/// delivering uniform frames.
pub struct MockCamera {
    width: u32,
    height: u32,
    intensities: Vec<u8>,
    registers: HashMap<u32, u32>,
    power_reads: VecDeque<Result<u32, CameraError>>,
    trigger_reads: VecDeque<Result<u32, CameraError>>,
    frames: VecDeque<Result<RawFrame, CameraError>>,
    cancel_on_retrieve: Option<(usize, CancellationToken)>,
    connected: bool,
    sequence: u64,
    event_position: usize,
    log: MockCallLog,
}

impl MockCamera {
    pub fn new(width: u32, height: u32) -> Self {
        let mut registers = HashMap::new();
        registers.insert(TRIGGER_MODE, PRESENCE_INQUIRY);
        registers.insert(TRIGGER_INQUIRY, 0);

        Self {
            width,
            height,
            intensities: vec![0],
            registers,
            power_reads: VecDeque::new(),
            trigger_reads: VecDeque::new(),
            frames: VecDeque::new(),
            cancel_on_retrieve: None,
            connected: false,
            sequence: 0,
            event_position: 0,
            log: MockCallLog::default(),
        }
    }

    /// Cycle generated frames through these uniform intensities
    ///
    /// The cycle restarts whenever capture is started, so with two
    /// intensities the first one always marks the first frame of a pair.
    pub fn with_intensities(mut self, intensities: &[u8]) -> Self {
        if !intensities.is_empty() {
            self.intensities = intensities.to_vec();
        }
        self
    }

    pub fn without_trigger_support(mut self) -> Self {
        self.registers.insert(TRIGGER_MODE, 0);
        self
    }

    pub fn with_register(mut self, address: u32, value: u32) -> Self {
        self.registers.insert(address, value);
        self
    }

    /// Queue results for successive power register reads
    pub fn script_power_reads(mut self, reads: Vec<Result<u32, CameraError>>) -> Self {
        self.power_reads.extend(reads);
        self
    }

    /// Queue results for successive trigger-ready register reads
    pub fn script_trigger_reads(mut self, reads: Vec<Result<u32, CameraError>>) -> Self {
        self.trigger_reads.extend(reads);
        self
    }

    /// Queue results for successive retrievals, ahead of generated frames
    pub fn script_frames(mut self, frames: Vec<Result<RawFrame, CameraError>>) -> Self {
        self.frames.extend(frames);
        self
    }

    /// Cancel `token` while serving the `nth` retrieval (1-based)
    pub fn cancel_on_retrieve(mut self, nth: usize, token: CancellationToken) -> Self {
        self.cancel_on_retrieve = Some((nth, token));
        self
    }

    pub fn call_log(&self) -> MockCallLog {
        self.log.clone()
    }

    fn generated_frame(&self) -> RawFrame {
        let intensity = self.intensities[self.event_position % self.intensities.len()];
        RawFrame::new(
            self.sequence,
            self.width,
            self.height,
            PixelFormat::Mono8,
            vec![intensity; self.width as usize * self.height as usize],
        )
    }
}

impl CameraDriver for MockCamera {
    fn family(&self) -> &'static str {
        "mock"
    }

    fn connect(&mut self, index: u32) -> Result<(), CameraError> {
        self.log.push(MockCall::Connect(index));
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), CameraError> {
        self.log.push(MockCall::Disconnect);
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_register(&mut self, address: u32) -> Result<u32, CameraError> {
        self.log.push(MockCall::ReadRegister(address));
        match address {
            CAMERA_POWER => self.power_reads.pop_front().unwrap_or(Ok(POWER_ON)),
            SOFTWARE_TRIGGER => self.trigger_reads.pop_front().unwrap_or(Ok(0)),
            _ => Ok(self.registers.get(&address).copied().unwrap_or(0)),
        }
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), CameraError> {
        self.log.push(MockCall::WriteRegister(address, value));
        if address != SOFTWARE_TRIGGER {
            self.registers.insert(address, value);
        }
        Ok(())
    }

    fn set_grab_timeout(&mut self, timeout: GrabTimeout) -> Result<(), CameraError> {
        self.log.push(MockCall::SetGrabTimeout(timeout));
        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), CameraError> {
        self.log.push(MockCall::StartCapture);
        self.event_position = 0;
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<(), CameraError> {
        self.log.push(MockCall::StopCapture);
        Ok(())
    }

    fn retrieve_frame(&mut self) -> Result<RawFrame, CameraError> {
        self.log.push(MockCall::Retrieve);

        if let Some((nth, token)) = &self.cancel_on_retrieve {
            if self.log.retrieves() == *nth {
                token.cancel();
            }
        }

        let result = match self.frames.pop_front() {
            Some(scripted) => scripted,
            None => Ok(self.generated_frame()),
        };
        self.sequence += 1;
        self.event_position += 1;
        result
    }
}
