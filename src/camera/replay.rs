use super::driver::{CameraDriver, GrabTimeout};
use super::registers::{
    CAMERA_POWER, POWER_ON, PRESENCE_INQUIRY, SOFTWARE_TRIGGER, SOFTWARE_TRIGGER_PRESENT,
    TRIGGER_INQUIRY, TRIGGER_MODE,
};
use crate::archive::LATEST_PAIR_STEMS;
use crate::config::ReplayConfig;
use crate::error::CameraError;
use crate::frame::{PixelFormat, RawFrame};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

const REPLAY_EXTENSIONS: &[&str] = &["pgm", "pnm", "png"];

/// Plays back archived frames from a directory as if a camera delivered them
///
/// Files are served in natural name order (`snapshot_2` before
/// `snapshot_10`), so a debug run's `snapshot_0 .. snapshot_N` or
/// `pair_*_image{1,2}` dumps replay as the pairs they were captured in. The
/// `image1`/`image2` latest-pair dumps are skipped since they only hold the
/// last pair again. Restarting capture drops the unread half of a pair. The
/// register plane is always powered and always armed.
pub struct ReplayCamera {
    directory: PathBuf,
    repeat: bool,
    files: Vec<PathBuf>,
    cursor: usize,
    registers: HashMap<u32, u32>,
    connected: bool,
    capturing: bool,
    sequence: u64,
}

impl ReplayCamera {
    pub fn new(config: &ReplayConfig) -> Self {
        let mut registers = HashMap::new();
        registers.insert(TRIGGER_MODE, PRESENCE_INQUIRY);
        registers.insert(TRIGGER_INQUIRY, SOFTWARE_TRIGGER_PRESENT);
        registers.insert(CAMERA_POWER, 0);

        Self {
            directory: PathBuf::from(&config.directory),
            repeat: config.repeat,
            files: Vec::new(),
            cursor: 0,
            registers,
            connected: false,
            capturing: false,
            sequence: 0,
        }
    }

    /// Files queued for playback
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn scan(directory: &Path) -> Result<Vec<PathBuf>, CameraError> {
        let entries = std::fs::read_dir(directory).map_err(|e| CameraError::Connect {
            index: 0,
            details: format!("cannot read {}: {}", directory.display(), e),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| REPLAY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .filter(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(|stem| !LATEST_PAIR_STEMS.contains(&stem))
                    .unwrap_or(true)
            })
            .collect();
        files.sort_by_cached_key(|path| natural_key(path));
        Ok(files)
    }

    fn load(&self, path: &Path) -> Result<RawFrame, CameraError> {
        let image = image::open(path).map_err(|e| CameraError::Retrieve {
            details: format!("cannot decode {}: {}", path.display(), e),
        })?;
        let gray = image.into_luma8();
        let (width, height) = gray.dimensions();
        Ok(RawFrame::new(
            self.sequence,
            width,
            height,
            PixelFormat::Mono8,
            gray.into_raw(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NameChunk {
    Number(u64),
    Text(String),
}

/// Split a file name into text and number runs so numbers compare by value
fn natural_key(path: &Path) -> Vec<NameChunk> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut chunks = Vec::new();
    let mut run = String::new();
    let mut in_digits = false;
    for c in name.chars() {
        if c.is_ascii_digit() != in_digits && !run.is_empty() {
            chunks.push(name_chunk(std::mem::take(&mut run), in_digits));
        }
        in_digits = c.is_ascii_digit();
        run.push(c);
    }
    if !run.is_empty() {
        chunks.push(name_chunk(run, in_digits));
    }
    chunks
}

fn name_chunk(run: String, digits: bool) -> NameChunk {
    match (digits, run.parse()) {
        (true, Ok(number)) => NameChunk::Number(number),
        _ => NameChunk::Text(run),
    }
}

impl CameraDriver for ReplayCamera {
    fn family(&self) -> &'static str {
        "replay"
    }

    fn connect(&mut self, index: u32) -> Result<(), CameraError> {
        self.files = Self::scan(&self.directory)?;
        if self.files.is_empty() {
            return Err(CameraError::Connect {
                index,
                details: format!("no frames found in {}", self.directory.display()),
            });
        }
        info!(
            "Replaying {} frames from {}",
            self.files.len(),
            self.directory.display()
        );
        self.connected = true;
        self.cursor = 0;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), CameraError> {
        self.connected = false;
        self.capturing = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_register(&mut self, address: u32) -> Result<u32, CameraError> {
        if !self.connected {
            return Err(CameraError::NotConnected);
        }
        match address {
            SOFTWARE_TRIGGER => Ok(0),
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
        if !self.connected {
            return Err(CameraError::NotConnected);
        }
        match address {
            SOFTWARE_TRIGGER => {}
            CAMERA_POWER => {
                self.registers.insert(CAMERA_POWER, value & POWER_ON);
            }
            _ => {
                self.registers.insert(address, value);
            }
        }
        Ok(())
    }

    fn set_grab_timeout(&mut self, timeout: GrabTimeout) -> Result<(), CameraError> {
        debug!("Replay ignores grab timeout ({})", timeout);
        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), CameraError> {
        if !self.connected {
            return Err(CameraError::NotConnected);
        }
        if self.cursor % 2 == 1 {
            debug!("Skipping unread second frame of an interrupted pair");
            self.cursor += 1;
        }
        self.capturing = true;
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<(), CameraError> {
        self.capturing = false;
        Ok(())
    }

    fn retrieve_frame(&mut self) -> Result<RawFrame, CameraError> {
        if !self.capturing {
            return Err(CameraError::Retrieve {
                details: "capture not started".to_string(),
            });
        }

        if self.cursor >= self.files.len() {
            if !self.repeat {
                // Fatal: nothing left to play
                return Err(CameraError::Configuration {
                    details: format!("replay of {} exhausted", self.directory.display()),
                });
            }
            warn!("Replay exhausted, starting over");
            self.cursor = 0;
        }

        let path = self.files[self.cursor].clone();
        self.cursor += 1;

        let frame = self.load(&path)?;
        trace!("Replayed {} as frame {}", path.display(), frame.sequence);
        self.sequence += 1;
        Ok(frame)
    }
}
