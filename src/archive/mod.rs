mod metadata;
pub mod pgm;
pub mod snapshot;
#[cfg(test)]
mod tests;

pub use metadata::{SessionMetadata, METADATA_FILE};

use crate::config::{ArchiveConfig, ArchivePolicy, SnapshotFormat};
use crate::error::{ArchiveError, LaserFenceError, Result};
use crate::frame::Frame;
use crate::frame_buffer::FrameBuffer;
use crate::region::Mask;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const WRITE_PROBE: &str = ".laserfence_write_probe";

/// File stems of the `latest_pair` dumps, overwritten on every pair
pub const LATEST_PAIR_STEMS: [&str; 2] = ["image1", "image2"];

/// Persists debug captures of a batch session
pub struct DiskArchiver {
    root: PathBuf,
    policy: ArchivePolicy,
    snapshot_format: SnapshotFormat,
    overlay: Option<Mask>,
    written: Vec<PathBuf>,
}

impl DiskArchiver {
    pub fn new(config: &ArchiveConfig, mask: &Mask) -> Self {
        let snapshot_format = if cfg!(feature = "imaging") {
            config.snapshot_format
        } else {
            if config.snapshot_format == SnapshotFormat::Png {
                warn!("Built without the `imaging` feature, writing PGM snapshots instead of PNG");
            }
            SnapshotFormat::Pgm
        };

        Self {
            root: PathBuf::from(&config.path),
            policy: config.policy,
            snapshot_format,
            overlay: config.mask_overlay.then_some(*mask),
            written: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every distinct file written so far, in first-write order
    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }

    /// Dump both frames of a pair as PGM rasters and CSV text
    pub fn archive_pair(
        &mut self,
        first: &Frame,
        second: &Frame,
        counter: u64,
    ) -> std::result::Result<Vec<PathBuf>, ArchiveError> {
        let mut paths = Vec::with_capacity(4);

        for (image, frame) in [(1, first), (2, second)] {
            let stem = self.pair_stem(image, counter);
            let pgm_path = self.root.join(format!("{}.pgm", stem));
            let csv_path = self.root.join(format!("{}.csv", stem));

            pgm::write_pgm(&pgm_path, frame)?;
            pgm::write_csv(&csv_path, frame)?;

            paths.push(pgm_path);
            paths.push(csv_path);
        }

        debug!("Archived pair {} to {}", counter, self.root.display());
        for path in &paths {
            self.record(path.clone());
        }
        Ok(paths)
    }

    /// Write buffered frames in slots below `slot_limit` to `snapshot_{slot}`
    pub fn flush_buffer(
        &mut self,
        buffer: &FrameBuffer,
        slot_limit: usize,
    ) -> std::result::Result<Vec<PathBuf>, ArchiveError> {
        let mut paths = Vec::new();

        for (slot, frame) in buffer.filled().filter(|(slot, _)| *slot < slot_limit) {
            let path = self
                .root
                .join(format!("snapshot_{}.{}", slot, self.snapshot_format.extension()));
            snapshot::save_frame(frame, &path, self.snapshot_format, self.overlay.as_ref())?;
            paths.push(path);
        }

        info!(
            "Flushed {} buffered frames to {}",
            paths.len(),
            self.root.display()
        );
        for path in &paths {
            self.record(path.clone());
        }
        Ok(paths)
    }

    pub fn write_metadata(
        &mut self,
        metadata: &SessionMetadata,
    ) -> std::result::Result<PathBuf, ArchiveError> {
        let path = metadata::save_metadata(metadata, &self.root)?;
        self.record(path.clone());
        Ok(path)
    }

    fn pair_stem(&self, image: u8, counter: u64) -> String {
        match self.policy {
            ArchivePolicy::LatestPair => format!("image{}", image),
            ArchivePolicy::EveryPair => format!("pair_{:05}_image{}", counter, image),
        }
    }

    fn record(&mut self, path: PathBuf) {
        if !self.written.contains(&path) {
            self.written.push(path);
        }
    }
}

/// Make sure `directory` exists and accepts new files
pub fn ensure_writable(directory: &Path) -> Result<()> {
    let permission_error = |source| LaserFenceError::FilesystemPermission {
        path: directory.to_path_buf(),
        source,
    };

    fs::create_dir_all(directory).map_err(permission_error)?;

    let probe = directory.join(WRITE_PROBE);
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
        .map_err(permission_error)?;
    fs::remove_file(&probe).map_err(permission_error)?;

    debug!("Archive directory {} is writable", directory.display());
    Ok(())
}
