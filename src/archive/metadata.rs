use super::pgm::write_file;
use crate::capture::{EndReason, SessionOutcome};
use crate::error::ArchiveError;
use crate::region::Mask;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

pub const METADATA_FILE: &str = "session.json";

/// Record of a batch run written next to its captures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMetadata {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub camera_backend: String,
    pub mask: Mask,
    pub capture_count: u32,
    pub pairs_completed: u64,
    pub end_reason: Option<EndReason>,
    pub files: Vec<PathBuf>,
}

impl SessionMetadata {
    pub fn start(camera_backend: &str, mask: Mask, capture_count: u32) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            camera_backend: camera_backend.to_string(),
            mask,
            capture_count,
            pairs_completed: 0,
            end_reason: None,
            files: Vec::new(),
        }
    }

    pub fn finish(&mut self, outcome: &SessionOutcome) {
        self.finished_at = Some(Utc::now());
        self.pairs_completed = outcome.pairs_completed;
        self.end_reason = Some(outcome.reason);
        self.files = outcome.archived_files.clone();
    }
}

pub(crate) fn save_metadata(
    metadata: &SessionMetadata,
    directory: &Path,
) -> Result<PathBuf, ArchiveError> {
    let metadata_json = serde_json::to_string_pretty(metadata)?;
    let metadata_path = directory.join(METADATA_FILE);
    write_file(&metadata_path, metadata_json.as_bytes())?;

    debug!("Saved session metadata to {}", metadata_path.display());
    Ok(metadata_path)
}
