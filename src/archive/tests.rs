use super::*;
use crate::capture::{EndReason, SessionOutcome};
use crate::config::LaserFenceConfig;

fn archive_config(dir: &Path, policy: ArchivePolicy, format: SnapshotFormat) -> ArchiveConfig {
    ArchiveConfig {
        path: dir.to_string_lossy().to_string(),
        policy,
        snapshot_format: format,
        mask_overlay: false,
        save_metadata: true,
    }
}

fn mask() -> Mask {
    Mask::new(0, 0, 1, 1).unwrap()
}

#[test]
fn test_latest_pair_overwrites_fixed_names() {
    let dir = tempfile::tempdir().unwrap();
    let config = archive_config(dir.path(), ArchivePolicy::LatestPair, SnapshotFormat::Pgm);
    let mut archiver = DiskArchiver::new(&config, &mask());

    archiver
        .archive_pair(&Frame::filled(3, 2, 9), &Frame::filled(3, 2, 8), 0)
        .unwrap();
    archiver
        .archive_pair(&Frame::filled(3, 2, 4), &Frame::filled(3, 2, 3), 1)
        .unwrap();

    assert_eq!(archiver.written_files().len(), 4);
    let image1 = fs::read(dir.path().join("image1.pgm")).unwrap();
    assert_eq!(image1, pgm::encode_pgm(&Frame::filled(3, 2, 4)));
    let image2 = fs::read_to_string(dir.path().join("image2.csv")).unwrap();
    assert_eq!(image2, "3,3,3,\n3,3,3,\n");
}

#[test]
fn test_every_pair_keeps_numbered_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = archive_config(dir.path(), ArchivePolicy::EveryPair, SnapshotFormat::Pgm);
    let mut archiver = DiskArchiver::new(&config, &mask());

    for counter in 0..3 {
        archiver
            .archive_pair(&Frame::filled(2, 2, 1), &Frame::filled(2, 2, 2), counter)
            .unwrap();
    }

    assert_eq!(archiver.written_files().len(), 12);
    assert!(dir.path().join("pair_00000_image1.pgm").exists());
    assert!(dir.path().join("pair_00002_image2.csv").exists());
    assert!(!dir.path().join("image1.pgm").exists());
}

#[test]
fn test_flush_respects_slot_limit() {
    let dir = tempfile::tempdir().unwrap();
    let config = archive_config(dir.path(), ArchivePolicy::LatestPair, SnapshotFormat::Pgm);
    let mut archiver = DiskArchiver::new(&config, &mask());

    let mut buffer = FrameBuffer::allocate(4).unwrap();
    for slot in 0..3 {
        buffer.write(slot, Frame::filled(2, 2, slot as u8)).unwrap();
    }

    let paths = archiver.flush_buffer(&buffer, 2).unwrap();

    assert_eq!(paths.len(), 2);
    assert!(dir.path().join("snapshot_0.pgm").exists());
    assert!(dir.path().join("snapshot_1.pgm").exists());
    assert!(!dir.path().join("snapshot_2.pgm").exists());
}

#[cfg(feature = "imaging")]
#[test]
fn test_flush_writes_png_snapshots_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LaserFenceConfig::default().archive;
    config.path = dir.path().to_string_lossy().to_string();
    let mut archiver = DiskArchiver::new(&config, &mask());

    let mut buffer = FrameBuffer::allocate(2).unwrap();
    buffer.write(0, Frame::filled(4, 4, 10)).unwrap();
    buffer.write(1, Frame::filled(4, 4, 20)).unwrap();
    archiver.flush_buffer(&buffer, 2).unwrap();

    assert!(dir.path().join("snapshot_0.png").exists());
    assert!(dir.path().join("snapshot_1.png").exists());
}

#[test]
fn test_session_metadata_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = archive_config(dir.path(), ArchivePolicy::LatestPair, SnapshotFormat::Pgm);
    let mut archiver = DiskArchiver::new(&config, &mask());

    let mut metadata = SessionMetadata::start("simulated", mask(), 4);
    metadata.finish(&SessionOutcome {
        pairs_completed: 2,
        reason: EndReason::Completed,
        archived_files: vec![dir.path().join("snapshot_0.pgm")],
    });
    let path = archiver.write_metadata(&metadata).unwrap();

    assert_eq!(path, dir.path().join(METADATA_FILE));
    let parsed: SessionMetadata =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed, metadata);
    assert_eq!(parsed.end_reason, Some(EndReason::Completed));
    assert!(parsed.finished_at.is_some());
}

#[test]
fn test_ensure_writable_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("captures").join("today");

    ensure_writable(&nested).unwrap();

    assert!(nested.is_dir());
    assert!(!nested.join(WRITE_PROBE).exists());
}

#[test]
fn test_ensure_writable_rejects_file_path() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("not_a_directory");
    fs::write(&file, b"occupied").unwrap();

    match ensure_writable(&file) {
        Err(LaserFenceError::FilesystemPermission { path, .. }) => assert_eq!(path, file),
        other => panic!("Expected filesystem permission error, got {:?}", other),
    }
}
