use super::*;
use crate::archive::METADATA_FILE;
use crate::camera::registers::{CAMERA_POWER, SOFTWARE_TRIGGER_PRESENT, TRIGGER_INQUIRY};
use crate::camera::{MockCall, MockCallLog, MockCamera};
use crate::capture::EndReason;
use crate::config::{LaserFenceConfig, SnapshotFormat, TriggerSource};
use crate::error::{CameraError, LaserFenceError};
use crate::region::Mask;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Result sink that stays readable after the app takes ownership of it
#[derive(Clone, Default)]
struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn test_config(archive_dir: &Path, capture_count: u32) -> LaserFenceConfig {
    let mut config = LaserFenceConfig::default();
    config.camera.resolution = (16, 8);
    config.camera.power_on_interval_ms = 0;
    config.mask = Mask::new(2, 2, 5, 9).unwrap();
    config.session.capture_count = capture_count;
    config.archive.path = archive_dir.to_string_lossy().to_string();
    config.archive.snapshot_format = SnapshotFormat::Pgm;
    config
}

fn mock_app(config: LaserFenceConfig, camera: MockCamera) -> (LaserFenceApp, MockCallLog, SharedOutput) {
    let log = camera.call_log();
    let output = SharedOutput::default();
    let app = LaserFenceApp::with_parts(config, Box::new(camera), Box::new(output.clone()));
    (app, log, output)
}

#[test]
fn test_odd_capture_count_rejected_before_hardware() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, log, output) = mock_app(test_config(dir.path(), 7), MockCamera::new(16, 8));

    let result = app.run_blocking();

    match result {
        Err(e @ LaserFenceError::Validation { .. }) => assert_eq!(e.exit_code(), 2),
        other => panic!("Expected validation error, got {:?}", other),
    }
    assert!(log.is_empty());
    assert!(output.lines().is_empty());
    assert_eq!(app.state(), AppState::Failed);
}

#[test]
fn test_batch_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let camera = MockCamera::new(16, 8).with_intensities(&[9, 3]);
    let (mut app, log, output) = mock_app(test_config(dir.path(), 4), camera);

    let outcome = app.run_blocking().unwrap();

    assert_eq!(outcome.pairs_completed, 2);
    assert_eq!(outcome.reason, EndReason::Completed);

    // Mask covers 4 rows by 8 columns
    let lines = output.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("0 288 96 "));
    assert!(lines[1].starts_with("1 288 96 "));

    for slot in 0..4 {
        assert!(dir.path().join(format!("snapshot_{}.pgm", slot)).exists());
    }
    let metadata = std::fs::read_to_string(dir.path().join(METADATA_FILE)).unwrap();
    assert!(metadata.contains("\"pairs_completed\": 2"));
    assert!(metadata.contains("\"end_reason\": \"completed\""));

    let calls = log.calls();
    assert_eq!(calls.first(), Some(&MockCall::Connect(0)));
    assert!(calls.contains(&MockCall::WriteRegister(CAMERA_POWER, 0x8000_0000)));
    assert!(calls.contains(&MockCall::StartCapture));
    assert!(calls.contains(&MockCall::StopCapture));
    assert_eq!(calls.last(), Some(&MockCall::Disconnect));
    assert_eq!(app.state(), AppState::Stopped);
}

#[test]
fn test_unwritable_archive_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("occupied");
    std::fs::write(&blocker, b"file, not a directory").unwrap();
    let (mut app, log, _) = mock_app(test_config(&blocker, 2), MockCamera::new(16, 8));

    match app.run_blocking() {
        Err(e @ LaserFenceError::FilesystemPermission { .. }) => assert_eq!(e.exit_code(), 3),
        other => panic!("Expected filesystem permission error, got {:?}", other),
    }
    assert!(log.is_empty());
}

#[test]
fn test_trigger_unsupported_still_disconnects() {
    let dir = tempfile::tempdir().unwrap();
    let camera = MockCamera::new(16, 8).without_trigger_support();
    let (mut app, log, _) = mock_app(test_config(dir.path(), 2), camera);

    let result = app.run_blocking();

    assert!(matches!(
        result,
        Err(LaserFenceError::Camera(CameraError::TriggerUnsupported))
    ));
    assert_eq!(log.retrieves(), 0);
    assert_eq!(log.calls().last(), Some(&MockCall::Disconnect));
}

#[test]
fn test_software_source_requires_trigger_register() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), 2);
    config.camera.trigger.source = TriggerSource::Software;

    let (mut app, _, _) = mock_app(config.clone(), MockCamera::new(16, 8));
    assert!(matches!(
        app.run_blocking(),
        Err(LaserFenceError::Camera(CameraError::TriggerUnsupported))
    ));

    let camera = MockCamera::new(16, 8).with_register(TRIGGER_INQUIRY, SOFTWARE_TRIGGER_PRESENT);
    let (mut app, _, output) = mock_app(config, camera);
    assert_eq!(app.run_blocking().unwrap().pairs_completed, 1);
    assert_eq!(output.lines().len(), 1);
}

#[test]
fn test_power_on_failure_is_camera_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), 2);
    config.camera.power_on_attempts = 2;
    let camera = MockCamera::new(16, 8).script_power_reads(vec![Ok(0), Ok(0)]);
    let (mut app, log, _) = mock_app(config, camera);

    match app.run_blocking() {
        Err(e @ LaserFenceError::Camera(CameraError::PowerOn { .. })) => {
            assert_eq!(e.exit_code(), 4)
        }
        other => panic!("Expected power-on error, got {:?}", other),
    }
    assert!(!log.calls().contains(&MockCall::StartCapture));
}

#[tokio::test]
async fn test_run_stops_when_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let (app, log, output) = mock_app(test_config(dir.path(), 0), MockCamera::new(16, 8));
    app.cancellation_token().cancel();

    let outcome = app.run().await.unwrap();

    assert_eq!(outcome.reason, EndReason::Cancelled);
    assert_eq!(outcome.pairs_completed, 0);
    assert!(output.lines().is_empty());
    assert!(log.calls().contains(&MockCall::StartCapture));
    assert_eq!(log.retrieves(), 0);
}

#[tokio::test]
async fn test_streaming_run_emits_until_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 0);
    let camera = MockCamera::new(16, 8).with_intensities(&[1, 2]);
    let output = SharedOutput::default();
    let app = LaserFenceApp::with_parts(config, Box::new(camera), Box::new(output.clone()));
    let cancel = app.cancellation_token();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
    });
    let outcome = app.run().await.unwrap();
    canceller.await.unwrap();

    assert_eq!(outcome.reason, EndReason::Cancelled);
    assert_eq!(output.lines().len() as u64, outcome.pairs_completed);
    assert!(!dir.path().join(METADATA_FILE).exists());
}
