use crate::error::{LaserFenceError, Result};
use crate::region::Mask;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LaserFenceConfig {
    pub camera: CameraConfig,
    pub mask: Mask,
    pub session: SessionConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    pub simulated: SimulatedConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Driver family: simulated or replay
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackend,

    /// Camera index on the bus
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Frame resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Grab timeout for frame retrieval; unset waits forever
    #[serde(default)]
    pub grab_timeout_ms: Option<u32>,

    /// Power status polls before giving up
    #[serde(default = "default_power_on_attempts")]
    pub power_on_attempts: u32,

    /// Delay between power status polls
    #[serde(default = "default_power_on_interval_ms")]
    pub power_on_interval_ms: u64,

    #[serde(default)]
    pub trigger: TriggerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TriggerConfig {
    /// Trigger mode number (0 = standard external, 15 = multishot)
    #[serde(default = "default_trigger_mode")]
    pub mode: u32,

    /// Frames captured per trigger event
    #[serde(default = "default_trigger_parameter")]
    pub parameter: u32,

    #[serde(default = "default_trigger_polarity")]
    pub polarity: TriggerPolarity,

    #[serde(default = "default_trigger_source")]
    pub source: TriggerSource,

    /// Delay between trigger-ready register reads
    #[serde(default = "default_trigger_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Abort the session if no trigger arrives within this window
    #[serde(default)]
    pub wait_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SessionConfig {
    /// Frames to capture before exiting; 0 streams forever, otherwise must be even
    #[serde(default)]
    pub capture_count: u32,

    /// Consecutive failed pairs tolerated before the session gives up
    #[serde(default = "default_max_pair_retries")]
    pub max_pair_retries: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ArchiveConfig {
    /// Directory receiving debug captures
    #[serde(default = "default_archive_path")]
    pub path: String,

    #[serde(default = "default_archive_policy")]
    pub policy: ArchivePolicy,

    #[serde(default = "default_snapshot_format")]
    pub snapshot_format: SnapshotFormat,

    /// Outline the mask on PNG snapshots
    #[serde(default)]
    pub mask_overlay: bool,

    /// Write session.json at the end of a batch run
    #[serde(default = "default_save_metadata")]
    pub save_metadata: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct JudgeConfig {
    /// FAIL when sumFirst - sumSecond exceeds this value
    #[serde(default)]
    pub threshold: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimulatedConfig {
    /// Uniform intensity of the first frame of each pair
    #[serde(default = "default_first_intensity")]
    pub first_intensity: u8,

    /// Uniform intensity of the second frame of each pair
    #[serde(default = "default_second_intensity")]
    pub second_intensity: u8,

    /// Busy reads of the trigger-ready register before each trigger
    #[serde(default = "default_ready_polls")]
    pub ready_polls: u32,

    /// Power register reads before the camera reports powered
    #[serde(default = "default_power_up_reads")]
    pub power_up_reads: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReplayConfig {
    /// Directory of PGM/PNG frames played back in file name order
    #[serde(default = "default_replay_directory")]
    pub directory: String,

    /// Start over when the directory is exhausted
    #[serde(default)]
    pub repeat: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    Simulated,
    Replay,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolarity {
    Falling,
    Rising,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Gpio0,
    Gpio1,
    Gpio2,
    Gpio3,
    Software,
}

impl TriggerSource {
    /// Source value written to the trigger mode register
    pub fn register_value(&self) -> u32 {
        match self {
            TriggerSource::Gpio0 => 0,
            TriggerSource::Gpio1 => 1,
            TriggerSource::Gpio2 => 2,
            TriggerSource::Gpio3 => 3,
            TriggerSource::Software => 7,
        }
    }

    pub fn is_external(&self) -> bool {
        !matches!(self, TriggerSource::Software)
    }
}

/// Which frames of a batch run are kept as PGM/CSV pair dumps
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArchivePolicy {
    /// Overwrite image1/image2 with every pair
    LatestPair,
    /// Keep a numbered set of files per pair
    EveryPair,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    Png,
    Pgm,
}

impl SnapshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Png => "png",
            SnapshotFormat::Pgm => "pgm",
        }
    }
}

impl CameraConfig {
    pub fn power_on_interval(&self) -> Duration {
        Duration::from_millis(self.power_on_interval_ms)
    }
}

impl TriggerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }
}

impl LaserFenceConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from_file("laserfence.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("camera.backend", "simulated")?
            .set_default("camera.index", defaults.camera.index)?
            .set_default(
                "camera.resolution",
                vec![defaults.camera.resolution.0, defaults.camera.resolution.1],
            )?
            .set_default("camera.power_on_attempts", defaults.camera.power_on_attempts)?
            .set_default(
                "camera.power_on_interval_ms",
                defaults.camera.power_on_interval_ms,
            )?
            .set_default("camera.trigger.mode", defaults.camera.trigger.mode)?
            .set_default("camera.trigger.parameter", defaults.camera.trigger.parameter)?
            .set_default("camera.trigger.polarity", "rising")?
            .set_default("camera.trigger.source", "gpio0")?
            .set_default(
                "camera.trigger.poll_interval_ms",
                defaults.camera.trigger.poll_interval_ms,
            )?
            .set_default("mask.row1", defaults.mask.row1)?
            .set_default("mask.col1", defaults.mask.col1)?
            .set_default("mask.row2", defaults.mask.row2)?
            .set_default("mask.col2", defaults.mask.col2)?
            .set_default("session.capture_count", defaults.session.capture_count)?
            .set_default(
                "session.max_pair_retries",
                defaults.session.max_pair_retries,
            )?
            .set_default("archive.path", defaults.archive.path.clone())?
            .set_default("archive.policy", "latest_pair")?
            .set_default("archive.snapshot_format", "png")?
            .set_default("archive.mask_overlay", defaults.archive.mask_overlay)?
            .set_default("archive.save_metadata", defaults.archive.save_metadata)?
            .set_default(
                "simulated.first_intensity",
                defaults.simulated.first_intensity as i64,
            )?
            .set_default(
                "simulated.second_intensity",
                defaults.simulated.second_intensity as i64,
            )?
            .set_default("simulated.ready_polls", defaults.simulated.ready_polls)?
            .set_default("simulated.power_up_reads", defaults.simulated.power_up_reads)?
            .set_default("replay.directory", defaults.replay.directory.clone())?
            .set_default("replay.repeat", defaults.replay.repeat)?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables, e.g. LASERFENCE_SESSION__CAPTURE_COUNT=10
            .add_source(
                Environment::with_prefix("LASERFENCE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: LaserFenceConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Runs before any hardware is touched.
    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.camera.resolution;
        if width == 0 || height == 0 {
            return Err(LaserFenceError::validation(
                "Camera resolution must be greater than 0",
            ));
        }

        if self.session.capture_count % 2 == 1 {
            return Err(LaserFenceError::validation(format!(
                "Capture count must be even, got {}",
                self.session.capture_count
            )));
        }

        self.mask
            .check_bounds(width, height)
            .map_err(|e| LaserFenceError::validation(e.to_string()))?;

        if self.camera.power_on_attempts == 0 {
            return Err(LaserFenceError::validation(
                "Camera power_on_attempts must be greater than 0",
            ));
        }

        if self.camera.trigger.mode == 15 && self.camera.trigger.parameter != 2 {
            return Err(LaserFenceError::validation(format!(
                "Multishot trigger must capture 2 frames per event, got {}",
                self.camera.trigger.parameter
            )));
        }

        if self.camera.trigger.poll_interval_ms == 0 {
            return Err(LaserFenceError::validation(
                "Trigger poll_interval_ms must be greater than 0",
            ));
        }

        if self.camera.backend == CameraBackend::Replay && self.replay.directory.is_empty() {
            return Err(LaserFenceError::validation(
                "Replay backend requires replay.directory",
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| LaserFenceError::system(format!("Failed to render configuration: {}", e)))
    }
}

impl Default for LaserFenceConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                backend: default_camera_backend(),
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                grab_timeout_ms: None,
                power_on_attempts: default_power_on_attempts(),
                power_on_interval_ms: default_power_on_interval_ms(),
                trigger: TriggerConfig::default(),
            },
            mask: default_mask(),
            session: SessionConfig {
                capture_count: 0,
                max_pair_retries: default_max_pair_retries(),
            },
            archive: ArchiveConfig {
                path: default_archive_path(),
                policy: default_archive_policy(),
                snapshot_format: default_snapshot_format(),
                mask_overlay: false,
                save_metadata: default_save_metadata(),
            },
            judge: JudgeConfig::default(),
            simulated: SimulatedConfig {
                first_intensity: default_first_intensity(),
                second_intensity: default_second_intensity(),
                ready_polls: default_ready_polls(),
                power_up_reads: default_power_up_reads(),
            },
            replay: ReplayConfig {
                directory: default_replay_directory(),
                repeat: false,
            },
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            mode: default_trigger_mode(),
            parameter: default_trigger_parameter(),
            polarity: default_trigger_polarity(),
            source: default_trigger_source(),
            poll_interval_ms: default_trigger_poll_interval_ms(),
            wait_timeout_ms: None,
        }
    }
}

// Default value functions
fn default_camera_backend() -> CameraBackend {
    CameraBackend::Simulated
}
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (612, 512)
}
fn default_power_on_attempts() -> u32 {
    10
}
fn default_power_on_interval_ms() -> u64 {
    100
}

fn default_trigger_mode() -> u32 {
    0
}
fn default_trigger_parameter() -> u32 {
    2
}
fn default_trigger_polarity() -> TriggerPolarity {
    TriggerPolarity::Rising
}
fn default_trigger_source() -> TriggerSource {
    TriggerSource::Gpio0
}
fn default_trigger_poll_interval_ms() -> u64 {
    1
}

fn default_mask() -> Mask {
    Mask {
        row1: 210,
        col1: 10,
        row2: 240,
        col2: 500,
    }
}

fn default_max_pair_retries() -> u32 {
    3
}

fn default_archive_path() -> String {
    ".".to_string()
}
fn default_archive_policy() -> ArchivePolicy {
    ArchivePolicy::LatestPair
}
fn default_snapshot_format() -> SnapshotFormat {
    SnapshotFormat::Png
}
fn default_save_metadata() -> bool {
    true
}

fn default_first_intensity() -> u8 {
    5
}
fn default_second_intensity() -> u8 {
    5
}
fn default_ready_polls() -> u32 {
    3
}
fn default_power_up_reads() -> u32 {
    2
}

fn default_replay_directory() -> String {
    "./replay".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LaserFenceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.resolution, (612, 512));
        assert_eq!(config.camera.trigger.parameter, 2);
        assert_eq!(config.camera.trigger.source.register_value(), 0);
    }

    #[test]
    fn test_odd_capture_count_rejected() {
        let mut config = LaserFenceConfig::default();
        config.session.capture_count = 7;

        match config.validate() {
            Err(LaserFenceError::Validation { message }) => assert!(message.contains("even")),
            other => panic!("Expected validation error, got {:?}", other),
        }

        config.session.capture_count = 8;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mask_outside_resolution_rejected() {
        let mut config = LaserFenceConfig::default();
        config.mask.col2 = 612;
        assert!(config.validate().is_err());

        config.mask.col2 = 611;
        config.mask.row1 = 300;
        config.mask.row2 = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multishot_requires_pair() {
        let mut config = LaserFenceConfig::default();
        config.camera.trigger.mode = 15;
        config.camera.trigger.parameter = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[camera]
resolution = [640, 480]
grab_timeout_ms = 5000

[camera.trigger]
source = "software"
wait_timeout_ms = 2000

[mask]
row1 = 1
col1 = 2
row2 = 3
col2 = 4

[session]
capture_count = 10

[archive]
policy = "every_pair"
snapshot_format = "pgm"

[judge]
threshold = 250
"#
        )
        .unwrap();

        let config = LaserFenceConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.camera.resolution, (640, 480));
        assert_eq!(config.camera.grab_timeout_ms, Some(5000));
        assert_eq!(config.camera.trigger.source, TriggerSource::Software);
        assert_eq!(config.camera.trigger.wait_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.camera.trigger.parameter, 2);
        assert_eq!(config.mask, Mask::new(1, 2, 3, 4).unwrap());
        assert_eq!(config.session.capture_count, 10);
        assert_eq!(config.session.max_pair_retries, 3);
        assert_eq!(config.archive.policy, ArchivePolicy::EveryPair);
        assert_eq!(config.archive.snapshot_format, SnapshotFormat::Pgm);
        assert_eq!(config.judge.threshold, Some(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LaserFenceConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, LaserFenceConfig::default());
    }

    #[test]
    fn test_default_renders_as_toml() {
        let rendered = LaserFenceConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[camera]"));
        assert!(rendered.contains("backend = \"simulated\""));
        assert!(rendered.contains("[mask]"));

        let parsed: LaserFenceConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, LaserFenceConfig::default());
    }
}
