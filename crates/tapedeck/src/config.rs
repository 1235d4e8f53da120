//! Deck configuration: capture command, paths, and timing knobs.
//!
//! Defaults match what the capture pipeline expects on a stock Android
//! device. A TOML file can override any field, and a handful of
//! `TAPEDECK_*` environment variables override the file.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Top-level configuration for a recording deck.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    pub capture: CaptureConfig,
    pub paths: PathsConfig,
    pub publish: PublishConfig,
    pub timing: TimingConfig,
}

impl DeckConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: DeckConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `TAPEDECK_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("TAPEDECK_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("TAPEDECK_REMOTE_DIR") {
            self.paths.remote_dir = v;
        }
        if let Ok(v) = env::var("TAPEDECK_UPLOAD_URL") {
            self.publish.upload_url = Some(v);
        }
    }
}

/// How the on-device capture binary is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture binary on the device.
    pub command: String,
    /// Hard cap the device enforces on a single clip, in seconds.
    pub time_limit_secs: u32,
    /// Video bit rate in bits per second.
    pub bit_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            command: "screenrecord".to_string(),
            time_limit_secs: 600,
            bit_rate: 4_000_000,
        }
    }
}

impl CaptureConfig {
    pub fn with_time_limit(mut self, secs: u32) -> Self {
        self.time_limit_secs = secs;
        self
    }

    pub fn with_bit_rate(mut self, bits_per_sec: u32) -> Self {
        self.bit_rate = bits_per_sec;
        self
    }

    /// Full shell command line for recording to `remote_path`.
    pub fn command_line(&self, remote_path: &str) -> String {
        format!(
            "{} --time-limit {} --bit-rate {} {}",
            self.command, self.time_limit_secs, self.bit_rate, remote_path
        )
    }
}

/// Where recordings live, on the device and on the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Host directory pulled recordings land in.
    pub output_dir: PathBuf,
    /// Device directory the capture binary writes to.
    pub remote_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("test-output/record"),
            remote_dir: "/sdcard".to_string(),
        }
    }
}

/// Where finished recordings go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// HTTP endpoint for uploads. None means publish locally.
    pub upload_url: Option<String>,
    /// Local archive directory used when no upload endpoint is set.
    pub archive_dir: Option<PathBuf>,
}

/// Delays and poll budgets for the session state machine.
///
/// Every sleep in the pipeline comes from here, so tests can shrink them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Interval between driver-readiness checks.
    pub driver_poll_ms: u64,
    /// Interval between run-liveness checks while recording.
    pub run_poll_ms: u64,
    /// Delay between issuing the capture command and verifying the process.
    pub start_confirm_delay_ms: u64,
    /// Settle time after the graceful stop signal.
    pub stop_settle_ms: u64,
    /// Extra pause for the device to flush the file before pulling.
    pub flush_pause_ms: u64,
    /// Interval between local-existence checks after a pull.
    pub pull_poll_ms: u64,
    /// How many existence checks before giving up.
    pub pull_attempts: u32,
    /// Interval between file-size samples.
    pub stability_poll_ms: u64,
    /// How many size samples before accepting the file as-is.
    pub stability_attempts: u32,
    /// Consecutive equal non-zero samples required to call the size stable.
    pub stable_threshold: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            driver_poll_ms: 500,
            run_poll_ms: 1000,
            start_confirm_delay_ms: 2000,
            stop_settle_ms: 3000,
            flush_pause_ms: 1000,
            pull_poll_ms: 500,
            pull_attempts: 10,
            stability_poll_ms: 500,
            stability_attempts: 10,
            stable_threshold: 2,
        }
    }
}

impl TimingConfig {
    pub fn driver_poll(&self) -> Duration {
        Duration::from_millis(self.driver_poll_ms)
    }

    pub fn run_poll(&self) -> Duration {
        Duration::from_millis(self.run_poll_ms)
    }

    pub fn start_confirm_delay(&self) -> Duration {
        Duration::from_millis(self.start_confirm_delay_ms)
    }

    pub fn stop_settle(&self) -> Duration {
        Duration::from_millis(self.stop_settle_ms)
    }

    pub fn flush_pause(&self) -> Duration {
        Duration::from_millis(self.flush_pause_ms)
    }

    pub fn pull_poll(&self) -> Duration {
        Duration::from_millis(self.pull_poll_ms)
    }

    pub fn stability_poll(&self) -> Duration {
        Duration::from_millis(self.stability_poll_ms)
    }
}
