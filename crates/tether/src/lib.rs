//! Device link: how tapedeck talks to an attached Android device.
//!
//! Everything above this crate goes through the [`DeviceShell`] trait, so
//! session logic can run against a real adb binary or an in-memory fake.

mod adb;

pub use adb::AdbShell;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a device link.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("device command `{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("pull of {remote} failed: {detail}")]
    PullFailed { remote: String, detail: String },
}

/// Shell access to a single attached device.
#[async_trait]
pub trait DeviceShell: Send + Sync {
    /// Serial of the device this shell is bound to.
    fn serial(&self) -> &str;

    /// Run a shell command on the device and return its captured stdout.
    ///
    /// Pipelines that match nothing (a `grep` with no hits) exit non-zero
    /// with empty output; that comes back as `Ok("")`, not an error.
    async fn run(&self, command: &str) -> Result<String, DeviceError>;

    /// Copy a file from the device to the host.
    async fn pull(&self, remote: &str, local: &Path) -> Result<(), DeviceError>;
}
