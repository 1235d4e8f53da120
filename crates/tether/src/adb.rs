//! adb-backed implementation of [`DeviceShell`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{DeviceError, DeviceShell};

/// Shell over the `adb` binary, pinned to one device serial.
#[derive(Debug, Clone)]
pub struct AdbShell {
    adb: PathBuf,
    serial: String,
}

impl AdbShell {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            adb: PathBuf::from("adb"),
            serial: serial.into(),
        }
    }

    /// Use a specific adb binary instead of whatever is on PATH.
    pub fn with_adb_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.adb = path.into();
        self
    }

    async fn invoke(&self, args: &[&str]) -> Result<std::process::Output, DeviceError> {
        Command::new(&self.adb)
            .arg("-s")
            .arg(&self.serial)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future mid-flight reaps the client process.
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DeviceError::Launch {
                tool: self.adb.display().to_string(),
                source: e,
            })
    }
}

#[async_trait]
impl DeviceShell for AdbShell {
    fn serial(&self) -> &str {
        &self.serial
    }

    async fn run(&self, command: &str) -> Result<String, DeviceError> {
        debug!(device.serial = %self.serial, command, "adb shell");
        let output = self.invoke(&["shell", command]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            // grep pipelines exit non-zero on no match; only stderr output
            // marks a real failure.
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                return Err(DeviceError::CommandFailed {
                    command: command.to_string(),
                    detail: stderr.to_string(),
                });
            }
        }
        Ok(stdout)
    }

    async fn pull(&self, remote: &str, local: &Path) -> Result<(), DeviceError> {
        debug!(device.serial = %self.serial, remote, local = %local.display(), "adb pull");
        let local_str = local.to_string_lossy();
        let output = self.invoke(&["pull", remote, &local_str]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeviceError::PullFailed {
                remote: remote.to_string(),
                detail: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
