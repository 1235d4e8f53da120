//! Pulling the finished recording off the device.
//!
//! A pull is never taken at face value. The transfer completes without any
//! completion signal from the device side, so the file has to show up
//! locally and its size has to stop moving before it counts as a
//! recording.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tether::{DeviceError, DeviceShell};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TimingConfig;
use crate::poll::poll_until;

/// Errors from retrieving a recording.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Transport(#[from] DeviceError),

    #[error("failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pulled file never appeared at {path}")]
    NeverAppeared { path: PathBuf },

    #[error("pulled file is empty: {path}")]
    EmptyFile { path: PathBuf },
}

/// A recording that made it onto the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub size: u64,
    /// False when the size was still moving after the sampling budget.
    pub stable: bool,
}

/// Pulls recordings off the device and vouches for them.
pub struct ArtifactRetriever {
    shell: Arc<dyn DeviceShell>,
    timing: TimingConfig,
}

impl ArtifactRetriever {
    pub fn new(shell: Arc<dyn DeviceShell>, timing: TimingConfig) -> Self {
        Self { shell, timing }
    }

    /// Pull `remote` to `local`, then wait for the file to materialize and
    /// its size to settle.
    pub async fn retrieve(
        &self,
        remote: &str,
        local: &Path,
    ) -> Result<ArtifactFile, RetrievalError> {
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).map_err(|e| RetrievalError::OutputDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        self.shell.pull(remote, local).await?;

        let appeared = poll_until(self.timing.pull_poll(), self.timing.pull_attempts, || {
            local.exists()
        })
        .await;
        if !appeared {
            return Err(RetrievalError::NeverAppeared {
                path: local.to_path_buf(),
            });
        }

        let artifact = self.wait_for_stable_size(local).await;
        if artifact.size == 0 {
            return Err(RetrievalError::EmptyFile {
                path: local.to_path_buf(),
            });
        }
        Ok(artifact)
    }

    /// Sample the file size until enough consecutive samples agree.
    ///
    /// Running out of samples is not an error: the file is handed on with
    /// `stable: false` and whatever size the last look saw.
    async fn wait_for_stable_size(&self, local: &Path) -> ArtifactFile {
        let mut last_size = 0u64;
        let mut agreeing = 0u32;
        let stable = poll_until(
            self.timing.stability_poll(),
            self.timing.stability_attempts,
            || {
                let size = fs::metadata(local).map(|m| m.len()).unwrap_or(0);
                if size > 0 && size == last_size {
                    agreeing += 1;
                } else {
                    agreeing = 0;
                }
                last_size = size;
                agreeing >= self.timing.stable_threshold
            },
        )
        .await;

        let size = fs::metadata(local).map(|m| m.len()).unwrap_or(0);
        if stable {
            debug!(artifact.path = %local.display(), artifact.size = size, "file size settled");
        } else {
            warn!(
                artifact.path = %local.display(),
                artifact.size = size,
                "file size never settled, continuing with what we have"
            );
        }
        ArtifactFile {
            path: local.to_path_buf(),
            size,
            stable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::time::Duration;

    enum PullBehavior {
        Write(Vec<u8>),
        Nothing,
        Fail,
    }

    struct PullShell {
        behavior: PullBehavior,
    }

    #[async_trait]
    impl DeviceShell for PullShell {
        fn serial(&self) -> &str {
            "TESTSER01"
        }

        async fn run(&self, _command: &str) -> Result<String, DeviceError> {
            Ok(String::new())
        }

        async fn pull(&self, remote: &str, local: &Path) -> Result<(), DeviceError> {
            match &self.behavior {
                PullBehavior::Write(bytes) => {
                    fs::write(local, bytes).unwrap();
                    Ok(())
                }
                PullBehavior::Nothing => Ok(()),
                PullBehavior::Fail => Err(DeviceError::PullFailed {
                    remote: remote.to_string(),
                    detail: "remote object does not exist".to_string(),
                }),
            }
        }
    }

    fn retriever(behavior: PullBehavior) -> ArtifactRetriever {
        ArtifactRetriever::new(Arc::new(PullShell { behavior }), TimingConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn settled_file_is_accepted_on_the_third_sample() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("clip.mp4");
        let start = tokio::time::Instant::now();

        let artifact = retriever(PullBehavior::Write(vec![7u8; 1024]))
            .retrieve("/sdcard/clip.mp4", &local)
            .await
            .unwrap();

        assert_eq!(artifact.size, 1024);
        assert!(artifact.stable);
        // One existence check plus three equal size samples.
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_file_exhausts_the_pull_budget() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("clip.mp4");
        let start = tokio::time::Instant::now();

        let err = retriever(PullBehavior::Nothing)
            .retrieve("/sdcard/clip.mp4", &local)
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::NeverAppeared { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("clip.mp4");

        let err = retriever(PullBehavior::Write(Vec::new()))
            .retrieve("/sdcard/clip.mp4", &local)
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::EmptyFile { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn pull_failure_surfaces_as_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("clip.mp4");

        let err = retriever(PullBehavior::Fail)
            .retrieve("/sdcard/clip.mp4", &local)
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn a_file_that_never_settles_is_still_returned() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("clip.mp4");

        // Keep appending on a period that lands inside every sampling
        // window, so no two samples ever agree.
        let grower = {
            let path = local.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    tokio::time::sleep(Duration::from_millis(333)).await;
                    let mut file = OpenOptions::new()
                        .append(true)
                        .create(true)
                        .open(&path)
                        .unwrap();
                    file.write_all(b"abcd").unwrap();
                }
            })
        };

        let artifact = retriever(PullBehavior::Write(b"abcd".to_vec()))
            .retrieve("/sdcard/clip.mp4", &local)
            .await
            .unwrap();
        grower.abort();

        assert!(!artifact.stable);
        assert!(artifact.size > 0);
    }
}
