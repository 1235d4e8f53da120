//! Terminal outcome reporting and remote cleanup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tether::DeviceShell;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactFile;
use crate::publish::ArtifactPublisher;

/// The one record a session leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingOutcome {
    pub success: bool,
    pub file_name: String,
    pub url: String,
}

impl RecordingOutcome {
    pub fn success(file_name: &str, url: String) -> Self {
        Self {
            success: true,
            file_name: file_name.to_string(),
            url,
        }
    }

    pub fn failure(file_name: &str) -> Self {
        Self {
            success: false,
            file_name: file_name.to_string(),
            url: String::new(),
        }
    }
}

/// Where outcomes go: one call per session, no retries, no acknowledgement.
pub trait OutcomeSink: Send + Sync {
    fn record_log(&self, outcome: &RecordingOutcome);
}

/// Sink that writes outcomes to the log and nowhere else.
pub struct LogSink;

impl OutcomeSink for LogSink {
    fn record_log(&self, outcome: &RecordingOutcome) {
        info!(
            outcome.success = outcome.success,
            outcome.file = %outcome.file_name,
            outcome.url = %outcome.url,
            "recording outcome"
        );
    }
}

/// Publishes what can be published and reports how the session ended.
pub struct Reporter {
    shell: Arc<dyn DeviceShell>,
    publisher: Arc<dyn ArtifactPublisher>,
    sink: Arc<dyn OutcomeSink>,
}

impl Reporter {
    pub fn new(
        shell: Arc<dyn DeviceShell>,
        publisher: Arc<dyn ArtifactPublisher>,
        sink: Arc<dyn OutcomeSink>,
    ) -> Self {
        Self {
            shell,
            publisher,
            sink,
        }
    }

    /// Publish the artifact and report the result.
    ///
    /// A publish failure becomes a failure outcome, not an error; the
    /// session is over either way.
    pub async fn publish_and_report(
        &self,
        artifact: &ArtifactFile,
        file_name: &str,
    ) -> RecordingOutcome {
        let outcome = match self.publisher.publish(&artifact.path).await {
            Ok(url) => RecordingOutcome::success(file_name, url),
            Err(e) => {
                warn!(
                    artifact.path = %artifact.path.display(),
                    error = %e,
                    "publish failed"
                );
                RecordingOutcome::failure(file_name)
            }
        };
        self.sink.record_log(&outcome);
        outcome
    }

    /// Report a session that never produced a usable artifact.
    pub fn report_failure(&self, file_name: &str) -> RecordingOutcome {
        let outcome = RecordingOutcome::failure(file_name);
        self.sink.record_log(&outcome);
        outcome
    }

    /// Best-effort removal of the remote recording. Failures are logged
    /// at debug and swallowed.
    pub async fn cleanup(&self, remote_path: &str) {
        match self.shell.run(&format!("rm -f {}", remote_path)).await {
            Ok(_) => debug!(remote.path = %remote_path, "remote recording removed"),
            Err(e) => debug!(remote.path = %remote_path, error = %e, "remote cleanup failed"),
        }
    }
}
