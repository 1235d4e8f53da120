//! The recording session itself: one device, one test run, one clip.
//!
//! A session shadows a test run. It waits for the automation driver to
//! come up, records the screen while the run lives, then pulls, publishes,
//! and reports. Whatever happens along the way, the device ends up clean:
//! capture process killed, remote file removed.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tether::DeviceShell;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::ArtifactRetriever;
use crate::config::{CaptureConfig, DeckConfig};
use crate::poll::{poll_while, wait_for_close};
use crate::process::{CaptureManager, StopSignal};
use crate::publish::ArtifactPublisher;
use crate::report::{OutcomeSink, RecordingOutcome, Reporter};
use crate::signal::RunObserver;

/// Where a session currently is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    WaitingForDriver,
    Recording,
    Stopping,
    Retrieving,
    Publishing,
    Done,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// The run finished before the driver ever came up. Nothing was
    /// recorded and nothing was reported.
    Skipped,
    /// The session reached a terminal state and reported this outcome.
    Reported(RecordingOutcome),
}

/// One recording attempt against one device.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: Uuid,
    pub device_serial: String,
    /// Bare clip name, shared by the remote and local paths.
    pub file_name: String,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub state: SessionState,
}

impl RecordingSession {
    /// Name the clip after the moment and the device.
    fn begin(serial: &str, config: &DeckConfig) -> Self {
        let stamp = Utc::now().timestamp_millis();
        let prefix: String = serial.chars().take(4).collect();
        let file_name = format!("{}_{}.mp4", stamp, prefix);
        let remote_path = format!("{}/sonic_record_{}", config.paths.remote_dir, file_name);
        let local_path = config.paths.output_dir.join(&file_name);
        Self {
            id: Uuid::new_v4(),
            device_serial: serial.to_string(),
            file_name,
            remote_path,
            local_path,
            state: SessionState::WaitingForDriver,
        }
    }

    fn advance(&mut self, state: SessionState) {
        self.state = state;
        debug!(session.id = %self.id, state = ?state, "session state");
    }
}

/// Drives recording sessions for a single device.
pub struct SessionController {
    shell: Arc<dyn DeviceShell>,
    config: DeckConfig,
    capture: CaptureManager,
    retriever: ArtifactRetriever,
    reporter: Reporter,
}

impl SessionController {
    pub fn new(
        shell: Arc<dyn DeviceShell>,
        config: DeckConfig,
        publisher: Arc<dyn ArtifactPublisher>,
        sink: Arc<dyn OutcomeSink>,
    ) -> Self {
        let capture = CaptureManager::new(shell.clone(), config.capture.clone());
        let retriever = ArtifactRetriever::new(shell.clone(), config.timing.clone());
        let reporter = Reporter::new(shell.clone(), publisher, sink);
        Self {
            shell,
            config,
            capture,
            retriever,
            reporter,
        }
    }

    /// Serial of the device this controller records.
    pub fn device_serial(&self) -> &str {
        self.shell.serial()
    }

    /// Run one session to the end.
    ///
    /// Always comes back with a terminal [`SessionEnd`]; failures along
    /// the pipeline fold into a failure outcome rather than an error. Once
    /// recording has started, device cleanup runs on every exit, including
    /// the worker task being aborted mid-flight.
    pub async fn run(&self, observer: &RunObserver) -> SessionEnd {
        let mut session = RecordingSession::begin(self.shell.serial(), &self.config);
        let timing = self.config.timing.clone();
        info!(
            session.id = %session.id,
            device.serial = %session.device_serial,
            "recording session starting"
        );

        let driver_up = poll_while(
            timing.driver_poll(),
            || observer.run_alive(),
            || observer.driver_ready(),
        )
        .await;
        if !driver_up {
            info!(
                session.id = %session.id,
                "run ended before the driver came up, skipping recording"
            );
            return SessionEnd::Skipped;
        }

        let mut guard = CleanupGuard::arm(
            self.shell.clone(),
            self.config.capture.clone(),
            session.remote_path.clone(),
        );

        session.advance(SessionState::Recording);
        let capture_task = self.capture.start(&session.remote_path);
        info!(
            session.id = %session.id,
            remote.path = %session.remote_path,
            "capture started"
        );

        sleep(timing.start_confirm_delay()).await;
        match self.capture.verify_running().await {
            Ok(true) => debug!(session.id = %session.id, "capture process confirmed"),
            Ok(false) => warn!(
                session.id = %session.id,
                "capture process not seen in ps, continuing anyway"
            ),
            Err(e) => warn!(
                session.id = %session.id,
                error = %e,
                "could not verify capture process, continuing anyway"
            ),
        }

        wait_for_close(timing.run_poll(), || observer.run_alive()).await;
        debug!(session.id = %session.id, "test run ended");

        session.advance(SessionState::Stopping);
        if let Err(e) = self.capture.stop(StopSignal::Graceful).await {
            warn!(session.id = %session.id, error = %e, "graceful stop failed");
        }
        sleep(timing.stop_settle()).await;

        session.advance(SessionState::Retrieving);
        sleep(timing.flush_pause()).await;
        let outcome = match self
            .retriever
            .retrieve(&session.remote_path, &session.local_path)
            .await
        {
            Ok(artifact) => {
                session.advance(SessionState::Publishing);
                self.reporter
                    .publish_and_report(&artifact, &session.file_name)
                    .await
            }
            Err(e) => {
                warn!(session.id = %session.id, error = %e, "retrieval failed");
                self.reporter.report_failure(&session.file_name)
            }
        };

        self.teardown(&mut session, capture_task).await;
        guard.disarm();

        info!(
            session.id = %session.id,
            outcome.success = outcome.success,
            "recording session finished"
        );
        SessionEnd::Reported(outcome)
    }

    /// Unconditional cleanup: abort the local capture task, kill whatever
    /// capture process is left, remove the remote file.
    async fn teardown(&self, session: &mut RecordingSession, capture_task: JoinHandle<()>) {
        capture_task.abort();
        if let Err(e) = self.capture.stop(StopSignal::Forced).await {
            debug!(session.id = %session.id, error = %e, "forced stop failed");
        }
        self.reporter.cleanup(&session.remote_path).await;
        session.advance(SessionState::Done);
    }
}

/// Last-resort device sweep if the session future is dropped mid-flight.
///
/// Normal exits disarm the guard and clean up inline. An aborted worker
/// task only runs destructors, so the guard spawns one detached sweep to
/// keep the device from recording into a dead file.
struct CleanupGuard {
    shell: Arc<dyn DeviceShell>,
    capture: CaptureConfig,
    remote_path: String,
    armed: bool,
}

impl CleanupGuard {
    fn arm(shell: Arc<dyn DeviceShell>, capture: CaptureConfig, remote_path: String) -> Self {
        Self {
            shell,
            capture,
            remote_path,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        warn!(remote.path = %self.remote_path, "session dropped mid-flight, sweeping device");
        let shell = self.shell.clone();
        let capture = self.capture.clone();
        let remote_path = self.remote_path.clone();
        handle.spawn(async move {
            let manager = CaptureManager::new(shell.clone(), capture);
            let _ = manager.stop(StopSignal::Forced).await;
            let _ = shell.run(&format!("rm -f {}", remote_path)).await;
        });
    }
}
