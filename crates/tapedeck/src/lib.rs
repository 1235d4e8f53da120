//! tapedeck - screen recording sessions for devices under automated test
//!
//! A recording session shadows one test run on one device: wait for the
//! automation driver to come up, record the screen while the run lives,
//! pull the clip off the device, publish it, and report how it went. On
//! every exit path the device is left clean: capture process killed,
//! remote file removed.
//!
//! ## Everything is polled
//!
//! The stack below a session offers no events. The capture binary can
//! only be observed through `ps`, a pulled file only by watching it
//! appear and hold still, the test run only through two shared flags
//! (`signal` module). So the session loop is built on sleep-and-look
//! (`poll` module), with every interval and budget in [`TimingConfig`]
//! where tests can shrink them.
//!
//! ## Session shape
//!
//! - [`SessionController::run`] drives one session end to end and always
//!   returns a terminal [`SessionEnd`]; pipeline failures fold into a
//!   failure outcome rather than an error.
//! - [`SessionRegistry`] holds the worker task per device and enforces
//!   one live session per serial.
//! - The device side is abstracted behind `tether::DeviceShell`, so the
//!   whole lifecycle runs against an in-memory fake in tests.

pub mod artifact;
pub mod config;
pub mod poll;
pub mod process;
pub mod publish;
pub mod registry;
pub mod report;
pub mod session;
pub mod signal;

pub use artifact::{ArtifactFile, ArtifactRetriever, RetrievalError};
pub use config::{
    CaptureConfig, ConfigError, DeckConfig, PathsConfig, PublishConfig, TimingConfig,
};
pub use process::{CaptureManager, StopSignal};
#[cfg(feature = "upload")]
pub use publish::HttpPublisher;
pub use publish::{ArchivePublisher, ArtifactPublisher, PublishError};
pub use registry::{RegistryError, SessionRegistry};
pub use report::{LogSink, OutcomeSink, RecordingOutcome, Reporter};
pub use session::{RecordingSession, SessionController, SessionEnd, SessionState};
pub use signal::{RunObserver, RunSignals};
