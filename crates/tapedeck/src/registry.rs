//! One live session worker per device.
//!
//! Sessions are background work: spawning one never blocks the caller,
//! and a host that is going down can abort the lot. The cleanup guard
//! inside each session handles the device side of an abort.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::session::{SessionController, SessionEnd};
use crate::signal::RunObserver;

/// Errors from the session registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("device {serial} already has a live recording session")]
    DeviceBusy { serial: String },
}

/// Tracks the one recording worker each device is allowed.
#[derive(Clone)]
pub struct SessionRegistry {
    workers: Arc<Mutex<HashMap<String, JoinHandle<SessionEnd>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a session worker for the controller's device.
    ///
    /// Rejected while a previous worker for the same serial is still
    /// running. A finished worker's slot is reclaimed here.
    pub fn spawn(
        &self,
        controller: SessionController,
        observer: RunObserver,
    ) -> Result<(), RegistryError> {
        let serial = controller.device_serial().to_string();
        let mut workers = self.workers.lock().unwrap();
        if let Some(handle) = workers.get(&serial) {
            if !handle.is_finished() {
                return Err(RegistryError::DeviceBusy { serial });
            }
        }

        let task = tokio::spawn(async move { controller.run(&observer).await });
        workers.insert(serial.clone(), task);
        info!(device.serial = %serial, "session worker spawned");
        Ok(())
    }

    /// Wait for a device's worker and take its result.
    ///
    /// None when there is no worker for the serial, or when the worker
    /// was aborted before finishing.
    pub async fn wait(&self, serial: &str) -> Option<SessionEnd> {
        let handle = { self.workers.lock().unwrap().remove(serial) }?;
        match handle.await {
            Ok(end) => Some(end),
            Err(e) => {
                warn!(device.serial = %serial, error = %e, "session worker did not finish");
                None
            }
        }
    }

    /// Serials that currently have a live worker.
    pub fn active(&self) -> Vec<String> {
        let workers = self.workers.lock().unwrap();
        workers
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(serial, _)| serial.clone())
            .collect()
    }

    /// Abort every live worker.
    pub fn abort_all(&self) {
        let mut workers = self.workers.lock().unwrap();
        for (serial, handle) in workers.drain() {
            if !handle.is_finished() {
                warn!(device.serial = %serial, "aborting session worker");
                handle.abort();
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
