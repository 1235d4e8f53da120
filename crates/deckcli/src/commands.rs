//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use tapedeck::{
    ArchivePublisher, ArtifactPublisher, DeckConfig, HttpPublisher, LogSink, RunSignals,
    SessionController, SessionEnd,
};
use tether::{AdbShell, DeviceShell};

fn build_shell(serial: &str, adb: Option<PathBuf>) -> AdbShell {
    let shell = AdbShell::new(serial);
    match adb {
        Some(path) => shell.with_adb_path(path),
        None => shell,
    }
}

/// Record one session on a device, then print the reported outcome.
pub async fn record(
    serial: &str,
    duration_secs: u64,
    config: Option<&Path>,
    output_dir: Option<PathBuf>,
    upload_url: Option<String>,
    adb: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => DeckConfig::load_from(path)?,
        None => {
            let mut config = DeckConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    if let Some(dir) = output_dir {
        config.paths.output_dir = dir;
    }
    if let Some(url) = upload_url {
        config.publish.upload_url = Some(url);
    }

    let publisher: Arc<dyn ArtifactPublisher> = match &config.publish.upload_url {
        Some(url) => Arc::new(HttpPublisher::new(url)),
        None => {
            let dir = config
                .publish
                .archive_dir
                .clone()
                .unwrap_or_else(|| config.paths.output_dir.join("archive"));
            Arc::new(ArchivePublisher::new(dir))
        }
    };

    let shell = Arc::new(build_shell(serial, adb));
    let controller = SessionController::new(shell, config, publisher, Arc::new(LogSink));

    // The CLI is its own driver: ready immediately, done when the window
    // closes or the user interrupts.
    let signals = RunSignals::new();
    signals.mark_driver_ready();
    let driver = signals.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {
                info!(window.secs = duration_secs, "recording window elapsed");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, ending the recording window");
            }
        }
        driver.finish_run();
    });

    match controller.run(&signals.observer()).await {
        SessionEnd::Reported(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        SessionEnd::Skipped => {
            println!("skipped: run ended before recording started");
        }
    }

    Ok(())
}

/// One round-trip over adb to confirm the device is reachable.
pub async fn check(serial: &str, adb: Option<PathBuf>) -> Result<()> {
    let shell = build_shell(serial, adb);
    let model = shell
        .run("getprop ro.product.model")
        .await
        .context("device did not answer")?;
    println!("{}: {}", serial, model.trim());
    Ok(())
}
