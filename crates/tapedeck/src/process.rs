//! Remote capture process control.
//!
//! The capture binary runs on the device, so the only handles on it are
//! shell commands: start it, look for it in `ps`, signal it by pid.

use std::sync::Arc;

use tether::{DeviceError, DeviceShell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;

/// Which signal to send when stopping the capture process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGINT, giving the binary a chance to finalize the file.
    Graceful,
    /// SIGKILL, for cleanup.
    Forced,
}

impl StopSignal {
    fn flag(self) -> &'static str {
        match self {
            StopSignal::Graceful => "-2",
            StopSignal::Forced => "-9",
        }
    }
}

/// Starts, finds, and signals the on-device capture process.
pub struct CaptureManager {
    shell: Arc<dyn DeviceShell>,
    capture: CaptureConfig,
}

impl CaptureManager {
    pub fn new(shell: Arc<dyn DeviceShell>, capture: CaptureConfig) -> Self {
        Self { shell, capture }
    }

    /// Fire the capture command in the background and keep the handle.
    ///
    /// The shell call blocks for the life of the recording, so it runs in
    /// its own task. Errors end up in the log; the session judges progress
    /// by polling `ps`, never by this task's result.
    pub fn start(&self, remote_path: &str) -> JoinHandle<()> {
        let shell = self.shell.clone();
        let command = self.capture.command_line(remote_path);
        tokio::spawn(async move {
            match shell.run(&command).await {
                Ok(_) => debug!(capture.command = %command, "capture command returned"),
                Err(e) => warn!(capture.command = %command, error = %e, "capture command failed"),
            }
        })
    }

    /// One-shot check that the capture process showed up in `ps`.
    pub async fn verify_running(&self) -> Result<bool, DeviceError> {
        Ok(!self.find_processes().await?.is_empty())
    }

    /// Signal every instance of the capture process. Returns the pids hit.
    ///
    /// Individual kill failures are logged and skipped; a pid from the
    /// listing may be gone by the time the signal lands.
    pub async fn stop(&self, signal: StopSignal) -> Result<Vec<String>, DeviceError> {
        let lines = self.find_processes().await?;
        let pids = parse_pids(&lines);
        for pid in &pids {
            let kill = format!("kill {} {}", signal.flag(), pid);
            match self.shell.run(&kill).await {
                Ok(_) => info!(capture.pid = %pid, signal = ?signal, "signalled capture process"),
                Err(e) => warn!(capture.pid = %pid, error = %e, "kill failed"),
            }
        }
        Ok(pids)
    }

    /// `ps` lines mentioning the capture process.
    ///
    /// Some builds ship a `ps` that only lists the caller's own processes;
    /// when the piped form comes back empty we retry with `ps -A`.
    async fn find_processes(&self) -> Result<Vec<String>, DeviceError> {
        let name = self.capture.process_name();
        let listing = self
            .shell
            .run(&format!("ps | grep {} | grep -v grep", name))
            .await?;
        if listing.trim().is_empty() {
            let fallback = self.shell.run(&format!("ps -A | grep {}", name)).await?;
            return Ok(matching_lines(&fallback, name));
        }
        Ok(matching_lines(&listing, name))
    }
}

impl CaptureConfig {
    /// Name the capture process shows up under in `ps`.
    pub fn process_name(&self) -> &str {
        self.command.rsplit('/').next().unwrap_or(&self.command)
    }
}

fn matching_lines(listing: &str, name: &str) -> Vec<String> {
    listing
        .lines()
        .filter(|line| line.contains(name))
        .map(|line| line.to_string())
        .collect()
}

/// Pids from `ps` output: the second whitespace-separated column.
fn parse_pids(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let _user = parts.next()?;
            parts.next().map(|pid| pid.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    struct ScriptedShell {
        commands: Mutex<Vec<String>>,
        /// `(substring, response)` pairs tried in order.
        responses: Vec<(&'static str, &'static str)>,
        fail_kills: bool,
    }

    impl ScriptedShell {
        fn new(responses: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                responses,
                fail_kills: false,
            }
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceShell for ScriptedShell {
        fn serial(&self) -> &str {
            "SCRIPT001"
        }

        async fn run(&self, command: &str) -> Result<String, DeviceError> {
            self.commands.lock().unwrap().push(command.to_string());
            if self.fail_kills && command.starts_with("kill") {
                return Err(DeviceError::CommandFailed {
                    command: command.to_string(),
                    detail: "no such process".to_string(),
                });
            }
            for (pattern, response) in &self.responses {
                if command.contains(pattern) {
                    return Ok(response.to_string());
                }
            }
            Ok(String::new())
        }

        async fn pull(&self, _remote: &str, _local: &Path) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    #[test]
    fn pid_is_the_second_column() {
        let lines = vec!["shell     5321  1744 10392  1392 __skb_recv 00000000 S screenrecord".to_string()];
        assert_eq!(parse_pids(&lines), vec!["5321".to_string()]);
    }

    #[test]
    fn short_lines_yield_no_pid() {
        let lines = vec!["screenrecord".to_string(), String::new()];
        assert_eq!(parse_pids(&lines), Vec::<String>::new());
    }

    #[test]
    fn process_name_strips_a_path_prefix() {
        let capture = CaptureConfig {
            command: "/system/bin/screenrecord".to_string(),
            ..CaptureConfig::default()
        };
        assert_eq!(capture.process_name(), "screenrecord");
    }

    #[tokio::test]
    async fn empty_piped_listing_falls_back_to_ps_a() {
        let shell = Arc::new(ScriptedShell::new(vec![
            ("grep -v grep", ""),
            ("ps -A", "shell  4410  1  9000  800 S screenrecord"),
        ]));
        let mgr = CaptureManager::new(shell.clone(), CaptureConfig::default());
        assert!(mgr.verify_running().await.unwrap());

        let commands = shell.commands();
        assert!(commands.iter().any(|c| c.starts_with("ps -A")));
    }

    #[tokio::test]
    async fn piped_listing_short_circuits_the_fallback() {
        let shell = Arc::new(ScriptedShell::new(vec![(
            "grep -v grep",
            "shell  5321  1  9000  800 S screenrecord",
        )]));
        let mgr = CaptureManager::new(shell.clone(), CaptureConfig::default());
        assert!(mgr.verify_running().await.unwrap());

        let ps_commands: Vec<String> = shell
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("ps"))
            .collect();
        assert_eq!(ps_commands.len(), 1);
    }

    #[tokio::test]
    async fn stop_signals_every_listed_pid() {
        let shell = Arc::new(ScriptedShell::new(vec![(
            "grep -v grep",
            "shell  5321  1  9000  800 S screenrecord\nshell  5400  1  9000  800 S screenrecord",
        )]));
        let mgr = CaptureManager::new(shell.clone(), CaptureConfig::default());

        let pids = mgr.stop(StopSignal::Graceful).await.unwrap();
        assert_eq!(pids, vec!["5321".to_string(), "5400".to_string()]);

        let commands = shell.commands();
        assert!(commands.contains(&"kill -2 5321".to_string()));
        assert!(commands.contains(&"kill -2 5400".to_string()));
    }

    #[tokio::test]
    async fn forced_stop_uses_sigkill() {
        let shell = Arc::new(ScriptedShell::new(vec![(
            "grep -v grep",
            "shell  5321  1  9000  800 S screenrecord",
        )]));
        let mgr = CaptureManager::new(shell.clone(), CaptureConfig::default());

        mgr.stop(StopSignal::Forced).await.unwrap();
        assert!(shell.commands().contains(&"kill -9 5321".to_string()));
    }

    #[tokio::test]
    async fn kill_failures_do_not_abort_the_sweep() {
        let mut scripted = ScriptedShell::new(vec![(
            "grep -v grep",
            "shell  5321  1  9000  800 S screenrecord\nshell  5400  1  9000  800 S screenrecord",
        )]);
        scripted.fail_kills = true;
        let shell = Arc::new(scripted);
        let mgr = CaptureManager::new(shell.clone(), CaptureConfig::default());

        let pids = mgr.stop(StopSignal::Graceful).await.unwrap();
        assert_eq!(pids.len(), 2);

        let kills: Vec<String> = shell
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("kill"))
            .collect();
        assert_eq!(kills.len(), 2);
    }

    #[tokio::test]
    async fn start_runs_the_full_command_line() {
        let shell = Arc::new(ScriptedShell::new(vec![]));
        let mgr = CaptureManager::new(shell.clone(), CaptureConfig::default());

        let handle = mgr.start("/sdcard/clip.mp4");
        handle.await.unwrap();

        assert_eq!(
            shell.commands(),
            vec!["screenrecord --time-limit 600 --bit-rate 4000000 /sdcard/clip.mp4".to_string()]
        );
    }
}
