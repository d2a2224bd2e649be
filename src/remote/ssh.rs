// SSH transport: sshpass + OpenSSH control master, one master per request

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::{CommandOutput, RemoteSession, RemoteShell};
use crate::config::SshCredentials;
use crate::error::{Result, StatsError};

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct SshShell {
    credentials: SshCredentials,
}

impl SshShell {
    pub fn new(credentials: SshCredentials) -> Self {
        Self { credentials }
    }

    fn control_path() -> PathBuf {
        std::env::temp_dir().join(format!(
            "statsboard-{}-{}.ctl",
            std::process::id(),
            SESSION_SEQ.fetch_add(1, Ordering::Relaxed)
        ))
    }
}

fn destination(c: &SshCredentials) -> String {
    format!("{}@{}", c.username, c.host)
}

fn common_args(c: &SshCredentials, control_path: &Path) -> Vec<String> {
    vec![
        "-S".into(),
        control_path.display().to_string(),
        "-p".into(),
        c.port.to_string(),
        "-o".into(),
        "StrictHostKeyChecking=accept-new".into(),
        "-o".into(),
        format!("ConnectTimeout={}", c.connect_timeout_secs),
    ]
}

/// `ssh -M -f -N`: authenticate once, then background as the control master.
fn master_args(c: &SshCredentials, control_path: &Path) -> Vec<String> {
    let mut args = common_args(c, control_path);
    args.extend(["-M", "-f", "-N"].map(String::from));
    args.push(destination(c));
    args
}

/// Run over the existing master; BatchMode makes a dead master fail instead of prompting.
fn exec_args(c: &SshCredentials, control_path: &Path, command: &str) -> Vec<String> {
    let mut args = common_args(c, control_path);
    args.extend(["-o", "ControlMaster=no", "-o", "BatchMode=yes"].map(String::from));
    args.push(destination(c));
    args.push("--".into());
    args.push(command.into());
    args
}

fn exit_args(c: &SshCredentials, control_path: &Path) -> Vec<String> {
    let mut args = common_args(c, control_path);
    args.extend(["-O", "exit"].map(String::from));
    args.push(destination(c));
    args
}

#[async_trait]
impl RemoteShell for SshShell {
    #[instrument(skip(self), fields(host = %self.credentials.host, port = self.credentials.port))]
    async fn open(&self) -> Result<Box<dyn RemoteSession>> {
        let control_path = Self::control_path();
        // The backgrounded master inherits stdio; anything piped here would never reach EOF.
        let status = Command::new("sshpass")
            .arg("-e")
            .arg("ssh")
            .args(master_args(&self.credentials, &control_path))
            .env("SSHPASS", &self.credentials.password)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| StatsError::remote_exec("ssh connect", e))?;
        if !status.success() {
            return Err(StatsError::remote_exec(
                "ssh connect",
                format!("sshpass/ssh exited with {}", status),
            ));
        }
        debug!(control_path = %control_path.display(), "ssh master started");
        Ok(Box::new(SshSession {
            credentials: self.credentials.clone(),
            control_path,
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct SshSession {
    credentials: SshCredentials,
    control_path: PathBuf,
    closed: AtomicBool,
}

#[async_trait]
impl RemoteSession for SshSession {
    #[instrument(skip(self), fields(host = %self.credentials.host))]
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let output = Command::new("ssh")
            .args(exec_args(&self.credentials, &self.control_path, command))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StatsError::remote_exec(command, e))?;
        // 255 is ssh's own failure code (connection lost, master gone).
        if output.status.code() == Some(255) {
            return Err(StatsError::remote_exec(
                command,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_status: output.status.code(),
        })
    }

    async fn close(self: Box<Self>) {
        self.closed.store(true, Ordering::Relaxed);
        let result = Command::new("ssh")
            .args(exit_args(&self.credentials, &self.control_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match result {
            Ok(status) if status.success() => debug!("ssh master closed"),
            Ok(status) => warn!(%status, "ssh master exit request failed"),
            Err(e) => warn!(error = %e, "ssh master exit request failed"),
        }
        let _ = std::fs::remove_file(&self.control_path);
    }
}

impl Drop for SshSession {
    /// Fallback when `close()` was never reached (e.g. the request future was dropped).
    /// The exit request is waited on in the background so no zombie is left behind.
    fn drop(&mut self) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        let args = exit_args(&self.credentials, &self.control_path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let status = Command::new("ssh")
                        .args(args)
                        .stdin(Stdio::null())
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status()
                        .await;
                    if let Err(e) = status {
                        warn!(error = %e, "could not request ssh master exit on drop");
                    }
                });
            }
            Err(_) => {
                let spawned = std::process::Command::new("ssh")
                    .args(args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn();
                match spawned {
                    Ok(mut child) => {
                        std::thread::spawn(move || child.wait());
                    }
                    Err(e) => warn!(error = %e, "could not request ssh master exit on drop"),
                }
            }
        }
    }
}
