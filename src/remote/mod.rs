// Remote command execution: one session per request, commands multiplexed over it

mod ssh;

pub use ssh::SshShell;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use tracing::warn;

use crate::error::Result;

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the command was killed by a signal.
    pub exit_status: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

/// Opens sessions against the configured remote host.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn open(&self) -> Result<Box<dyn RemoteSession>>;
}

/// An open connection. Callers must `close()` it on every path once they are done.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    async fn close(self: Box<Self>);
}

/// Run one command and return its stdout. A non-zero exit is logged, not fatal: the
/// output is still parsed best effort (e.g. `docker` missing yields no container rows).
pub async fn run(session: &dyn RemoteSession, command: &str) -> Result<String> {
    let output = session.exec(command).await?;
    if !output.success() {
        warn!(
            command,
            exit_status = ?output.exit_status,
            stderr = %output.stderr.trim(),
            "remote command exited unsuccessfully"
        );
    }
    Ok(output.stdout)
}

/// Run several commands, concurrently or one after another. Outputs keep the input order;
/// the first transport failure aborts the lot.
pub async fn run_all(
    session: &dyn RemoteSession,
    commands: &[&str],
    concurrent: bool,
) -> Result<Vec<String>> {
    if concurrent {
        return try_join_all(commands.iter().map(|c| run(session, c))).await;
    }
    let mut outputs = Vec::with_capacity(commands.len());
    for command in commands {
        outputs.push(run(session, command).await?);
    }
    Ok(outputs)
}
