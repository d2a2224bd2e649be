// Shared test helpers: scripted remote shell, session verifier, canned command output

#![allow(dead_code)]

use async_trait::async_trait;
use statsboard::auth::StaticSessions;
use statsboard::backends::commands;
use statsboard::config::{AuthConfig, SessionToken};
use statsboard::error::{Result, StatsError};
use statsboard::remote::{CommandOutput, RemoteSession, RemoteShell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "t0k3n";
pub const IDENTITY: &str = "ops@example.com";

pub fn sessions() -> Arc<StaticSessions> {
    Arc::new(StaticSessions::from_config(&AuthConfig {
        allowed_identity: Some(IDENTITY.into()),
        sessions: vec![
            SessionToken {
                token: TOKEN.into(),
                identity: IDENTITY.into(),
            },
            SessionToken {
                token: "guest".into(),
                identity: "guest@example.com".into(),
            },
        ],
    }))
}

/// Counters shared between a ScriptedShell and the test that inspects it.
#[derive(Debug, Default)]
pub struct ShellLog {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub executed: Mutex<Vec<String>>,
}

impl ShellLog {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

/// In-memory RemoteShell: each command answers with canned stdout (exit 0), unknown
/// commands exit 127 with no output, and `fail_on` makes one command a transport failure.
#[derive(Clone, Default)]
pub struct ScriptedShell {
    pub outputs: HashMap<String, String>,
    pub fail_on: Option<String>,
    pub fail_open: bool,
    pub log: Arc<ShellLog>,
}

impl ScriptedShell {
    pub fn with(mut self, command: &str, stdout: &str) -> Self {
        self.outputs.insert(command.to_string(), stdout.to_string());
        self
    }

    pub fn failing_on(mut self, command: &str) -> Self {
        self.fail_on = Some(command.to_string());
        self
    }
}

struct ScriptedSession {
    shell: ScriptedShell,
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn open(&self) -> Result<Box<dyn RemoteSession>> {
        if self.fail_open {
            return Err(StatsError::remote_exec("ssh connect", "connection refused"));
        }
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            shell: self.clone(),
        }))
    }
}

#[async_trait]
impl RemoteSession for ScriptedSession {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.shell
            .log
            .executed
            .lock()
            .unwrap()
            .push(command.to_string());
        if self.shell.fail_on.as_deref() == Some(command) {
            return Err(StatsError::remote_exec(command, "connection reset"));
        }
        Ok(match self.shell.outputs.get(command) {
            Some(stdout) => CommandOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
                exit_status: Some(0),
            },
            None => CommandOutput {
                stdout: String::new(),
                stderr: "command not found".into(),
                exit_status: Some(127),
            },
        })
    }

    async fn close(self: Box<Self>) {
        self.shell.log.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub const TOP: &str = "%Cpu(s): 20.0 us,  5.0 sy,  0.0 ni, 75.0 id,  0.0 wa,  0.0 hi,  0.0 si,  0.0 st\n";
pub const FREE: &str = "              total        used        free      shared  buff/cache   available\nMem:           1000         400         200          10         400         550\nSwap:             0           0           0\n";
pub const DF: &str = "Filesystem     1G-blocks  Used Available Use% Mounted on\n/dev/vda1            80G   30G       47G  39% /\n";
pub const DOCKER_CPU_MEM: &str = "web\t12.50%\t256MiB / 1000MiB\ndb\t3.00%\t300MiB / 1000MiB\nidle\t0.00%\t0B / 1000MiB\n";
pub const DOCKER_BLOCK_IO: &str = "web\t1.2MB / 3.4MB\ndb\t100MB / 900MB\nidle\t0B / 0B\n";
pub const DOCKER_PS: &str = "web\t3f2a1b4c5d6e\tnginx:1.27\ndb\t9c8d7e6f5a4b\tpostgres:16\nidle\t0a1b2c3d4e5f\tbusybox\n";
pub const PS_CPU: &str = "812 root ps aux --sort=-%cpu 40.0 0.1\n813 root awk NR>1 {cmd=$11} 30.0 0.0\n1200 www-data php-fpm: pool www 20.0 5.0\n77 root awkward-tool --serve 1.0 1.0\n90 root sshd: monitor 0.0 0.2\n";
pub const PS_MEM: &str = "1200 www-data php-fpm: pool www 20.0 50.0\n77 root awkward-tool --serve 1.0 1.0\n";

/// A host answering every command the full SSH backend runs.
pub fn healthy_host() -> ScriptedShell {
    ScriptedShell::default()
        .with(commands::TOP_CPU, TOP)
        .with(commands::FREE_MEM, FREE)
        .with(commands::DF_ROOT, DF)
        .with(commands::DOCKER_CPU_MEM, DOCKER_CPU_MEM)
        .with(commands::DOCKER_BLOCK_IO, DOCKER_BLOCK_IO)
        .with(commands::DOCKER_PS, DOCKER_PS)
        .with(commands::PS_BY_CPU, PS_CPU)
        .with(commands::PS_BY_MEM, PS_MEM)
}
