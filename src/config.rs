use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::error::StatsError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub server_info: ServerInfoConfig,
    pub monitoring: MonitoringConfig,
    pub ssh: SshConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".into(),
        }
    }
}

/// Identity shown in the dashboard header. `description` falls back to the backend's own.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerInfoConfig {
    pub name: String,
    pub ip: String,
    pub description: Option<String>,
}

impl Default for ServerInfoConfig {
    fn default() -> Self {
        Self {
            name: "VPS Server".into(),
            ip: String::new(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Pick from whichever settings are present: netdata, then node_exporter + ssh, then ssh.
    #[default]
    Auto,
    Netdata,
    NodeExporter,
    Ssh,
    SshLegacy,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "netdata" => Ok(Self::Netdata),
            "node_exporter" | "node-exporter" => Ok(Self::NodeExporter),
            "ssh" => Ok(Self::Ssh),
            "ssh_legacy" | "ssh-legacy" => Ok(Self::SshLegacy),
            other => anyhow::bail!("unknown monitoring backend {:?}", other),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub backend: BackendKind,
    pub netdata_url: Option<String>,
    pub node_exporter_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Handed to the ssh client as ConnectTimeout; there is no per-request timeout.
    pub connect_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 22,
            username: None,
            password: None,
            connect_timeout_secs: 10,
        }
    }
}

/// Complete SSH settings for one remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub connect_timeout_secs: u64,
}

impl SshConfig {
    /// Credentials, or a config error naming the first missing setting.
    pub fn credentials(&self) -> Result<SshCredentials, StatsError> {
        let host = self
            .host
            .clone()
            .ok_or_else(|| StatsError::missing_setting("SSH_HOST"))?;
        let username = self
            .username
            .clone()
            .ok_or_else(|| StatsError::missing_setting("SSH_USERNAME"))?;
        let password = self
            .password
            .clone()
            .ok_or_else(|| StatsError::missing_setting("SSH_PASSWORD"))?;
        Ok(SshCredentials {
            host,
            port: self.port,
            username,
            password,
            connect_timeout_secs: self.connect_timeout_secs,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// When set, backends that run remote shell commands only answer this identity.
    pub allowed_identity: Option<String>,
    pub sessions: Vec<SessionToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub identity: String,
}

impl AppConfig {
    /// Read `CONFIG_FILE` (default `config.toml`), then apply environment overrides.
    /// A missing default file means "defaults + environment only".
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::load_from_path(path, |key| std::env::var(key).ok()),
            Err(_) if !Path::new("config.toml").exists() => {
                Self::load_from_str_with_env("", |key| std::env::var(key).ok())
            }
            Err(_) => Self::load_from_path("config.toml", |key| std::env::var(key).ok()),
        }
    }

    /// Read a TOML file, then apply overrides from `lookup`.
    pub fn load_from_path<P, F>(path: P, lookup: F) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))?;
        Self::load_from_str_with_env(&s, lookup)
    }

    /// Parse, apply overrides from `lookup`, validate.
    pub fn load_from_str_with_env<F>(s: &str, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config: AppConfig = toml::from_str(s)?;
        let config = config.with_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests). No environment lookups.
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the environment-style keys on top of the file. Empty values count as unset.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("PORT must be a port number, got {:?}: {}", v, e))?;
        }
        if let Some(v) = get("SERVER_NAME") {
            self.server_info.name = v;
        }
        if let Some(v) = get("SERVER_IP") {
            self.server_info.ip = v;
        }
        if let Some(v) = get("MONITORING_BACKEND") {
            self.monitoring.backend = v.parse()?;
        }
        if let Some(v) = get("NETDATA_URL") {
            self.monitoring.netdata_url = Some(v);
        }
        if let Some(v) = get("NODE_EXPORTER_URL") {
            self.monitoring.node_exporter_url = Some(v);
        }
        if let Some(v) = get("SSH_HOST") {
            self.ssh.host = Some(v);
        }
        if let Some(v) = get("SSH_PORT") {
            self.ssh.port = v.trim().parse().map_err(|e| {
                anyhow::anyhow!("SSH_PORT must be a port number, got {:?}: {}", v, e)
            })?;
        }
        if let Some(v) = get("SSH_USERNAME") {
            self.ssh.username = Some(v);
        }
        if let Some(v) = get("SSH_PASSWORD") {
            self.ssh.password = Some(v);
        }
        if let Some(v) = get("ALLOWED_EMAIL") {
            self.auth.allowed_identity = Some(v);
        }
        Ok(self)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            self.ssh.port > 0,
            "ssh.port must be between 1 and 65535, got {}",
            self.ssh.port
        );
        anyhow::ensure!(
            self.ssh.connect_timeout_secs > 0,
            "ssh.connect_timeout_secs must be > 0, got {}",
            self.ssh.connect_timeout_secs
        );
        for (key, url) in [
            ("monitoring.netdata_url", &self.monitoring.netdata_url),
            ("monitoring.node_exporter_url", &self.monitoring.node_exporter_url),
        ] {
            if let Some(url) = url {
                anyhow::ensure!(
                    url.starts_with("http://") || url.starts_with("https://"),
                    "{} must be an http(s) URL, got {:?}",
                    key,
                    url
                );
            }
        }
        for session in &self.auth.sessions {
            anyhow::ensure!(
                !session.token.is_empty() && !session.identity.is_empty(),
                "auth.sessions entries need a non-empty token and identity"
            );
        }
        Ok(())
    }
}
