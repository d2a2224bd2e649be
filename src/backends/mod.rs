// Telemetry backends behind one capability interface

mod netdata;
mod node_exporter;
mod ssh;

pub use netdata::{ChartCatalog, ChartData, NetdataBackend};
pub use node_exporter::{NodeExporterBackend, snapshot_from_metrics};
pub use ssh::{SshBackend, commands, snapshot_from_commands};

use async_trait::async_trait;

use crate::config::{AppConfig, BackendKind};
use crate::error::{Result, StatsError};
use crate::models::ResourceSnapshot;
use crate::ranking::ProcessSources;
use crate::remote::RemoteSession;

/// Per-request handles a backend may use. The remote session is only present for
/// backends that report `needs_session()`.
#[derive(Clone, Copy, Default)]
pub struct FetchContext<'a> {
    session: Option<&'a dyn RemoteSession>,
}

impl<'a> FetchContext<'a> {
    pub fn detached() -> Self {
        Self { session: None }
    }

    pub fn with_session(session: &'a dyn RemoteSession) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&self) -> Result<&'a dyn RemoteSession> {
        self.session
            .ok_or_else(|| StatsError::Config("remote session not available".into()))
    }
}

#[async_trait]
pub trait StatsBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Default server description shown when none is configured.
    fn description(&self) -> &'static str;

    /// Whether the orchestrator has to open a remote session for this backend.
    fn needs_session(&self) -> bool {
        false
    }

    /// Whether system metrics and rankings may be fetched at the same time.
    fn concurrent(&self) -> bool {
        true
    }

    /// CPU %, memory and disk in canonical units.
    async fn fetch_system_metrics(&self, ctx: &FetchContext<'_>) -> Result<ResourceSnapshot>;

    /// Raw per-process figures, or `None` when the backend has no process view.
    async fn fetch_process_rankings(
        &self,
        ctx: &FetchContext<'_>,
    ) -> Result<Option<ProcessSources>>;
}

/// Resolve `auto` against the settings present, and check the chosen backend's required
/// settings. Errors name the first missing key.
pub fn resolve_kind(config: &AppConfig) -> Result<BackendKind> {
    let monitoring = &config.monitoring;
    let kind = match monitoring.backend {
        BackendKind::Auto => {
            if monitoring.netdata_url.is_some() {
                BackendKind::Netdata
            } else if monitoring.node_exporter_url.is_some() {
                BackendKind::NodeExporter
            } else if config.ssh.host.is_some() {
                BackendKind::Ssh
            } else {
                return Err(StatsError::Config(
                    "Monitoring backend not configured: set NETDATA_URL, NODE_EXPORTER_URL or SSH_HOST"
                        .into(),
                ));
            }
        }
        explicit => explicit,
    };
    match kind {
        BackendKind::Netdata if monitoring.netdata_url.is_none() => {
            return Err(StatsError::missing_setting("NETDATA_URL"));
        }
        BackendKind::NodeExporter if monitoring.node_exporter_url.is_none() => {
            return Err(StatsError::missing_setting("NODE_EXPORTER_URL"));
        }
        _ => {}
    }
    if kind_needs_session(kind) {
        config.ssh.credentials()?;
        if config.auth.allowed_identity.is_none() {
            return Err(StatsError::missing_setting("ALLOWED_EMAIL"));
        }
    }
    Ok(kind)
}

/// Backends that run shell commands on the monitored host.
pub fn kind_needs_session(kind: BackendKind) -> bool {
    matches!(
        kind,
        BackendKind::NodeExporter | BackendKind::Ssh | BackendKind::SshLegacy
    )
}

/// GET `url` (with `query`) and return the body; any transport error or non-2xx status is
/// an upstream failure.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
    context: &str,
) -> Result<String> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| StatsError::upstream(context, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(StatsError::upstream(context, format!("HTTP {}", status)));
    }
    response
        .text()
        .await
        .map_err(|e| StatsError::upstream(context, e))
}

pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
    context: &str,
) -> Result<T> {
    let body = get_text(client, url, query, context).await?;
    serde_json::from_str(&body).map_err(|e| StatsError::upstream(context, e))
}
