// Per-request orchestration: open session, fan out backend fetches, rank, assemble response

use std::sync::Arc;
use tracing::{info, instrument};

use crate::auth::Principal;
use crate::backends::{
    FetchContext, NetdataBackend, NodeExporterBackend, SshBackend, StatsBackend, resolve_kind,
};
use crate::config::{AppConfig, BackendKind, ServerInfoConfig};
use crate::error::{Result, StatsError};
use crate::models::{ServerIdentity, StatsResponse};
use crate::ranking::rank_processes;
use crate::remote::{RemoteShell, SshShell};

pub struct Aggregator {
    backend: Arc<dyn StatsBackend>,
    shell: Option<Arc<dyn RemoteShell>>,
    server: ServerIdentity,
    allowed_identity: Option<String>,
}

impl Aggregator {
    pub fn new(
        backend: Arc<dyn StatsBackend>,
        shell: Option<Arc<dyn RemoteShell>>,
        server_info: &ServerInfoConfig,
        allowed_identity: Option<String>,
    ) -> Self {
        let server = ServerIdentity {
            name: server_info.name.clone(),
            ip: server_info.ip.clone(),
            description: server_info
                .description
                .clone()
                .unwrap_or_else(|| backend.description().to_string()),
        };
        Self {
            backend,
            shell,
            server,
            allowed_identity,
        }
    }

    /// Select the backend from the configuration. Called once at startup; the error (if any)
    /// is what every stats request answers with.
    pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Result<Self> {
        let kind = resolve_kind(config)?;
        let monitoring = &config.monitoring;
        let url = |u: &Option<String>, key: &str| {
            u.clone().ok_or_else(|| StatsError::missing_setting(key))
        };
        let backend: Arc<dyn StatsBackend> = match kind {
            BackendKind::Netdata => Arc::new(NetdataBackend::new(
                http,
                url(&monitoring.netdata_url, "NETDATA_URL")?,
            )),
            BackendKind::NodeExporter => Arc::new(NodeExporterBackend::new(
                http,
                url(&monitoring.node_exporter_url, "NODE_EXPORTER_URL")?,
            )),
            BackendKind::Ssh | BackendKind::Auto => Arc::new(SshBackend::full()),
            BackendKind::SshLegacy => Arc::new(SshBackend::legacy()),
        };
        let (shell, allowed_identity) = if backend.needs_session() {
            let shell: Arc<dyn RemoteShell> = Arc::new(SshShell::new(config.ssh.credentials()?));
            (Some(shell), config.auth.allowed_identity.clone())
        } else {
            (None, None)
        };
        info!(backend = backend.name(), "monitoring backend selected");
        Ok(Self::new(
            backend,
            shell,
            &config.server_info,
            allowed_identity,
        ))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Backends that run shell commands only answer the allowed identity.
    pub fn authorize(&self, principal: &Principal) -> Result<()> {
        match &self.allowed_identity {
            Some(allowed) if principal.identity != *allowed => Err(StatsError::Unauthorized(
                format!("{} is not the allowed identity", principal.identity),
            )),
            _ => Ok(()),
        }
    }

    /// One full snapshot. Any fetch failure fails the whole request; the remote session is
    /// closed on both paths.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn collect(&self) -> Result<StatsResponse> {
        if !self.backend.needs_session() {
            return self.collect_with(&FetchContext::detached()).await;
        }
        let shell = self
            .shell
            .as_ref()
            .ok_or_else(|| StatsError::missing_setting("SSH_HOST"))?;
        let session = shell.open().await?;
        let result = self
            .collect_with(&FetchContext::with_session(session.as_ref()))
            .await;
        session.close().await;
        result
    }

    async fn collect_with(&self, ctx: &FetchContext<'_>) -> Result<StatsResponse> {
        let (resources, sources) = if self.backend.concurrent() {
            tokio::try_join!(
                self.backend.fetch_system_metrics(ctx),
                self.backend.fetch_process_rankings(ctx)
            )?
        } else {
            let resources = self.backend.fetch_system_metrics(ctx).await?;
            (resources, self.backend.fetch_process_rankings(ctx).await?)
        };
        let top_processes = sources.map(|s| rank_processes(&s, resources.total_memory()));
        Ok(StatsResponse {
            server: self.server.clone(),
            resources,
            top_processes,
        })
    }
}
