// node_exporter metrics for system figures, SSH for per-process detail

use async_trait::async_trait;
use tracing::instrument;

use super::ssh::collect_process_sources;
use super::{FetchContext, StatsBackend, get_text};
use crate::error::Result;
use crate::models::{ResourceSnapshot, Usage};
use crate::parsers::{MetricTable, cpu_usage_from_counters};
use crate::ranking::ProcessSources;

pub struct NodeExporterBackend {
    client: reqwest::Client,
    metrics_url: String,
}

impl NodeExporterBackend {
    /// `metrics_url` is the full exposition endpoint, e.g. `http://host:9100/metrics`.
    pub fn new(client: reqwest::Client, metrics_url: impl Into<String>) -> Self {
        Self {
            client,
            metrics_url: metrics_url.into(),
        }
    }
}

/// CPU from the cumulative counter ratio, memory from MemTotal/MemAvailable and disk from
/// the `/` filesystem. All node_exporter values are already bytes.
pub fn snapshot_from_metrics(table: &MetricTable) -> ResourceSnapshot {
    ResourceSnapshot {
        cpu: Some(cpu_usage_from_counters(table)),
        memory: memory_from_metrics(table),
        disk: disk_from_metrics(table),
    }
}

fn memory_from_metrics(table: &MetricTable) -> Option<Usage> {
    let total = table.get("node_memory_MemTotal_bytes")?;
    // Kernels before 3.14 have no MemAvailable.
    let available = table.get("node_memory_MemAvailable_bytes").or_else(|| {
        Some(
            table.get("node_memory_MemFree_bytes")?
                + table.get("node_memory_Buffers_bytes").unwrap_or(0.0)
                + table.get("node_memory_Cached_bytes").unwrap_or(0.0),
        )
    })?;
    Some(Usage {
        used: total - available,
        total,
    })
}

fn disk_from_metrics(table: &MetricTable) -> Option<Usage> {
    let size = table.find("node_filesystem_size_bytes", "mountpoint", "/")?;
    let avail = table.find("node_filesystem_avail_bytes", "mountpoint", "/")?;
    Some(Usage {
        used: size - avail,
        total: size,
    })
}

#[async_trait]
impl StatsBackend for NodeExporterBackend {
    fn name(&self) -> &'static str {
        "node_exporter"
    }

    fn description(&self) -> &'static str {
        "Monitored by node_exporter"
    }

    fn needs_session(&self) -> bool {
        true
    }

    #[instrument(skip_all, fields(backend = "node_exporter", operation = "fetch_system_metrics"))]
    async fn fetch_system_metrics(&self, _ctx: &FetchContext<'_>) -> Result<ResourceSnapshot> {
        let text = get_text(
            &self.client,
            &self.metrics_url,
            &[],
            "Failed to fetch from node_exporter",
        )
        .await?;
        Ok(snapshot_from_metrics(&MetricTable::parse(&text)))
    }

    #[instrument(skip_all, fields(backend = "node_exporter", operation = "fetch_process_rankings"))]
    async fn fetch_process_rankings(
        &self,
        ctx: &FetchContext<'_>,
    ) -> Result<Option<ProcessSources>> {
        let sources = collect_process_sources(ctx.session()?, true, true).await?;
        Ok(Some(sources))
    }
}
