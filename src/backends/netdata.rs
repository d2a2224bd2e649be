// Netdata chart API backend

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{FetchContext, StatsBackend, get_json};
use crate::error::Result;
use crate::models::{ResourceSnapshot, Usage};
use crate::ranking::ProcessSources;
use crate::units::{gib_to_bytes, mib_to_bytes};

const DISK_CHART_PREFIX: &str = "disk_space.";
const DISK_CHART_FALLBACK: &str = "disk_space._";
const CPU_CHART: &str = "system.cpu";
const RAM_CHART: &str = "system.ram";

/// `GET /api/v1/charts`. Only the keys matter; their order is the catalog's own.
/// A missing or `null` chart map behaves like an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartCatalog {
    #[serde(default)]
    pub charts: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ChartCatalog {
    /// First `disk_space.*` chart (`disk_space._` or `disk_space./` depending on the agent).
    pub fn disk_chart(&self) -> &str {
        self.charts
            .iter()
            .flat_map(|charts| charts.keys())
            .find(|k| k.starts_with(DISK_CHART_PREFIX))
            .map_or(DISK_CHART_FALLBACK, String::as_str)
    }
}

/// `GET /api/v1/data?chart=..&after=-1&format=json`: label row plus data rows,
/// column 0 being the timestamp.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartData {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub data: Vec<Vec<Option<f64>>>,
}

impl ChartData {
    fn latest(&self, index: usize) -> f64 {
        self.data
            .first()
            .and_then(|row| row.get(index).copied().flatten())
            .unwrap_or(0.0)
    }

    /// Latest value of the dimension named `label`, or 0 when absent.
    pub fn value(&self, label: &str) -> f64 {
        self.labels
            .iter()
            .position(|l| l == label)
            .map_or(0.0, |i| self.latest(i))
    }

    /// Sum of every dimension except `time`. Not clamped.
    pub fn cpu_percent(&self) -> f64 {
        (1..self.labels.len()).map(|i| self.latest(i)).sum()
    }

    /// `system.ram` reports MiB; total is free + used + cached + buffers.
    pub fn memory_usage(&self) -> Usage {
        let used = self.value("used");
        let total = self.value("free") + used + self.value("cached") + self.value("buffers");
        Usage {
            used: mib_to_bytes(used),
            total: mib_to_bytes(total),
        }
    }

    /// `disk_space.*` reports GiB; total is used + avail.
    pub fn disk_usage(&self) -> Usage {
        let used = self.value("used");
        let total = used + self.value("avail");
        Usage {
            used: gib_to_bytes(used),
            total: gib_to_bytes(total),
        }
    }
}

pub struct NetdataBackend {
    client: reqwest::Client,
    base_url: String,
}

impl NetdataBackend {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn chart(&self, chart: &str) -> Result<ChartData> {
        get_json(
            &self.client,
            &format!("{}/api/v1/data", self.base_url),
            &[("chart", chart), ("after", "-1"), ("format", "json")],
            &format!("Failed to fetch from Netdata ({})", chart),
        )
        .await
    }
}

#[async_trait]
impl StatsBackend for NetdataBackend {
    fn name(&self) -> &'static str {
        "netdata"
    }

    fn description(&self) -> &'static str {
        "Monitored by Netdata"
    }

    #[instrument(skip_all, fields(backend = "netdata", operation = "fetch_system_metrics"))]
    async fn fetch_system_metrics(&self, _ctx: &FetchContext<'_>) -> Result<ResourceSnapshot> {
        let catalog: ChartCatalog = get_json(
            &self.client,
            &format!("{}/api/v1/charts", self.base_url),
            &[],
            "Failed to fetch Netdata chart catalog",
        )
        .await?;
        let disk_chart = catalog.disk_chart();
        debug!(disk_chart, "using Netdata disk chart");

        let (cpu, ram, disk) = tokio::try_join!(
            self.chart(CPU_CHART),
            self.chart(RAM_CHART),
            self.chart(disk_chart)
        )?;
        Ok(ResourceSnapshot {
            cpu: Some(cpu.cpu_percent()),
            memory: Some(ram.memory_usage()),
            disk: Some(disk.disk_usage()),
        })
    }

    async fn fetch_process_rankings(
        &self,
        _ctx: &FetchContext<'_>,
    ) -> Result<Option<ProcessSources>> {
        Ok(None)
    }
}
