// Server identity, resource snapshot and the /api/stats response body

use serde::{Deserialize, Serialize};

use super::TopProcesses;

/// Used/total pair in bytes. `used <= total` is not guaranteed (sampling skew).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub used: f64,
    pub total: f64,
}

/// Backend-independent CPU / memory / disk figures. `None` serializes as `null`
/// (the backend answered but the figure could not be parsed).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub cpu: Option<f64>,
    pub memory: Option<Usage>,
    pub disk: Option<Usage>,
}

impl ResourceSnapshot {
    /// Total memory in bytes, if known. Host `ps` memory percentages are scaled by this.
    pub fn total_memory(&self) -> Option<f64> {
        self.memory.map(|m| m.total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerIdentity {
    pub name: String,
    pub ip: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub server: ServerIdentity,
    pub resources: ResourceSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_processes: Option<TopProcesses>,
}
