// Ranked "top consumer" rows

use serde::{Deserialize, Serialize};

/// Where a ranked row came from; serializes to lowercase JSON ("container" / "host").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessOrigin {
    Container,
    Host,
}

/// One row of a ranking. `value` is % for CPU rankings and bytes for memory / disk I/O.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntry {
    pub name: String,
    pub value: f64,
    pub origin: ProcessOrigin,
    /// Container short id or host pid.
    #[serde(rename = "pid", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Cross metric: memory bytes on a CPU ranking, CPU % on a memory ranking.
    #[serde(
        rename = "secondaryMetric",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub secondary: Option<f64>,
}

impl ProcessEntry {
    pub fn new(name: impl Into<String>, value: f64, origin: ProcessOrigin) -> Self {
        Self {
            name: name.into(),
            value,
            origin,
            id: None,
            user: None,
            image: None,
            secondary: None,
        }
    }
}

/// Rankings per resource dimension, each sorted descending by `value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopProcesses {
    pub cpu: Vec<ProcessEntry>,
    pub memory: Vec<ProcessEntry>,
    pub disk: Vec<ProcessEntry>,
}
