// Prometheus exposition text -> MetricTable, plus the counter-ratio CPU figure

use regex::Regex;
use std::sync::LazyLock;

static SAMPLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z_:][a-zA-Z0-9_:]*)(\{.*\})?\s+(\S+)(?:\s+-?[0-9]+)?$")
        .expect("sample line regex")
});

static LABEL_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_][a-zA-Z0-9_]*)\s*=\s*"((?:[^"\\]|\\.)*)""#).expect("label regex")
});

/// One parsed series line. `key` is the name plus the raw label block, e.g.
/// `node_cpu_seconds_total{cpu="0",mode="idle"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub key: String,
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl MetricSample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parsed samples in input order. Several keys share a metric name (one per label set), so
/// aggregate figures must iterate and sum rather than look up a single key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricTable {
    samples: Vec<MetricSample>,
}

impl MetricTable {
    pub fn parse(text: &str) -> Self {
        let samples = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(parse_sample)
            .collect();
        Self { samples }
    }

    /// Value of the first sample whose full key matches exactly.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.samples.iter().find(|s| s.key == key).map(|s| s.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter()
    }

    /// All samples of one metric family.
    pub fn series<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MetricSample> {
        self.samples.iter().filter(move |s| s.name == name)
    }

    /// First sample of `name` carrying `label="value"`.
    pub fn find(&self, name: &str, label: &str, value: &str) -> Option<f64> {
        self.series(name)
            .find(|s| s.label(label) == Some(value))
            .map(|s| s.value)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn parse_sample(line: &str) -> Option<MetricSample> {
    let caps = SAMPLE_LINE.captures(line)?;
    let value = caps[3].parse::<f64>().ok()?;
    let name = caps[1].to_string();
    let label_block = caps.get(2).map_or("", |m| m.as_str());
    let labels = LABEL_PAIR
        .captures_iter(label_block)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();
    Some(MetricSample {
        key: format!("{}{}", name, label_block),
        name,
        labels,
        value,
    })
}

/// Lifetime-average CPU usage from cumulative `*_cpu_seconds_total` counters:
/// `100 - idle / all * 100`. There is no second sample, so this is not an instantaneous rate.
pub fn cpu_usage_from_counters(table: &MetricTable) -> f64 {
    let mut total_all = 0.0;
    let mut total_idle = 0.0;
    for sample in table
        .iter()
        .filter(|s| s.name.ends_with("_cpu_seconds_total"))
    {
        total_all += sample.value;
        if sample.label("mode") == Some("idle") {
            total_idle += sample.value;
        }
    }
    cpu_usage_from_totals(total_all, total_idle)
}

/// Clamped into `[0, 100]`; a zero or NaN total yields 0.
pub fn cpu_usage_from_totals(total_all: f64, total_idle: f64) -> f64 {
    if total_all == 0.0 || total_all.is_nan() {
        return 0.0;
    }
    let usage = 100.0 - (total_idle / total_all) * 100.0;
    if usage.is_nan() {
        0.0
    } else {
        usage.clamp(0.0, 100.0)
    }
}
