// Merge container and host process lists into per-resource rankings

use std::collections::HashMap;

use crate::models::{ProcessEntry, ProcessOrigin, TopProcesses};
use crate::parsers::{ContainerIo, ContainerMeta, ContainerUsage, HostProcess};

/// Display-name marker for rows that come from `docker stats`.
pub const CONTAINER_PREFIX: &str = "🐳 ";

/// Commands the SSH backends run themselves; they would otherwise top the CPU ranking.
const MONITORING_NOISE: [&str; 8] = ["ps", "docker", "awk", "head", "tail", "grep", "sed", "sort"];

/// Raw per-process figures gathered by a backend, before unit normalization and ranking.
#[derive(Debug, Clone, Default)]
pub struct ProcessSources {
    pub containers: Vec<ContainerUsage>,
    pub container_io: Vec<ContainerIo>,
    pub container_meta: HashMap<String, ContainerMeta>,
    /// `ps` rows sorted by CPU. Empty when the backend does not look at host processes.
    pub host_by_cpu: Vec<HostProcess>,
    /// `ps` rows sorted by memory.
    pub host_by_mem: Vec<HostProcess>,
}

/// True for `ps`, `awk '{...}'`, `docker stats ...` and friends; `awkward-tool` is not noise.
pub fn is_monitoring_noise(command: &str) -> bool {
    let command = command.trim();
    MONITORING_NOISE.iter().any(|noise| {
        command == *noise
            || command
                .strip_prefix(noise)
                .is_some_and(|rest| rest.starts_with(' '))
    })
}

/// Concatenate container then host rows and sort descending by value. Ties keep discovery
/// order. Host rows named after a monitoring command are dropped.
pub fn merge_ranked(containers: Vec<ProcessEntry>, host: Vec<ProcessEntry>) -> Vec<ProcessEntry> {
    let mut merged: Vec<ProcessEntry> = containers
        .into_iter()
        .chain(host.into_iter().filter(|e| !is_monitoring_noise(&e.name)))
        .collect();
    merged.sort_by(|a, b| b.value.total_cmp(&a.value));
    merged
}

/// Build the three rankings. Host memory is reported as a percentage, so it is scaled by
/// `total_memory` (bytes); without a total, host rows are left out of the memory ranking.
pub fn rank_processes(sources: &ProcessSources, total_memory: Option<f64>) -> TopProcesses {
    let mem_bytes = |percent: f64| total_memory.map(|total| percent * total / 100.0);

    let container_cpu = sources
        .containers
        .iter()
        .filter(|c| c.cpu_percent > 0.0)
        .map(|c| ProcessEntry {
            secondary: Some(c.memory_bytes),
            ..container_entry(&c.name, c.cpu_percent, &sources.container_meta)
        })
        .collect();
    let host_cpu = sources
        .host_by_cpu
        .iter()
        .filter(|p| p.cpu_percent > 0.0)
        .map(|p| ProcessEntry {
            secondary: mem_bytes(p.mem_percent),
            ..host_entry(p, p.cpu_percent)
        })
        .collect();

    let container_mem = sources
        .containers
        .iter()
        .filter(|c| c.memory_bytes > 0.0)
        .map(|c| ProcessEntry {
            secondary: Some(c.cpu_percent),
            ..container_entry(&c.name, c.memory_bytes, &sources.container_meta)
        })
        .collect();
    let host_mem = sources
        .host_by_mem
        .iter()
        .filter_map(|p| {
            let bytes = mem_bytes(p.mem_percent)?;
            (bytes > 0.0).then(|| ProcessEntry {
                secondary: Some(p.cpu_percent),
                ..host_entry(p, bytes)
            })
        })
        .collect();

    let container_disk = sources
        .container_io
        .iter()
        .filter(|c| c.bytes > 0.0)
        .map(|c| container_entry(&c.name, c.bytes, &sources.container_meta))
        .collect();

    TopProcesses {
        cpu: merge_ranked(container_cpu, host_cpu),
        memory: merge_ranked(container_mem, host_mem),
        disk: merge_ranked(container_disk, Vec::new()),
    }
}

fn container_entry(name: &str, value: f64, meta: &HashMap<String, ContainerMeta>) -> ProcessEntry {
    let name = name.trim();
    let meta = meta.get(name);
    ProcessEntry {
        id: meta.map(|m| m.id.clone()),
        image: meta.map(|m| m.image.clone()),
        ..ProcessEntry::new(
            format!("{}{}", CONTAINER_PREFIX, name),
            value,
            ProcessOrigin::Container,
        )
    }
}

fn host_entry(process: &HostProcess, value: f64) -> ProcessEntry {
    ProcessEntry {
        id: Some(process.pid.clone()),
        user: Some(process.user.clone()),
        ..ProcessEntry::new(process.command.clone(), value, ProcessOrigin::Host)
    }
}
