// Column parsers for remote command output: free, df, top, ps, docker stats, docker ps

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::units::{bytes_from_size_token, parse_percent, parse_size};

static TOP_IDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s:])([0-9]+(?:\.[0-9]+)?)\s*id\b").expect("top idle regex"));

static BLOCK_IO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]*\.?[0-9]+)\s*([A-Za-z]+)\s*/\s*([0-9]*\.?[0-9]+)\s*([A-Za-z]+)")
        .expect("block io regex")
});

/// `free -m` figures, still in MiB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryMib {
    pub total: f64,
    pub used: f64,
}

/// `df -BG` figures, still in GiB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskGib {
    pub total: f64,
    pub used: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostProcess {
    pub pid: String,
    pub user: String,
    pub command: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
}

/// One `docker stats` row with CPU % and memory usage in bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerUsage {
    pub name: String,
    pub cpu_percent: f64,
    pub memory_bytes: f64,
}

/// One `docker stats` row with block read + write in bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerIo {
    pub name: String,
    pub bytes: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerMeta {
    pub id: String,
    pub image: String,
}

fn non_empty_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().filter(|l| !l.trim().is_empty())
}

fn tab_columns(line: &str) -> Vec<&str> {
    line.split('\t').map(str::trim).collect()
}

/// Second line of `free -m`: `Mem: <total> <used> ...`.
pub fn parse_free(output: &str) -> Option<MemoryMib> {
    let line = non_empty_lines(output).nth(1)?;
    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() < 3 {
        return None;
    }
    Some(MemoryMib {
        total: cols[1].parse().ok()?,
        used: cols[2].parse().ok()?,
    })
}

/// Last line of `df -BG /`: `<filesystem> <total>G <used>G ...`.
pub fn parse_df(output: &str) -> Option<DiskGib> {
    let line = non_empty_lines(output).last()?;
    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() < 3 {
        return None;
    }
    let total = cols[1].replace('G', "").parse::<u64>().ok()?;
    let used = cols[2].replace('G', "").parse::<u64>().ok()?;
    Some(DiskGib {
        total: total as f64,
        used: used as f64,
    })
}

/// `%Cpu(s):  3.1 us,  1.0 sy, ... 95.5 id, ...` from `top -bn1` -> `100 - idle`.
pub fn parse_top_cpu(output: &str) -> Option<f64> {
    let line = non_empty_lines(output).find(|l| l.contains("Cpu(s)"))?;
    let idle = TOP_IDLE.captures(line)?[1].parse::<f64>().ok()?;
    Some((100.0 - idle).clamp(0.0, 100.0))
}

/// Rows of `<pid> <user> <command ...> <%cpu> <%mem>`. The header and short rows are dropped.
pub fn parse_ps(output: &str) -> Vec<HostProcess> {
    non_empty_lines(output)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 5 || cols[0].parse::<u32>().is_err() {
                return None;
            }
            let n = cols.len();
            Some(HostProcess {
                pid: cols[0].to_string(),
                user: cols[1].to_string(),
                command: cols[2..n - 2].join(" "),
                cpu_percent: cols[n - 2].parse().ok()?,
                mem_percent: cols[n - 1].parse().ok()?,
            })
        })
        .collect()
}

/// `{{.Name}}\t{{.CPUPerc}}\t{{.MemUsage}}`; MemUsage is `"<used> / <limit>"`, only `used` is kept.
pub fn parse_docker_cpu_mem(output: &str) -> Vec<ContainerUsage> {
    non_empty_lines(output)
        .filter_map(|line| {
            let cols = tab_columns(line);
            if cols.len() < 3 || cols[0].is_empty() {
                return None;
            }
            let used = cols[2].split('/').next().unwrap_or_default();
            Some(ContainerUsage {
                name: cols[0].to_string(),
                cpu_percent: parse_percent(cols[1]),
                memory_bytes: parse_size(used).unwrap_or(0.0),
            })
        })
        .collect()
}

/// `{{.Name}}\t{{.BlockIO}}`.
pub fn parse_docker_block_io(output: &str) -> Vec<ContainerIo> {
    non_empty_lines(output)
        .filter_map(|line| {
            let cols = tab_columns(line);
            if cols.len() < 2 || cols[0].is_empty() {
                return None;
            }
            Some(ContainerIo {
                name: cols[0].to_string(),
                bytes: parse_block_io(cols[1])?,
            })
        })
        .collect()
}

/// `"<read><unit> / <write><unit>"` -> read + write in bytes.
pub fn parse_block_io(field: &str) -> Option<f64> {
    let caps = BLOCK_IO.captures(field)?;
    let read = caps[1].parse::<f64>().ok()?;
    let write = caps[3].parse::<f64>().ok()?;
    Some(bytes_from_size_token(read, &caps[2]) + bytes_from_size_token(write, &caps[4]))
}

/// `{{.Names}}\t{{.ID}}\t{{.Image}}` -> name => {id, image}.
pub fn parse_docker_ps(output: &str) -> HashMap<String, ContainerMeta> {
    non_empty_lines(output)
        .filter_map(|line| {
            let cols = tab_columns(line);
            if cols.len() < 3 || cols[0].is_empty() {
                return None;
            }
            Some((
                cols[0].to_string(),
                ContainerMeta {
                    id: cols[1].to_string(),
                    image: cols[2].to_string(),
                },
            ))
        })
        .collect()
}
