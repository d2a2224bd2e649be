// Best-effort text parsers. Malformed lines and rows are dropped, never reported.

pub mod prometheus;
pub mod tabular;

pub use prometheus::{MetricSample, MetricTable, cpu_usage_from_counters, cpu_usage_from_totals};
pub use tabular::{
    ContainerIo, ContainerMeta, ContainerUsage, DiskGib, HostProcess, MemoryMib, parse_block_io,
    parse_df, parse_docker_block_io, parse_docker_cpu_mem, parse_docker_ps, parse_free, parse_ps,
    parse_top_cpu,
};
