// Shell-command backends: full (concurrent, docker + host) and legacy (sequential, docker only)

use async_trait::async_trait;
use tracing::instrument;

use super::{FetchContext, StatsBackend};
use crate::error::Result;
use crate::models::{ResourceSnapshot, Usage};
use crate::parsers::{
    parse_df, parse_docker_block_io, parse_docker_cpu_mem, parse_docker_ps, parse_free, parse_ps,
    parse_top_cpu,
};
use crate::ranking::ProcessSources;
use crate::remote::{RemoteSession, run_all};
use crate::units::{gib_to_bytes, mib_to_bytes};

/// The fixed one-liners run on the monitored host.
pub mod commands {
    // `LC_ALL=C` keeps decimals as `95.5`; a de_DE host would print `95,5`.
    pub const TOP_CPU: &str = "LC_ALL=C top -bn1 | grep 'Cpu(s)'";
    pub const FREE_MEM: &str = "LC_ALL=C free -m";
    pub const DF_ROOT: &str = "LC_ALL=C df -BG /";
    pub const DOCKER_CPU_MEM: &str =
        "docker stats --no-stream --format '{{.Name}}\t{{.CPUPerc}}\t{{.MemUsage}}'";
    pub const DOCKER_BLOCK_IO: &str = "docker stats --no-stream --format '{{.Name}}\t{{.BlockIO}}'";
    pub const DOCKER_PS: &str = "docker ps --format '{{.Names}}\t{{.ID}}\t{{.Image}}'";
    /// `<pid> <user> <command ...> <%cpu> <%mem>`, top 30 by CPU.
    pub const PS_BY_CPU: &str = r#"LC_ALL=C ps aux --sort=-%cpu | awk 'NR>1 {cmd=$11; for (i=12; i<=NF; i++) cmd=cmd" "$i; print $2, $1, cmd, $3, $4}' | head -n 30"#;
    /// Same columns, top 30 by memory.
    pub const PS_BY_MEM: &str = r#"LC_ALL=C ps aux --sort=-%mem | awk 'NR>1 {cmd=$11; for (i=12; i<=NF; i++) cmd=cmd" "$i; print $2, $1, cmd, $3, $4}' | head -n 30"#;
}

/// Build the snapshot from `top`, `free -m` and `df -BG` output, converting to bytes here.
/// Output that does not parse leaves the figure `None`.
pub fn snapshot_from_commands(top: &str, free: &str, df: &str) -> ResourceSnapshot {
    ResourceSnapshot {
        cpu: parse_top_cpu(top),
        memory: parse_free(free).map(|m| Usage {
            used: mib_to_bytes(m.used),
            total: mib_to_bytes(m.total),
        }),
        disk: parse_df(df).map(|d| Usage {
            used: gib_to_bytes(d.used),
            total: gib_to_bytes(d.total),
        }),
    }
}

/// Docker stats, docker ps and (optionally) host `ps`, parsed into ranking inputs.
pub(crate) async fn collect_process_sources(
    session: &dyn RemoteSession,
    concurrent: bool,
    host_processes: bool,
) -> Result<ProcessSources> {
    let mut cmds = vec![
        commands::DOCKER_CPU_MEM,
        commands::DOCKER_BLOCK_IO,
        commands::DOCKER_PS,
    ];
    if host_processes {
        cmds.extend([commands::PS_BY_CPU, commands::PS_BY_MEM]);
    }
    let out = run_all(session, &cmds, concurrent).await?;
    let host = |i: usize| out.get(i).map(|s| parse_ps(s)).unwrap_or_default();
    Ok(ProcessSources {
        containers: parse_docker_cpu_mem(&out[0]),
        container_io: parse_docker_block_io(&out[1]),
        container_meta: parse_docker_ps(&out[2]),
        host_by_cpu: host(3),
        host_by_mem: host(4),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshBackend {
    concurrent: bool,
    host_processes: bool,
}

impl SshBackend {
    /// Every command at once, containers merged with host processes.
    pub fn full() -> Self {
        Self {
            concurrent: true,
            host_processes: true,
        }
    }

    /// One command at a time, containers only.
    pub fn legacy() -> Self {
        Self {
            concurrent: false,
            host_processes: false,
        }
    }
}

#[async_trait]
impl StatsBackend for SshBackend {
    fn name(&self) -> &'static str {
        if self.concurrent { "ssh" } else { "ssh_legacy" }
    }

    fn description(&self) -> &'static str {
        "Monitored over SSH"
    }

    fn needs_session(&self) -> bool {
        true
    }

    fn concurrent(&self) -> bool {
        self.concurrent
    }

    #[instrument(skip_all, fields(backend = "ssh", operation = "fetch_system_metrics"))]
    async fn fetch_system_metrics(&self, ctx: &FetchContext<'_>) -> Result<ResourceSnapshot> {
        let out = run_all(
            ctx.session()?,
            &[commands::TOP_CPU, commands::FREE_MEM, commands::DF_ROOT],
            self.concurrent,
        )
        .await?;
        Ok(snapshot_from_commands(&out[0], &out[1], &out[2]))
    }

    #[instrument(skip_all, fields(backend = "ssh", operation = "fetch_process_rankings"))]
    async fn fetch_process_rankings(
        &self,
        ctx: &FetchContext<'_>,
    ) -> Result<Option<ProcessSources>> {
        let sources =
            collect_process_sources(ctx.session()?, self.concurrent, self.host_processes).await?;
        Ok(Some(sources))
    }
}
