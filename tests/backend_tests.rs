// Netdata and node_exporter backends against mocked upstream HTTP servers

mod common;

use common::{IDENTITY, ScriptedShell, healthy_host};
use mockito::{Matcher, Server};
use statsboard::aggregator::Aggregator;
use statsboard::backends::{NodeExporterBackend, commands};
use statsboard::config::{AppConfig, ServerInfoConfig};
use statsboard::error::StatsError;
use statsboard::models::ProcessOrigin;
use std::sync::Arc;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * MIB;

const CHARTS: &str = r#"{"charts": {"system.cpu": {}, "system.ram": {}, "disk_space./": {}, "disk_space./boot": {}}}"#;
const CPU: &str = r#"{"labels": ["time", "guest_nice", "guest", "steal", "softirq", "irq", "user", "system", "nice", "iowait"],
    "data": [[1760000000, 0, 0, 0.5, 0.5, 0, 12, 5, 0, 2]]}"#;
const RAM: &str = r#"{"labels": ["time", "free", "used", "cached", "buffers"],
    "data": [[1760000000, 512, 2048, 1280, 256]]}"#;
const DISK: &str = r#"{"labels": ["time", "avail", "used", "reserved for root"],
    "data": [[1760000000, 60, 15, 5]]}"#;

fn netdata_config(url: &str) -> AppConfig {
    AppConfig::load_from_str(&format!(
        r#"
[server_info]
name = "edge-2"
ip = "198.51.100.4"

[monitoring]
netdata_url = "{}"
"#,
        url
    ))
    .unwrap()
}

async fn mock_chart(server: &mut Server, chart: &str, body: &str) -> mockito::Mock {
    server
        .mock("GET", "/api/v1/data")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("chart".into(), chart.into()),
            Matcher::UrlEncoded("after".into(), "-1".into()),
            Matcher::UrlEncoded("format".into(), "json".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

#[tokio::test]
async fn netdata_snapshot_without_rankings() {
    let mut server = Server::new_async().await;
    let charts = server
        .mock("GET", "/api/v1/charts")
        .with_status(200)
        .with_body(CHARTS)
        .create_async()
        .await;
    let cpu = mock_chart(&mut server, "system.cpu", CPU).await;
    let ram = mock_chart(&mut server, "system.ram", RAM).await;
    let disk = mock_chart(&mut server, "disk_space./", DISK).await;

    let aggregator =
        Aggregator::from_config(&netdata_config(&server.url()), reqwest::Client::new()).unwrap();
    assert_eq!(aggregator.backend_name(), "netdata");

    let stats = aggregator.collect().await.unwrap();
    assert_eq!(stats.server.name, "edge-2");
    assert_eq!(stats.server.description, "Monitored by Netdata");
    assert_eq!(stats.resources.cpu, Some(20.0));

    let memory = stats.resources.memory.unwrap();
    assert_eq!(memory.used, 2048.0 * MIB);
    assert_eq!(memory.total, 4096.0 * MIB);
    let disk_usage = stats.resources.disk.unwrap();
    assert_eq!(disk_usage.used, 15.0 * GIB);
    assert_eq!(disk_usage.total, 75.0 * GIB);
    assert!(stats.top_processes.is_none());

    let body = serde_json::to_value(&stats).unwrap();
    assert!(body.get("topProcesses").is_none());

    charts.assert_async().await;
    cpu.assert_async().await;
    ram.assert_async().await;
    disk.assert_async().await;
}

#[tokio::test]
async fn netdata_needs_no_identity_check() {
    let server = Server::new_async().await;
    let aggregator =
        Aggregator::from_config(&netdata_config(&server.url()), reqwest::Client::new()).unwrap();
    let principal = statsboard::auth::Principal {
        identity: "anyone@example.com".into(),
    };
    assert!(aggregator.authorize(&principal).is_ok());
}

#[tokio::test]
async fn netdata_missing_disk_chart_uses_fallback_name() {
    let mut server = Server::new_async().await;
    let _charts = server
        .mock("GET", "/api/v1/charts")
        .with_body(r#"{"charts": {"system.cpu": {}}}"#)
        .create_async()
        .await;
    let _cpu = mock_chart(&mut server, "system.cpu", CPU).await;
    let _ram = mock_chart(&mut server, "system.ram", RAM).await;
    let disk = mock_chart(&mut server, "disk_space._", DISK).await;

    let aggregator =
        Aggregator::from_config(&netdata_config(&server.url()), reqwest::Client::new()).unwrap();
    aggregator.collect().await.unwrap();
    disk.assert_async().await;
}

#[tokio::test]
async fn netdata_upstream_error_fails_the_whole_snapshot() {
    let mut server = Server::new_async().await;
    let _charts = server
        .mock("GET", "/api/v1/charts")
        .with_body(CHARTS)
        .create_async()
        .await;
    let _cpu = mock_chart(&mut server, "system.cpu", CPU).await;
    let _ram = server
        .mock("GET", "/api/v1/data")
        .match_query(Matcher::UrlEncoded("chart".into(), "system.ram".into()))
        .with_status(503)
        .create_async()
        .await;
    let _disk = mock_chart(&mut server, "disk_space./", DISK).await;

    let aggregator =
        Aggregator::from_config(&netdata_config(&server.url()), reqwest::Client::new()).unwrap();
    let err = aggregator.collect().await.unwrap_err();
    assert!(matches!(err, StatsError::Upstream { .. }));
    assert!(err.to_string().contains("system.ram"));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn netdata_malformed_json_is_an_upstream_error() {
    let mut server = Server::new_async().await;
    let _charts = server
        .mock("GET", "/api/v1/charts")
        .with_body("<html>not netdata</html>")
        .create_async()
        .await;

    let aggregator =
        Aggregator::from_config(&netdata_config(&server.url()), reqwest::Client::new()).unwrap();
    let err = aggregator.collect().await.unwrap_err();
    assert!(matches!(err, StatsError::Upstream { .. }));
}

const EXPOSITION: &str = r#"# HELP node_cpu_seconds_total Seconds the CPUs spent in each mode.
# TYPE node_cpu_seconds_total counter
node_cpu_seconds_total{cpu="0",mode="idle"} 900
node_cpu_seconds_total{cpu="0",mode="user"} 80
node_cpu_seconds_total{cpu="0",mode="system"} 20
node_cpu_seconds_total{cpu="1",mode="idle"} 600
node_cpu_seconds_total{cpu="1",mode="iowait"} 200
node_cpu_seconds_total{cpu="1",mode="user"} 200
node_memory_MemTotal_bytes 4.294967296e+09
node_memory_MemAvailable_bytes 1.073741824e+09
node_filesystem_avail_bytes{device="/dev/vda1",fstype="ext4",mountpoint="/"} 2.147483648e+10
node_filesystem_size_bytes{device="/dev/vda1",fstype="ext4",mountpoint="/"} 8.589934592e+10
"#;

fn node_exporter_aggregator(url: &str, shell: ScriptedShell) -> Aggregator {
    Aggregator::new(
        Arc::new(NodeExporterBackend::new(
            reqwest::Client::new(),
            format!("{}/metrics", url),
        )),
        Some(Arc::new(shell)),
        &ServerInfoConfig::default(),
        Some(IDENTITY.into()),
    )
}

#[tokio::test]
async fn node_exporter_metrics_with_ssh_rankings() {
    let mut server = Server::new_async().await;
    let metrics = server
        .mock("GET", "/metrics")
        .with_header("content-type", "text/plain; version=0.0.4")
        .with_body(EXPOSITION)
        .create_async()
        .await;
    let shell = healthy_host();
    let log = shell.log.clone();

    let stats = node_exporter_aggregator(&server.url(), shell)
        .collect()
        .await
        .unwrap();
    metrics.assert_async().await;

    // 1500 idle of 2000 seconds
    assert_eq!(stats.resources.cpu, Some(25.0));
    let memory = stats.resources.memory.unwrap();
    assert_eq!(memory.used, 3.0 * GIB);
    assert_eq!(memory.total, 4.0 * GIB);
    let disk = stats.resources.disk.unwrap();
    assert_eq!(disk.used, 60.0 * GIB);
    assert_eq!(disk.total, 80.0 * GIB);
    assert_eq!(stats.server.description, "Monitored by node_exporter");

    let top = stats.top_processes.unwrap();
    // 50% of 4 GiB beats every container.
    assert_eq!(top.memory[0].name, "php-fpm: pool www");
    assert_eq!(top.memory[0].value, 2.0 * GIB);
    assert_eq!(top.memory[0].origin, ProcessOrigin::Host);
    assert_eq!(top.disk[0].name, "🐳 db");
    assert!(top.cpu.iter().all(|e| !e.name.starts_with("ps ")));

    let executed = log.executed();
    assert!(!executed.iter().any(|c| c == commands::TOP_CPU));
    assert!(executed.iter().any(|c| c == commands::PS_BY_MEM));
    assert_eq!(log.opened(), 1);
    assert_eq!(log.closed(), 1);
}

#[tokio::test]
async fn node_exporter_http_failure_still_closes_session() {
    let mut server = Server::new_async().await;
    let _metrics = server
        .mock("GET", "/metrics")
        .with_status(500)
        .create_async()
        .await;
    let shell = healthy_host();
    let log = shell.log.clone();

    let err = node_exporter_aggregator(&server.url(), shell)
        .collect()
        .await
        .unwrap_err();
    assert!(matches!(err, StatsError::Upstream { .. }));
    assert!(err.to_string().contains("node_exporter"));
    assert_eq!(log.opened(), 1);
    assert_eq!(log.closed(), 1);
}
