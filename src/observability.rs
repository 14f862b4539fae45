use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: availability queries answered. Labels: view, status.
pub const QUERIES_TOTAL: &str = "slotgrid_queries_total";

/// Histogram: query latency in seconds. Labels: view.
pub const QUERY_DURATION_SECONDS: &str = "slotgrid_query_duration_seconds";

// ── Data quality and writes ─────────────────────────────────────

/// Counter: store records skipped because they could not be mapped.
pub const MALFORMED_RECORDS_TOTAL: &str = "slotgrid_malformed_records_total";

/// Counter: write-path outcomes. Labels: status (committed, rejected).
pub const COMMITS_TOTAL: &str = "slotgrid_commits_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
