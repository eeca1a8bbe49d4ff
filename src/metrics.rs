use std::path::Path;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and register the run's metrics.
/// `PrometheusHandle::render()` produces the text exposition payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))?;

    // Pre-register counters so they appear even before the first increment.
    counter!("http_requests_total").absolute(0);
    counter!("http_retries_total").absolute(0);
    counter!("snapshots_completed_total").absolute(0);
    counter!("snapshots_failed_total").absolute(0);
    counter!("price_fallbacks_total", "kind" => "stablecoin_peg").absolute(0);
    counter!("price_fallbacks_total", "kind" => "secondary").absolute(0);
    counter!("price_fallbacks_total", "kind" => "policy_default").absolute(0);
    counter!("price_fallbacks_total", "kind" => "unavailable").absolute(0);

    gauge!("snapshot_total_usd_value").set(0.0);

    histogram!("snapshot_duration_seconds").record(0.0);

    Ok(handle)
}

/// Write the rendered exposition text to `path`, node-exporter textfile style.
/// Written to a sibling temp file first so a collector never reads a partial file.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, handle.render())?;
    std::fs::rename(&tmp, path)
}
