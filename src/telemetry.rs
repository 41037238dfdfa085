use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins over
/// `default_filter` so operators can re-scope logging without a restart
/// flag.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

/// Expose collector gauges/counters over HTTP when the `metrics-exporter`
/// feature is enabled; port comes from `LIQTRACK_METRICS_PORT` (default
/// 9000).
#[cfg(feature = "metrics-exporter")]
pub fn init_metrics() {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let port = std::env::var("LIQTRACK_METRICS_PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(9000u16);

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .expect("prometheus exporter install");

    metrics::gauge!("liqtrack_up").set(1.0);
}

#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics() { /* no-op */ }
