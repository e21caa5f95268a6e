use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub fn setup_metrics_recorder() -> PrometheusHandle {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("batch_processing_seconds".to_string()),
            EXPONENTIAL_SECONDS,
        )
        .expect("static bucket configuration is valid")
        .install_recorder()
        .expect("metrics recorder installs once at startup")
}

/// Records one successfully applied batch.
pub fn record_batch(chain_id: u64, logs: usize, transfers: usize, duration_ms: u64) {
    let chain = chain_id.to_string();
    metrics::increment_counter!("batches_processed_total", "chain" => chain.clone());
    metrics::counter!("logs_fetched_total", logs as u64, "chain" => chain.clone());
    metrics::counter!("transfers_indexed_total", transfers as u64, "chain" => chain.clone());
    metrics::histogram!(
        "batch_processing_seconds",
        duration_ms as f64 / 1000.0,
        "chain" => chain
    );
}

/// Highest block applied for any token on the chain.
pub fn record_cursor(chain_id: u64, to_block: u64) {
    metrics::gauge!("indexer_cursor_block", to_block as f64, "chain" => chain_id.to_string());
}

/// Confirmed tip the poller is chasing.
pub fn record_chain_tip(chain_id: u64, tip: u64) {
    metrics::gauge!("chain_tip_block", tip as f64, "chain" => chain_id.to_string());
}
