use tracing_subscriber::EnvFilter;

use crate::engine::messages::MessageType;
use crate::engine::types::ApplyOutcome;

/// Filter used when neither `RUST_LOG` nor the configured filter parses.
const FALLBACK_FILTER: &str = "warn,binlob=info";

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| configured_filter(default_filter));

    // A subscriber set earlier (tests, embedding apps) stays in place.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

fn configured_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|e| {
        eprintln!("invalid log filter {directives:?} ({e}), using {FALLBACK_FILTER:?}");
        EnvFilter::new(FALLBACK_FILTER)
    })
}

#[cfg(feature = "metrics-exporter")]
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;

    tracing::info!(port, "Prometheus exporter listening on /metrics");
    metrics::gauge!("binlob_up").set(1.0);
    Ok(())
}

#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics(_port: u16) -> anyhow::Result<()> {
    Ok(())
}

fn kind_label(kind: MessageType) -> &'static str {
    match kind {
        MessageType::Snapshot => "snapshot",
        MessageType::Delta => "delta",
        MessageType::Trade => "trade",
        MessageType::Unknown => "unknown",
    }
}

fn outcome_label(outcome: &ApplyOutcome) -> &'static str {
    match outcome {
        ApplyOutcome::Applied | ApplyOutcome::Snapshot(_) => "applied",
        ApplyOutcome::Ignored(_) => "ignored",
        ApplyOutcome::Clamped { .. } => "clamped",
        ApplyOutcome::Saturated { .. } => "saturated",
    }
}

/// Counts one book update by message kind and outcome.
pub fn record_apply(kind: MessageType, outcome: &ApplyOutcome) {
    metrics::counter!(
        "binlob_updates_total",
        "kind" => kind_label(kind),
        "outcome" => outcome_label(outcome)
    )
    .increment(1);

    if let ApplyOutcome::Snapshot(stats) = outcome {
        if stats.dropped > 0 {
            metrics::counter!("binlob_snapshot_levels_dropped_total").increment(stats.dropped as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::{Layer, Registry};

    fn hint(filter: &EnvFilter) -> Option<LevelFilter> {
        Layer::<Registry>::max_level_hint(filter)
    }

    #[test]
    fn test_configured_filter_is_used_when_valid() {
        assert_eq!(hint(&configured_filter("debug")), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_bad_filter_falls_back() {
        assert_eq!(hint(&configured_filter("binlob=loud")), Some(LevelFilter::INFO));
    }
}
