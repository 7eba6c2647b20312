//! # Prometheus Metrics
//!
//! Operational metrics for the store node, scraped at `/metrics` on the
//! configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `cosmo` prefix so they do not collide with any default global
//! registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use cosmo_contracts::ProductStore;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct StoreMetrics {
    registry: Registry,
    /// Committed operations, by operation name.
    pub operations_committed_total: IntCounterVec,
    /// Aborted operations, by operation name and error kind.
    pub operations_aborted_total: IntCounterVec,
    /// Settlement currency currently held in escrow.
    pub escrow_total: IntGauge,
    /// Outstanding reward-token supply.
    pub token_supply: IntGauge,
    /// Records in the event log.
    pub events_total: IntGauge,
    /// Time spent applying and persisting one operation, by operation name.
    pub operation_latency_seconds: HistogramVec,
}

impl StoreMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("cosmo".into()), None)?;

        let operations_committed_total = IntCounterVec::new(
            Opts::new(
                "operations_committed_total",
                "Store operations that committed",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(operations_committed_total.clone()))?;

        let operations_aborted_total = IntCounterVec::new(
            Opts::new(
                "operations_aborted_total",
                "Store operations that aborted with no effect",
            ),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(operations_aborted_total.clone()))?;

        let escrow_total = IntGauge::new("escrow_total", "Settlement currency held in escrow")?;
        registry.register(Box::new(escrow_total.clone()))?;

        let token_supply = IntGauge::new("token_supply", "Outstanding reward-token supply")?;
        registry.register(Box::new(token_supply.clone()))?;

        let events_total = IntGauge::new("events_total", "Records in the event log")?;
        registry.register(Box::new(events_total.clone()))?;

        let operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Latency of applying and persisting a store operation",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            operations_committed_total,
            operations_aborted_total,
            escrow_total,
            token_supply,
            events_total,
            operation_latency_seconds,
        })
    }

    /// Refreshes the gauges from the current ledger state.
    pub fn observe_store(&self, store: &ProductStore) {
        self.escrow_total.set(saturating_i64(store.escrow_total()));
        self.token_supply.set(saturating_i64(store.token_supply()));
        self.events_total.set(saturating_i64(store.events().len() as u64));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<StoreMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmo_contracts::StoreConfig;
    use cosmo_protocol::Principal;

    #[test]
    fn gauges_track_store() {
        let owner = Principal::new("deployer").unwrap();
        let config = StoreConfig::new(owner.clone()).with_genesis_wallet(owner.clone(), 1_000);
        let mut store = ProductStore::new(config).unwrap();
        store.add_product(&owner, "Candy", 10, 50).unwrap();
        store.buy_product(&owner, "Candy", 2).unwrap();

        let metrics = StoreMetrics::new().unwrap();
        metrics.observe_store(&store);
        metrics
            .operations_committed_total
            .with_label_values(&["buy_product"])
            .inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains("cosmo_escrow_total 100"));
        assert!(text.contains("cosmo_token_supply 10000"));
        assert!(text.contains("cosmo_operations_committed_total{operation=\"buy_product\"} 1"));
    }
}
