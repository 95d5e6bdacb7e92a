//! Ledger metrics and tracing helpers.
//!
//! Metrics are exported through OpenTelemetry into a Prometheus registry owned by
//! [`METRICS`]; call [`LedgerMetrics::render`] to produce the text exposition format.

#[cfg(feature = "metrics")]
pub use exporter::{LedgerMetrics, METRICS};

#[cfg(feature = "metrics")]
mod exporter {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use std::time::Duration;

    pub static METRICS: Lazy<LedgerMetrics> = Lazy::new(LedgerMetrics::init);

    pub struct LedgerMetrics {
        registry: prometheus::Registry,
        queries_total: Counter<u64>,
        query_errors_total: Counter<u64>,
        query_duration: Histogram<f64>,
        batches_committed: Counter<u64>,
        rows_committed: Counter<u64>,
        allocations_rejected: Counter<u64>,
        placeholder_fallbacks: Counter<u64>,
        _provider: SdkMeterProvider,
    }

    impl LedgerMetrics {
        pub fn init() -> Self {
            let registry = prometheus::Registry::new();
            let provider = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => SdkMeterProvider::builder().with_reader(exporter).build(),
                Err(e) => {
                    log::warn!("prometheus exporter unavailable, metrics are not exported: {}", e);
                    SdkMeterProvider::builder().build()
                }
            };
            let meter = provider.meter("mill_ledger");

            let queries_total = meter
                .u64_counter("mill_ledger_queries_total")
                .with_description("Total SQL statements executed")
                .build();
            let query_errors_total = meter
                .u64_counter("mill_ledger_query_errors_total")
                .with_description("SQL statements that failed")
                .build();
            let query_duration = meter
                .f64_histogram("mill_ledger_query_duration_seconds")
                .with_description("Duration of SQL statements")
                .build();
            let batches_committed = meter
                .u64_counter("mill_ledger_batches_committed_total")
                .with_description("Bulk DO batches committed")
                .build();
            let rows_committed = meter
                .u64_counter("mill_ledger_rows_committed_total")
                .with_description("DO rows committed through bulk import")
                .build();
            let allocations_rejected = meter
                .u64_counter("mill_ledger_allocations_rejected_total")
                .with_description("DO allocations rejected by reconciliation")
                .build();
            let placeholder_fallbacks = meter
                .u64_counter("mill_ledger_placeholder_fallbacks_total")
                .with_description("Reads answered from a placeholder dataset")
                .build();

            Self {
                registry,
                queries_total,
                query_errors_total,
                query_duration,
                batches_committed,
                rows_committed,
                allocations_rejected,
                placeholder_fallbacks,
                _provider: provider,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_batch_committed(&self, rows: usize) {
            self.batches_committed.add(1, &[]);
            self.rows_committed.add(rows as u64, &[]);
        }

        pub fn record_allocation_rejected(&self, reason: &'static str) {
            self.allocations_rejected
                .add(1, &[KeyValue::new("reason", reason)]);
        }

        pub fn record_placeholder_fallback(&self, dataset: &'static str) {
            self.placeholder_fallbacks
                .add(1, &[KeyValue::new("dataset", dataset)]);
        }

        /// Prometheus text exposition of everything recorded so far.
        pub fn render(&self) -> String {
            let encoder = prometheus::TextEncoder::new();
            encoder
                .encode_to_string(&self.registry.gather())
                .unwrap_or_default()
        }
    }
}

/// Spans around connection, query and transaction boundaries.
#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn acquire_connection_span() -> Span {
        info_span!("mill_ledger.connect")
    }

    pub fn execute_query_span(query: &str) -> Span {
        info_span!("mill_ledger.query", sql = %query)
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("mill_ledger.transaction.begin")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("mill_ledger.transaction.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("mill_ledger.transaction.rollback")
    }

    pub fn bulk_commit_span(rows: usize) -> Span {
        info_span!("mill_ledger.bulk_commit", rows)
    }
}
