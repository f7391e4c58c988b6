//! Metrics and tracing helpers
//!
//! With the `metrics` feature, query and materialization counters are recorded
//! through OpenTelemetry and exported into a Prometheus registry. With the
//! `tracing` feature, [`tracing_helpers`] provides the spans entered around
//! query execution and graph materialization.

#[cfg(feature = "metrics")]
pub use self::prometheus_metrics::{LifelineMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use crate::materialize::MaterializeStats;
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Registry, TextEncoder};

    pub static METRICS: Lazy<LifelineMetrics> = Lazy::new(LifelineMetrics::init);

    pub struct LifelineMetrics {
        registry: Registry,
        _provider: SdkMeterProvider,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub rows_materialized: Counter<u64>,
        pub duplicate_instances: Counter<u64>,
        pub binds_total: Counter<u64>,
    }

    impl LifelineMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
                .expect("failed to build prometheus exporter");
            let provider = SdkMeterProvider::builder().with_reader(exporter).build();
            let meter = provider.meter("lifeline");

            let queries_total = meter
                .u64_counter("lifeline_queries_total")
                .with_description("Total queries executed")
                .build();

            let query_errors_total = meter
                .u64_counter("lifeline_query_errors_total")
                .with_description("Total queries that returned an error")
                .build();

            let query_duration = meter
                .f64_histogram("lifeline_query_duration_seconds")
                .with_description("Duration of queries")
                .build();

            let rows_materialized = meter
                .u64_counter("lifeline_rows_materialized_total")
                .with_description("Joined result rows fed through the graph builder")
                .build();

            let duplicate_instances = meter
                .u64_counter("lifeline_duplicate_instances_total")
                .with_description("Row instances collapsed into an already known entity")
                .build();

            let binds_total = meter
                .u64_counter("lifeline_binds_total")
                .with_description("Navigation properties assigned or appended")
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_errors_total,
                query_duration,
                rows_materialized,
                duplicate_instances,
                binds_total,
            }
        }

        pub fn record_query_duration(&self, elapsed: std::time::Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_materialization(&self, stats: &MaterializeStats) {
            self.rows_materialized.add(stats.rows, &[]);
            self.duplicate_instances.add(stats.duplicates, &[]);
            self.binds_total.add(stats.binds, &[]);
        }

        /// Prometheus text exposition of everything recorded so far
        pub fn render(&self) -> Result<String, prometheus::Error> {
            TextEncoder::new().encode_to_string(&self.registry.gather())
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    /// Span around a single statement sent through a `LifeExecutor`
    pub fn execute_query_span(query: &str) -> Span {
        info_span!("lifeline.execute_query", db.statement = %query)
    }

    /// Span around feeding a result set through the graph builder
    pub fn materialize_span(lanes: usize) -> Span {
        info_span!("lifeline.materialize", lanes)
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;
    use crate::materialize::MaterializeStats;

    #[test]
    fn test_record_materialization_renders() {
        let stats = MaterializeStats {
            rows: 3,
            duplicates: 2,
            binds: 4,
            ..Default::default()
        };
        METRICS.record_materialization(&stats);
        METRICS.record_query_duration(std::time::Duration::from_millis(5));

        let text = METRICS.render().unwrap();
        assert!(text.contains("lifeline_rows_materialized"));
    }
}
