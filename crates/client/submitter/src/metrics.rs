use bc_analytics::{
    register_counter_metric_instrument, register_gauge_metric_instrument, register_histogram_metric_instrument,
};
use opentelemetry::metrics::{Counter, Gauge, Histogram};
use opentelemetry::{global, InstrumentationScope, KeyValue};

pub struct SubmitterMetrics {
    pub boop_submitted_counter: Counter<u64>,
    pub boop_rejected_counter: Counter<u64>,
    pub simulation_cache_hit_counter: Counter<u64>,
    pub simulation_cache_miss_counter: Counter<u64>,
    pub boop_buffered_current: Gauge<u64>,
    pub admission_wait_time: Histogram<f64>,
}

impl SubmitterMetrics {
    pub fn register() -> Self {
        // Register meter
        let meter = global::meter_with_scope(
            InstrumentationScope::builder("crates.submitter.opentelemetry")
                .with_attributes([KeyValue::new("crate", "submitter")])
                .build(),
        );

        let boop_submitted_counter = register_counter_metric_instrument(
            &meter,
            "boop_submitted_count".to_string(),
            "A counter to show boops sent on-chain".to_string(),
            "boop".to_string(),
        );
        let boop_rejected_counter = register_counter_metric_instrument(
            &meter,
            "boop_rejected_count".to_string(),
            "A counter to show rejected boops, by status".to_string(),
            "boop".to_string(),
        );
        let simulation_cache_hit_counter = register_counter_metric_instrument(
            &meter,
            "simulation_cache_hit_count".to_string(),
            "Simulations served from the cache".to_string(),
            "simulation".to_string(),
        );
        let simulation_cache_miss_counter = register_counter_metric_instrument(
            &meter,
            "simulation_cache_miss_count".to_string(),
            "Simulations that required a call to the entry point".to_string(),
            "simulation".to_string(),
        );
        let boop_buffered_current = register_gauge_metric_instrument(
            &meter,
            "boop_buffered_current".to_string(),
            "Current number of boops waiting on their preceding nonces".to_string(),
            "boop".to_string(),
        );
        let admission_wait_time = register_histogram_metric_instrument(
            &meter,
            "boop_admission_wait_seconds".to_string(),
            "Time spent by boops in the buffer before being released".to_string(),
            "s".to_string(),
        );

        Self {
            boop_submitted_counter,
            boop_rejected_counter,
            simulation_cache_hit_counter,
            simulation_cache_miss_counter,
            boop_buffered_current,
            admission_wait_time,
        }
    }

    pub fn record_rejection(&self, status: &'static str) {
        self.boop_rejected_counter.add(1, &[KeyValue::new("status", status)]);
    }

    pub fn record_buffered(&self, buffered: usize) {
        self.boop_buffered_current.record(buffered as u64, &[]);
    }
}
