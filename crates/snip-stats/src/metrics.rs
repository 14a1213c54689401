//! Prometheus metrics for snip
//!
//! Counters are exposed in Prometheus text format through [`Metrics::export`].

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use snip_core::Event;
use thiserror::Error;

/// Statistics error types
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Metrics error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics output is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// snip metrics collector
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    /// Outcome events by kind
    pub events_total: IntCounterVec,

    /// Raw document views, split by cache hit
    pub impressions_total: IntCounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, StatsError> {
        let registry = Registry::new();

        let events_total = IntCounterVec::new(
            Opts::new("snip_events_total", "Document events reported"),
            &["event"],
        )?;

        let impressions_total = IntCounterVec::new(
            Opts::new("snip_impressions_total", "Raw document impressions"),
            &["cached"],
        )?;

        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(impressions_total.clone()))?;

        Ok(Self {
            registry,
            events_total,
            impressions_total,
        })
    }

    /// Record an outcome event
    pub fn record_event(&self, event: Event) {
        self.events_total.with_label_values(&[event.as_str()]).inc();
    }

    /// Record a document impression
    pub fn record_impression(&self, cached: bool) {
        let label = if cached { "true" } else { "false" };
        self.impressions_total.with_label_values(&[label]).inc();
    }

    /// Current count for one event kind
    pub fn event_count(&self, event: Event) -> u64 {
        self.events_total.with_label_values(&[event.as_str()]).get()
    }

    /// Total impressions, cached or not
    pub fn impression_count(&self) -> u64 {
        ["true", "false"]
            .into_iter()
            .map(|label| self.impressions_total.with_label_values(&[label]).get())
            .sum()
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String, StatsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
