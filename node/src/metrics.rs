//! Prometheus metrics for the dagnet node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] so several nodes can run in
//! one process (tests do) without clashing on metric names.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use dagnet_ledger::ErrorKind;

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Transactions written to the store, cascaded orphans included.
    pub transactions_admitted: IntCounter,
    pub transactions_deferred: IntCounter,
    /// Rejections, labelled by error kind.
    pub transactions_rejected: IntCounterVec,
    /// Inbound frames dropped before admission, labelled by reason.
    pub frames_dropped: IntCounterVec,
    pub orphans_expired: IntCounter,
    /// Orphans pushed out by the capacity or per-source quota.
    pub orphans_evicted: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub orphan_count: IntGauge,
    pub transaction_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Validate-and-commit time for one submission, in milliseconds.
    pub admission_latency_ms: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let transactions_admitted = register_int_counter_with_registry!(
            Opts::new("dagnet_transactions_admitted_total", "Transactions admitted into the store"),
            registry
        )?;
        let transactions_deferred = register_int_counter_with_registry!(
            Opts::new(
                "dagnet_transactions_deferred_total",
                "Transactions deferred while waiting for parents"
            ),
            registry
        )?;
        let transactions_rejected = register_int_counter_vec_with_registry!(
            Opts::new("dagnet_transactions_rejected_total", "Transactions rejected by admission"),
            &["kind"],
            registry
        )?;
        let frames_dropped = register_int_counter_vec_with_registry!(
            Opts::new("dagnet_frames_dropped_total", "Inbound frames dropped before admission"),
            &["reason"],
            registry
        )?;
        let orphans_expired = register_int_counter_with_registry!(
            Opts::new("dagnet_orphans_expired_total", "Orphans dropped after their TTL"),
            registry
        )?;
        let orphans_evicted = register_int_counter_with_registry!(
            Opts::new("dagnet_orphans_evicted_total", "Orphans evicted to respect pool bounds"),
            registry
        )?;

        let orphan_count = register_int_gauge_with_registry!(
            Opts::new("dagnet_orphan_count", "Orphans currently waiting for parents"),
            registry
        )?;
        let transaction_count = register_int_gauge_with_registry!(
            Opts::new("dagnet_transaction_count", "Transactions in the store"),
            registry
        )?;

        // 0.1 ms → ~1.6 s
        let admission_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "dagnet_admission_latency_ms",
                "Admission time per submission in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.1, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            transactions_admitted,
            transactions_deferred,
            transactions_rejected,
            frames_dropped,
            orphans_expired,
            orphans_evicted,
            orphan_count,
            transaction_count,
            admission_latency_ms,
        })
    }

    pub fn record_rejection(&self, kind: ErrorKind) {
        self.transactions_rejected
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn record_drop(&self, reason: &str) {
        self.frames_dropped.with_label_values(&[reason]).inc();
    }

    /// Prometheus text exposition of every metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
