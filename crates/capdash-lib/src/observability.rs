//! Observability infrastructure for capacity reconciliation
//!
//! Provides:
//! - Prometheus metrics (ingest counts, inventory health, cache efficiency, latency)
//! - Structured logging of significant reconciliation events with tracing

use crate::ingest::IngestReport;
use crate::inventory::AccountFailure;
use crate::models::ComparisonRecord;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for reconciliation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ReconcileMetricsInner> = OnceLock::new();

struct ReconcileMetricsInner {
    approval_rows: IntCounterVec,
    clusters_classified: IntCounter,
    clusters_degraded: IntCounter,
    account_failures: IntCounter,
    cache_requests: IntCounterVec,
    exceeded_regions: IntGauge,
    reconcile_latency_seconds: Histogram,
}

impl ReconcileMetricsInner {
    fn new() -> Self {
        Self {
            approval_rows: register_int_counter_vec!(
                "capdash_approval_rows_total",
                "Approval rows ingested, by outcome",
                &["outcome"]
            )
            .expect("Failed to register approval_rows"),

            clusters_classified: register_int_counter!(
                "capdash_clusters_classified_total",
                "Live clusters classified into a profile"
            )
            .expect("Failed to register clusters_classified"),

            clusters_degraded: register_int_counter!(
                "capdash_clusters_degraded_total",
                "Clusters counted without pool detail"
            )
            .expect("Failed to register clusters_degraded"),

            account_failures: register_int_counter!(
                "capdash_inventory_account_failures_total",
                "Accounts whose cluster listing failed"
            )
            .expect("Failed to register account_failures"),

            cache_requests: register_int_counter_vec!(
                "capdash_report_cache_requests_total",
                "Report cache lookups, by result",
                &["result"]
            )
            .expect("Failed to register cache_requests"),

            exceeded_regions: register_int_gauge!(
                "capdash_exceeded_regions",
                "Regions whose live capacity exceeds approval in the latest report"
            )
            .expect("Failed to register exceeded_regions"),

            reconcile_latency_seconds: register_histogram!(
                "capdash_reconcile_latency_seconds",
                "Time spent fetching inventory and reconciling",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register reconcile_latency_seconds"),
        }
    }
}

/// Handle to the global reconciliation metrics. Clones share the same metrics.
#[derive(Clone)]
pub struct ReconcileMetrics {
    _private: (),
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcileMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ReconcileMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ReconcileMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn record_ingest(&self, accepted: usize, rejected: usize) {
        let rows = &self.inner().approval_rows;
        rows.with_label_values(&["accepted"]).inc_by(accepted as u64);
        rows.with_label_values(&["rejected"]).inc_by(rejected as u64);
    }

    pub fn record_inventory(&self, classified: usize, degraded: usize, failed_accounts: usize) {
        let inner = self.inner();
        inner.clusters_classified.inc_by(classified as u64);
        inner.clusters_degraded.inc_by(degraded as u64);
        inner.account_failures.inc_by(failed_accounts as u64);
    }

    pub fn inc_cache_hit(&self) {
        self.inner().cache_requests.with_label_values(&["hit"]).inc();
    }

    pub fn inc_cache_miss(&self) {
        self.inner().cache_requests.with_label_values(&["miss"]).inc();
    }

    pub fn set_exceeded_regions(&self, count: usize) {
        self.inner().exceeded_regions.set(count as i64);
    }

    pub fn observe_reconcile_latency(&self, duration_secs: f64) {
        self.inner().reconcile_latency_seconds.observe(duration_secs);
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for reconciliation events
#[derive(Clone)]
pub struct ReconcileLogger {
    source: String,
}

impl ReconcileLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn log_approvals_synced(&self, report: &IngestReport) {
        info!(
            event = "approvals_synced",
            source = %self.source,
            records = report.records.len(),
            accepted_rows = report.accepted_rows,
            rejected_rows = report.rejected.len(),
            "Approval set replaced"
        );
        for rejected in &report.rejected {
            info!(
                event = "row_rejected",
                source = %self.source,
                row = rejected.row,
                account = ?rejected.account,
                reason = %rejected.reason,
                "Approval row rejected"
            );
        }
    }

    pub fn log_report_computed(&self, accounts: usize, clusters: usize, exceeded: usize, elapsed_secs: f64) {
        info!(
            event = "report_computed",
            source = %self.source,
            accounts = accounts,
            clusters = clusters,
            exceeded_regions = exceeded,
            elapsed_secs = elapsed_secs,
            "Capacity report computed"
        );
    }

    pub fn log_region_exceeded(&self, record: &ComparisonRecord) {
        warn!(
            event = "region_exceeded",
            source = %self.source,
            account = %record.account,
            region = %record.region,
            year = record.year,
            approved = record.total.total(),
            current = record.current.total(),
            "Live capacity exceeds approval"
        );
    }

    pub fn log_account_fetch_failed(&self, failure: &AccountFailure) {
        warn!(
            event = "account_fetch_failed",
            source = %self.source,
            account = %failure.account,
            error = %failure.error,
            "Account inventory unavailable, reporting it empty"
        );
    }

    pub fn log_cluster_degraded(&self, account: &str, cluster_id: &str) {
        warn!(
            event = "cluster_degraded",
            source = %self.source,
            account = %account,
            cluster_id = %cluster_id,
            "Cluster counted as D without pool detail"
        );
    }
}
