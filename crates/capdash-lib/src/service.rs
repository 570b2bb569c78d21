//! Capacity service
//!
//! Owns the current approval set and drives inventory fetching and
//! reconciliation, memoising the resulting [`CapacityReport`] in a
//! [`ReportStore`]. Reads go to the cache first; a miss recomputes and
//! writes through. Re-syncing approvals invalidates the cached report.

use crate::accounts::AccountDirectory;
use crate::classify::ProfileClassifier;
use crate::ingest::{ApprovalIngestor, IngestReport, RawApprovalRow};
use crate::inventory::{InventoryAggregator, InventoryFetcher};
use crate::models::ApprovalRecord;
use crate::normalize::NameNormalizer;
use crate::observability::{ReconcileLogger, ReconcileMetrics};
use crate::reconcile::CapacityReport;
use crate::store::ReportStore;
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Store key of the memoised report
pub const REPORT_CACHE_KEY: &str = "capacity_report";

/// Default lifetime of a cached report
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Approval records plus a counter bumped on every sync
#[derive(Default)]
struct ApprovalSet {
    records: Vec<ApprovalRecord>,
    generation: u64,
}

pub struct CapacityService {
    normalizer: NameNormalizer,
    classifier: ProfileClassifier,
    directory: AccountDirectory,
    approvals: RwLock<ApprovalSet>,
    fetcher: InventoryFetcher,
    store: Arc<dyn ReportStore>,
    cache_ttl: Duration,
    metrics: ReconcileMetrics,
    logger: ReconcileLogger,
}

impl CapacityService {
    pub fn new(
        normalizer: NameNormalizer,
        classifier: ProfileClassifier,
        directory: AccountDirectory,
        fetcher: InventoryFetcher,
        store: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            normalizer,
            classifier,
            directory,
            approvals: RwLock::new(ApprovalSet::default()),
            fetcher,
            store,
            cache_ttl: DEFAULT_CACHE_TTL,
            metrics: ReconcileMetrics::new(),
            logger: ReconcileLogger::new("capacity_service"),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_logger(mut self, logger: ReconcileLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    pub fn classifier(&self) -> &ProfileClassifier {
        &self.classifier
    }

    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    pub fn metrics(&self) -> &ReconcileMetrics {
        &self.metrics
    }

    /// Snapshot of the current approval set
    pub async fn approvals(&self) -> Vec<ApprovalRecord> {
        self.approvals.read().await.records.clone()
    }

    /// Replace the approval set with the records ingested from `rows`.
    ///
    /// The replacement is wholesale even when no row is accepted, so
    /// approvals removed from the source disappear from the next report.
    pub async fn sync_approvals(&self, rows: &[RawApprovalRow]) -> Result<IngestReport> {
        let report = ApprovalIngestor::new(&self.normalizer, &self.classifier)
            .ingest(rows, &self.directory);

        // Invalidated under the write lock; write-through checks the
        // generation under the read lock
        let mut approvals = self.approvals.write().await;
        approvals.records = report.records.clone();
        approvals.generation += 1;
        self.store
            .invalidate(REPORT_CACHE_KEY)
            .await
            .context("Failed to invalidate cached report")?;
        drop(approvals);

        self.metrics
            .record_ingest(report.accepted_rows, report.rejected.len());
        self.logger.log_approvals_synced(&report);

        Ok(report)
    }

    /// Current report, from the cache when fresh
    pub async fn report(&self) -> Result<CapacityReport> {
        if let Some(report) = self.cached_report().await {
            self.metrics.inc_cache_hit();
            debug!("Serving capacity report from cache");
            return Ok(report);
        }
        self.metrics.inc_cache_miss();

        let (report, generation) = self.compute_report().await;

        let encoded = serde_json::to_string(&report).context("Failed to encode capacity report")?;
        let approvals = self.approvals.read().await;
        if approvals.generation != generation {
            debug!("Approvals changed during computation, not caching report");
        } else if let Err(e) = self
            .store
            .set_with_ttl(REPORT_CACHE_KEY, encoded, self.cache_ttl)
            .await
        {
            warn!(error = %e, "Failed to cache capacity report");
        }
        drop(approvals);

        Ok(report)
    }

    /// Drop the cached report and compute a fresh one
    pub async fn refresh(&self) -> Result<CapacityReport> {
        self.store
            .invalidate(REPORT_CACHE_KEY)
            .await
            .context("Failed to invalidate cached report")?;
        self.report().await
    }

    async fn cached_report(&self) -> Option<CapacityReport> {
        let cached = match self.store.get(REPORT_CACHE_KEY).await {
            Ok(cached) => cached?,
            Err(e) => {
                warn!(error = %e, "Report cache unavailable, recomputing");
                return None;
            }
        };

        match serde_json::from_str(&cached) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cached report");
                None
            }
        }
    }

    /// Build a report, returning it with the approval generation it used
    async fn compute_report(&self) -> (CapacityReport, u64) {
        let start = Instant::now();

        let (approvals, generation) = {
            let set = self.approvals.read().await;
            (set.records.clone(), set.generation)
        };

        let snapshot = self.fetcher.fetch(self.directory.accounts()).await;
        for failure in &snapshot.failures {
            self.logger.log_account_fetch_failed(failure);
        }

        let clusters =
            InventoryAggregator::new(&self.normalizer, &self.classifier).aggregate(&snapshot.clusters);
        for cluster in clusters.iter().filter(|c| c.degraded) {
            self.logger
                .log_cluster_degraded(cluster.account.as_str(), &cluster.cluster_id);
        }

        let report = CapacityReport::build(
            self.directory.keys(),
            &approvals,
            clusters,
            snapshot.failures,
            Utc::now(),
        );

        let exceeded: Vec<_> = report.exceeded_regions().collect();
        for record in &exceeded {
            self.logger.log_region_exceeded(record);
        }

        let elapsed = start.elapsed().as_secs_f64();
        let cluster_count = report.clusters().count();
        self.metrics.record_inventory(
            cluster_count,
            report.degraded_clusters(),
            report.failures.len(),
        );
        self.metrics.set_exceeded_regions(exceeded.len());
        self.metrics.observe_reconcile_latency(elapsed);
        self.logger
            .log_report_computed(report.accounts.len(), cluster_count, exceeded.len(), elapsed);

        (report, generation)
    }
}
