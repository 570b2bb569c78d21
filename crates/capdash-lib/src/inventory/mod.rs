//! Live cluster inventory
//!
//! This module provides:
//! - The [`InventoryProvider`] seam to the cloud API
//! - Concurrent per-account and per-cluster fetching with isolated failures
//! - Aggregation of raw clusters into classified [`ClusterRecord`]s

mod fetch;

pub use fetch::{AccountFailure, InventoryFetcher, InventoryProvider, InventorySnapshot};

use crate::classify::ProfileClassifier;
use crate::error::InventoryError;
use crate::models::{AccountKey, ClusterRecord, NodePool, ProfileTag};
use crate::normalize::NameNormalizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Cluster listing entry as reported by the cloud API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: String,
    pub label: String,
    /// Region slug or label
    pub region: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created: Option<String>,
}

/// Pool detail for a cluster, fetched independently of its listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolDetail {
    Fetched(Vec<NodePool>),
    Failed(InventoryError),
}

/// A cluster with whatever pool detail could be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCluster {
    pub summary: ClusterSummary,
    pub pools: PoolDetail,
}

impl RawCluster {
    pub fn new(summary: ClusterSummary, pools: Vec<NodePool>) -> Self {
        Self {
            summary,
            pools: PoolDetail::Fetched(pools),
        }
    }

    pub fn degraded(summary: ClusterSummary, error: InventoryError) -> Self {
        Self {
            summary,
            pools: PoolDetail::Failed(error),
        }
    }
}

/// Converts raw per-account clusters into [`ClusterRecord`]s
pub struct InventoryAggregator<'a> {
    normalizer: &'a NameNormalizer,
    classifier: &'a ProfileClassifier,
}

impl<'a> InventoryAggregator<'a> {
    pub fn new(normalizer: &'a NameNormalizer, classifier: &'a ProfileClassifier) -> Self {
        Self {
            normalizer,
            classifier,
        }
    }

    /// One record per cluster; clusters without pool detail are kept as
    /// degraded `D` clusters with no nodes.
    pub fn aggregate(&self, inventory: &BTreeMap<AccountKey, Vec<RawCluster>>) -> Vec<ClusterRecord> {
        inventory
            .iter()
            .flat_map(|(account, clusters)| {
                clusters
                    .iter()
                    .map(move |cluster| self.classify(account, cluster))
            })
            .collect()
    }

    fn classify(&self, account: &AccountKey, cluster: &RawCluster) -> ClusterRecord {
        let summary = &cluster.summary;
        let region = self.normalizer.normalize_region(&summary.region);

        let (profile, node_count, max_memory_gb, degraded) = match &cluster.pools {
            PoolDetail::Fetched(pools) => {
                let classified = self.classifier.classify_cluster(pools);
                (classified.profile, classified.node_count, classified.max_memory_gb, false)
            }
            PoolDetail::Failed(error) => {
                debug!(
                    account = %account,
                    cluster_id = %summary.id,
                    error = %error,
                    "Counting cluster without pool detail as degraded"
                );
                (ProfileTag::D, 0, 0, true)
            }
        };

        ClusterRecord {
            account: account.clone(),
            region,
            profile,
            node_count,
            cluster_id: summary.id.clone(),
            label: summary.label.clone(),
            status: summary.status.clone(),
            created: summary.created.clone(),
            max_memory_gb,
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, region: &str) -> ClusterSummary {
        ClusterSummary {
            id: id.to_string(),
            label: format!("cluster-{}", id),
            region: region.to_string(),
            status: "ready".to_string(),
            created: Some("2025-01-01T00:00:00".to_string()),
        }
    }

    fn aggregate(inventory: &BTreeMap<AccountKey, Vec<RawCluster>>) -> Vec<ClusterRecord> {
        let normalizer = NameNormalizer::default();
        let classifier = ProfileClassifier::default();
        InventoryAggregator::new(&normalizer, &classifier).aggregate(inventory)
    }

    fn key(raw: &str) -> AccountKey {
        NameNormalizer::default().normalize_account(raw)
    }

    #[test]
    fn test_one_record_per_cluster() {
        let mut inventory = BTreeMap::new();
        inventory.insert(
            key("acme"),
            vec![
                RawCluster::new(summary("1", "ap-west"), vec![NodePool::new("g6-dedicated-4", 3)]),
                RawCluster::new(summary("2", "ap-west"), vec![NodePool::new("g6-dedicated-4", 3)]),
                RawCluster::new(summary("3", "Mumbai, IN"), vec![NodePool::new("g6-dedicated-4", 8)]),
            ],
        );

        let records = aggregate(&inventory);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.region.as_str() == "mumbai"));
        let profiles: Vec<ProfileTag> = records.iter().map(|r| r.profile).collect();
        assert_eq!(profiles, vec![ProfileTag::D, ProfileTag::D, ProfileTag::Dha]);
        assert_eq!(records[2].node_count, 8);
        assert_eq!(records[2].max_memory_gb, 8);
    }

    #[test]
    fn test_failed_pool_fetch_degrades_cluster_only() {
        let mut inventory = BTreeMap::new();
        inventory.insert(
            key("acme"),
            vec![
                RawCluster::degraded(
                    summary("1", "gb-lon"),
                    InventoryError::PoolFetch {
                        cluster_id: "1".to_string(),
                        message: "503".to_string(),
                    },
                ),
                RawCluster::new(summary("2", "gb-lon"), vec![NodePool::new("g6-dedicated-16", 3)]),
            ],
        );
        inventory.insert(
            key("globex"),
            vec![RawCluster::new(summary("9", "eu-west"), vec![NodePool::new("g6-dedicated-8", 20)])],
        );

        let records = aggregate(&inventory);
        assert_eq!(records.len(), 3);

        let degraded = &records[0];
        assert!(degraded.degraded);
        assert_eq!(degraded.profile, ProfileTag::D);
        assert_eq!(degraded.node_count, 0);
        assert_eq!(degraded.region.as_str(), "london_2");

        assert_eq!(records[1].profile, ProfileTag::L);
        assert!(!records[1].degraded);
        assert_eq!(records[2].account.as_str(), "globex");
        assert_eq!(records[2].profile, ProfileTag::M);
        assert_eq!(records[2].region.as_str(), "london");
    }

    #[test]
    fn test_empty_inventory() {
        assert!(aggregate(&BTreeMap::new()).is_empty());

        let mut inventory = BTreeMap::new();
        inventory.insert(key("acme"), Vec::new());
        assert!(aggregate(&inventory).is_empty());
    }

    #[test]
    fn test_cluster_without_pools_is_d() {
        let mut inventory = BTreeMap::new();
        inventory.insert(key("acme"), vec![RawCluster::new(summary("1", "us-east"), Vec::new())]);

        let records = aggregate(&inventory);
        assert_eq!(records[0].profile, ProfileTag::D);
        assert!(!records[0].degraded);
        assert_eq!(records[0].region.as_str(), "newark");
    }
}
