//! Concurrent inventory fetching
//!
//! Every account is listed concurrently and every cluster's pools are
//! fetched concurrently under a per-call timeout. A failed account yields an
//! empty cluster list plus an [`AccountFailure`]; a failed pool fetch yields
//! a degraded [`RawCluster`]. Nothing here aborts the batch.

use super::{ClusterSummary, RawCluster};
use crate::accounts::Account;
use crate::error::InventoryError;
use crate::models::{AccountKey, NodePool};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Source of live cluster data for an account
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// List the clusters owned by an account
    async fn list_clusters(&self, account: &Account) -> Result<Vec<ClusterSummary>>;

    /// List the node pools of one cluster
    async fn list_pools(&self, account: &Account, cluster_id: &str) -> Result<Vec<NodePool>>;
}

/// An account whose cluster listing could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFailure {
    pub account: AccountKey,
    pub error: InventoryError,
}

/// Everything fetched in one inventory poll
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    /// Clusters per account; failed accounts map to an empty list
    pub clusters: BTreeMap<AccountKey, Vec<RawCluster>>,
    pub failures: Vec<AccountFailure>,
}

impl InventorySnapshot {
    pub fn cluster_count(&self) -> usize {
        self.clusters.values().map(Vec::len).sum()
    }
}

/// Drives an [`InventoryProvider`] across all accounts
#[derive(Clone)]
pub struct InventoryFetcher {
    provider: Arc<dyn InventoryProvider>,
    timeout: Duration,
}

impl InventoryFetcher {
    pub fn new(provider: Arc<dyn InventoryProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Fetch all accounts concurrently.
    ///
    /// Accounts sharing a canonical key have their clusters merged under
    /// that key, in directory order.
    pub async fn fetch(&self, accounts: &[Account]) -> InventorySnapshot {
        let mut tasks = JoinSet::new();

        for (index, account) in accounts.iter().cloned().enumerate() {
            let provider = Arc::clone(&self.provider);
            let timeout = self.timeout;
            tasks.spawn(async move { (index, fetch_account(provider, &account, timeout).await) });
        }

        let mut results: Vec<Option<Result<Vec<RawCluster>, InventoryError>>> =
            (0..accounts.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "Account fetch task did not complete"),
            }
        }

        let mut snapshot = InventorySnapshot::default();
        for (account, result) in accounts.iter().zip(results) {
            let merged = snapshot.clusters.entry(account.key.clone()).or_default();
            let error = match result {
                Some(Ok(clusters)) => {
                    debug!(account = %account.name, clusters = clusters.len(), "Fetched account inventory");
                    merged.extend(clusters);
                    continue;
                }
                Some(Err(error)) => error,
                // Task panicked or was cancelled
                None => InventoryError::ListClusters {
                    account: account.name.clone(),
                    message: "fetch task aborted".to_string(),
                },
            };
            debug!(account = %account.name, error = %error, "Account inventory unavailable");
            snapshot.failures.push(AccountFailure {
                account: account.key.clone(),
                error,
            });
        }

        snapshot.failures.sort_by(|a, b| a.account.cmp(&b.account));
        snapshot
    }
}

async fn fetch_account(
    provider: Arc<dyn InventoryProvider>,
    account: &Account,
    timeout: Duration,
) -> Result<Vec<RawCluster>, InventoryError> {
    let summaries = with_timeout(
        timeout,
        format!("listing clusters for {}", account.name),
        provider.list_clusters(account),
    )
    .await?
    .map_err(|e| InventoryError::ListClusters {
        account: account.name.clone(),
        message: format!("{:#}", e),
    })?;

    let mut tasks = JoinSet::new();
    for (index, summary) in summaries.iter().cloned().enumerate() {
        let provider = Arc::clone(&provider);
        let account = account.clone();
        tasks.spawn(async move {
            let pools = fetch_pools(provider, &account, &summary.id, timeout).await;
            (index, pools)
        });
    }

    let mut pools: Vec<Option<Result<Vec<NodePool>, InventoryError>>> = vec![None; summaries.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => pools[index] = Some(result),
            Err(e) => warn!(account = %account.name, error = %e, "Pool fetch task did not complete"),
        }
    }

    Ok(summaries
        .into_iter()
        .zip(pools)
        .map(|(summary, result)| match result {
            Some(Ok(pools)) => RawCluster::new(summary, pools),
            Some(Err(error)) => {
                debug!(
                    account = %account.name,
                    cluster_id = %summary.id,
                    error = %error,
                    "Pool detail unavailable"
                );
                RawCluster::degraded(summary, error)
            }
            None => {
                let error = InventoryError::PoolFetch {
                    cluster_id: summary.id.clone(),
                    message: "fetch task aborted".to_string(),
                };
                RawCluster::degraded(summary, error)
            }
        })
        .collect())
}

async fn fetch_pools(
    provider: Arc<dyn InventoryProvider>,
    account: &Account,
    cluster_id: &str,
    timeout: Duration,
) -> Result<Vec<NodePool>, InventoryError> {
    with_timeout(
        timeout,
        format!("fetching pools for cluster {}", cluster_id),
        provider.list_pools(account, cluster_id),
    )
    .await?
    .map_err(|e| InventoryError::PoolFetch {
        cluster_id: cluster_id.to_string(),
        message: format!("{:#}", e),
    })
}

async fn with_timeout<F, T>(timeout: Duration, operation: String, fut: F) -> Result<T, InventoryError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| InventoryError::Timeout {
            operation,
            timeout_secs: timeout.as_secs(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountDirectory;
    use crate::normalize::NameNormalizer;
    use crate::inventory::PoolDetail;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider serving canned data, with configurable failures
    #[derive(Default)]
    struct FakeProvider {
        clusters: HashMap<String, Vec<ClusterSummary>>,
        pools: HashMap<String, Vec<NodePool>>,
        failing_accounts: Vec<String>,
        failing_pools: Vec<String>,
        slow_pools: Vec<String>,
        pool_calls: AtomicUsize,
    }

    #[async_trait]
    impl InventoryProvider for FakeProvider {
        async fn list_clusters(&self, account: &Account) -> Result<Vec<ClusterSummary>> {
            if self.failing_accounts.contains(&account.name) {
                anyhow::bail!("401 Unauthorized");
            }
            Ok(self.clusters.get(&account.name).cloned().unwrap_or_default())
        }

        async fn list_pools(&self, _account: &Account, cluster_id: &str) -> Result<Vec<NodePool>> {
            self.pool_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_pools.iter().any(|id| id == cluster_id) {
                anyhow::bail!("500 Internal Server Error");
            }
            if self.slow_pools.iter().any(|id| id == cluster_id) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(self.pools.get(cluster_id).cloned().unwrap_or_default())
        }
    }

    fn summary(id: &str) -> ClusterSummary {
        ClusterSummary {
            id: id.to_string(),
            label: format!("lke-{}", id),
            region: "ap-west".to_string(),
            status: "ready".to_string(),
            created: None,
        }
    }

    fn directory(names: &[&str]) -> AccountDirectory {
        AccountDirectory::from_entries(&NameNormalizer::default(), names.iter().map(|n| (*n, "token")))
    }

    fn provider() -> FakeProvider {
        let mut provider = FakeProvider::default();
        provider
            .clusters
            .insert("acme".to_string(), vec![summary("1"), summary("2"), summary("3")]);
        provider
            .clusters
            .insert("globex".to_string(), vec![summary("10")]);
        for id in ["1", "2", "3", "10"] {
            provider
                .pools
                .insert(id.to_string(), vec![NodePool::new("g6-dedicated-4", 3)]);
        }
        provider
    }

    #[tokio::test]
    async fn test_fetch_all_accounts() {
        let provider = Arc::new(provider());
        let fetcher = InventoryFetcher::new(provider.clone(), Duration::from_secs(5));
        let accounts = directory(&["acme", "globex"]);

        let snapshot = fetcher.fetch(accounts.accounts()).await;

        assert!(snapshot.failures.is_empty());
        assert_eq!(snapshot.cluster_count(), 4);
        assert_eq!(provider.pool_calls.load(Ordering::SeqCst), 4);

        let acme = &snapshot.clusters[&accounts.accounts()[0].key];
        let ids: Vec<&str> = acme.iter().map(|c| c.summary.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_account_failure_is_isolated() {
        let mut provider = provider();
        provider.failing_accounts.push("globex".to_string());
        let fetcher = InventoryFetcher::new(Arc::new(provider), Duration::from_secs(5));
        let accounts = directory(&["acme", "globex"]);

        let snapshot = fetcher.fetch(accounts.accounts()).await;

        assert_eq!(snapshot.cluster_count(), 3);
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].account.as_str(), "globex");
        assert!(matches!(
            &snapshot.failures[0].error,
            InventoryError::ListClusters { message, .. } if message.contains("401")
        ));
        assert!(snapshot.clusters[&accounts.accounts()[1].key].is_empty());
    }

    #[tokio::test]
    async fn test_pool_failure_degrades_single_cluster() {
        let mut provider = provider();
        provider.failing_pools.push("2".to_string());
        let fetcher = InventoryFetcher::new(Arc::new(provider), Duration::from_secs(5));
        let accounts = directory(&["acme"]);

        let snapshot = fetcher.fetch(accounts.accounts()).await;
        let clusters = &snapshot.clusters[&accounts.accounts()[0].key];

        assert!(snapshot.failures.is_empty());
        assert_eq!(clusters.len(), 3);
        assert!(matches!(clusters[0].pools, PoolDetail::Fetched(_)));
        assert!(matches!(clusters[1].pools, PoolDetail::Failed(InventoryError::PoolFetch { .. })));
        assert!(matches!(clusters[2].pools, PoolDetail::Fetched(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_pool_fetch_times_out() {
        let mut provider = provider();
        provider.slow_pools.push("3".to_string());
        let fetcher = InventoryFetcher::new(Arc::new(provider), Duration::from_secs(2));
        let accounts = directory(&["acme"]);

        let snapshot = fetcher.fetch(accounts.accounts()).await;
        let clusters = &snapshot.clusters[&accounts.accounts()[0].key];

        assert!(matches!(
            clusters[2].pools,
            PoolDetail::Failed(InventoryError::Timeout { timeout_secs: 2, .. })
        ));
        assert!(matches!(clusters[0].pools, PoolDetail::Fetched(_)));
    }

    #[tokio::test]
    async fn test_accounts_sharing_a_key_are_merged() {
        let mut provider = provider();
        provider
            .clusters
            .insert("search-poc".to_string(), vec![summary("20"), summary("21")]);
        provider
            .clusters
            .insert("billing-poc".to_string(), vec![summary("30")]);
        provider.failing_accounts.push("legacy-poc".to_string());
        let fetcher = InventoryFetcher::new(Arc::new(provider), Duration::from_secs(5));
        let accounts = directory(&["search-poc", "billing-poc", "legacy-poc"]);

        let snapshot = fetcher.fetch(accounts.accounts()).await;

        assert_eq!(snapshot.clusters.len(), 1);
        let poc = &snapshot.clusters[&accounts.accounts()[0].key];
        let ids: Vec<&str> = poc.iter().map(|c| c.summary.id.as_str()).collect();
        assert_eq!(ids, vec!["20", "21", "30"]);
        assert_eq!(snapshot.failures.len(), 1);
        assert!(matches!(
            &snapshot.failures[0].error,
            InventoryError::ListClusters { account, .. } if account == "legacy-poc"
        ));
    }

    #[tokio::test]
    async fn test_no_accounts() {
        let fetcher = InventoryFetcher::new(Arc::new(provider()), Duration::from_secs(5));
        let snapshot = fetcher.fetch(&[]).await;
        assert!(snapshot.clusters.is_empty());
        assert!(snapshot.failures.is_empty());
    }
}
