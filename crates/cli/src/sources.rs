//! File-backed data sources: approval sheets and offline inventory snapshots

use anyhow::{Context, Result};
use async_trait::async_trait;
use capdash_lib::{Account, ClusterSummary, InventoryProvider, NodePool, RawApprovalRow};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// Read an approval sheet exported as CSV.
///
/// Headers are required and matched case-insensitively; unknown columns are
/// ignored, blank cells become `None` and fully blank lines are skipped.
/// Cells are decoded lossily and a record the reader rejects is skipped with
/// a warning; only an unreadable header fails the sheet.
pub fn read_approvals(path: &Path) -> Result<Vec<RawApprovalRow>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open approval sheet {}", path.display()))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read approval sheet header")?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (index, record) in reader.byte_records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), line = index + 2, error = %e, "Skipping malformed approval row");
                skipped += 1;
                continue;
            }
        };

        let mut row = RawApprovalRow::default();
        for (header, value) in headers.iter().zip(record.iter()) {
            let value = String::from_utf8_lossy(value).trim().to_string();
            let value = Some(value).filter(|v| !v.is_empty());
            match header.as_str() {
                "account" => row.account = value,
                "region" => row.region = value,
                "year" => row.year = value,
                "profile" => row.profile = value,
                "memory" => row.memory = value,
                "nodes" => row.nodes = value,
                "color" | "colour" => row.color = value,
                _ => {}
            }
        }

        if row == RawApprovalRow::default() {
            continue;
        }
        rows.push(row);
    }

    debug!(path = %path.display(), rows = rows.len(), skipped, "Read approval sheet");
    Ok(rows)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ClusterId {
    Number(u64),
    Text(String),
}

impl ClusterId {
    fn into_string(self) -> String {
        match self {
            ClusterId::Number(n) => n.to_string(),
            ClusterId::Text(s) => s,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SnapshotCluster {
    id: ClusterId,
    #[serde(default)]
    label: String,
    region: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    pools: Vec<NodePool>,
    /// Simulates a pool fetch that failed
    #[serde(default)]
    pools_error: Option<String>,
}

struct SnapshotEntry {
    summary: ClusterSummary,
    pools: std::result::Result<Vec<NodePool>, String>,
}

/// Inventory served from a JSON snapshot instead of the live API.
///
/// The file maps account names to their clusters; accounts are matched by
/// name, not by canonical key. A cluster carrying `pools_error` fails its
/// pool fetch with that message.
pub struct SnapshotProvider {
    accounts: Vec<(String, Vec<SnapshotEntry>)>,
}

impl SnapshotProvider {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open inventory snapshot {}", path.display()))?;
        let raw: BTreeMap<String, Vec<SnapshotCluster>> = serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse inventory snapshot {}", path.display()))?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: BTreeMap<String, Vec<SnapshotCluster>>) -> Self {
        let mut accounts = Vec::new();

        for (name, entries) in raw {
            let converted = entries.into_iter().map(|c| SnapshotEntry {
                summary: ClusterSummary {
                    id: c.id.into_string(),
                    label: c.label,
                    region: c.region,
                    status: c.status,
                    created: c.created,
                },
                pools: match c.pools_error {
                    Some(message) => Err(message),
                    None => Ok(c.pools),
                },
            });
            accounts.push((name, converted.collect()));
        }

        Self { accounts }
    }

    /// Account names as written in the snapshot
    pub fn account_names(&self) -> Vec<String> {
        self.accounts.iter().map(|(name, _)| name.clone()).collect()
    }

    fn entries(&self, account: &Account) -> Option<&[SnapshotEntry]> {
        self.accounts
            .iter()
            .find(|(name, _)| account.has_name(name))
            .map(|(_, entries)| entries.as_slice())
    }
}

#[async_trait]
impl InventoryProvider for SnapshotProvider {
    async fn list_clusters(&self, account: &Account) -> Result<Vec<ClusterSummary>> {
        Ok(self
            .entries(account)
            .map(|entries| entries.iter().map(|e| e.summary.clone()).collect())
            .unwrap_or_default())
    }

    async fn list_pools(&self, account: &Account, cluster_id: &str) -> Result<Vec<NodePool>> {
        let entry = self
            .entries(account)
            .and_then(|entries| entries.iter().find(|e| e.summary.id == cluster_id))
            .with_context(|| format!("Cluster {} not in snapshot", cluster_id))?;

        match &entry.pools {
            Ok(pools) => Ok(pools.clone()),
            Err(message) => anyhow::bail!("{}", message),
        }
    }
}
