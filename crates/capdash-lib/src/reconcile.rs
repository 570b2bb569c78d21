//! Reconciliation of approved capacity against live clusters
//!
//! Joins approvals and clusters on `(account, region)` using canonical key
//! equality, then derives per-region comparisons and unapproved excess.
//! Everything here is a pure function of its inputs.

use crate::inventory::AccountFailure;
use crate::models::{
    AccountKey, ApprovalRecord, CapacityStatus, ClusterRecord, ComparisonRecord, ProfileCapacity,
    ProfileTag, RegionKey, UnapprovedRecord,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Live cluster counts per `(account, region)`
fn current_capacity(clusters: &[ClusterRecord]) -> HashMap<(&AccountKey, &RegionKey), ProfileCapacity> {
    let mut current: HashMap<(&AccountKey, &RegionKey), ProfileCapacity> = HashMap::new();
    for cluster in clusters {
        current
            .entry((&cluster.account, &cluster.region))
            .or_default()
            .add(cluster.profile, 1);
    }
    current
}

/// One comparison per `(account, region, year)` among the approvals.
///
/// Duplicate approval records for the same key are summed. Output is sorted
/// by account, region and year.
pub fn compare(approvals: &[ApprovalRecord], clusters: &[ClusterRecord]) -> Vec<ComparisonRecord> {
    let mut totals: BTreeMap<(&AccountKey, &RegionKey, i32), ProfileCapacity> = BTreeMap::new();
    for approval in approvals {
        *totals
            .entry((&approval.account, &approval.region, approval.year))
            .or_default() += approval.total_capacity;
    }

    let current = current_capacity(clusters);

    totals
        .into_iter()
        .map(|((account, region, year), total)| {
            let current = current.get(&(account, region)).copied().unwrap_or_default();
            ComparisonRecord {
                account: account.clone(),
                region: region.clone(),
                year,
                total,
                current,
                available: total.saturating_sub(&current),
                status: CapacityStatus::from_totals(&total, &current),
            }
        })
        .collect()
}

/// Live capacity above approval, per `(account, region, profile)`.
///
/// Approvals for the same account and region are summed across years; a
/// region with no approval at all surfaces every live cluster as excess.
pub fn unapproved(approvals: &[ApprovalRecord], clusters: &[ClusterRecord]) -> Vec<UnapprovedRecord> {
    let mut approved: HashMap<(&AccountKey, &RegionKey), ProfileCapacity> = HashMap::new();
    for approval in approvals {
        *approved
            .entry((&approval.account, &approval.region))
            .or_default() += approval.total_capacity;
    }

    let current: BTreeMap<_, _> = current_capacity(clusters).into_iter().collect();

    let mut excess = Vec::new();
    for ((account, region), counts) in current {
        let allowed = approved.get(&(account, region)).copied().unwrap_or_default();
        for (profile, count) in counts.iter() {
            let over = count.saturating_sub(allowed.get(profile));
            if over > 0 {
                excess.push(UnapprovedRecord {
                    account: account.clone(),
                    region: region.clone(),
                    profile,
                    excess_count: over,
                });
            }
        }
    }
    excess
}

/// Reconciled view for a single account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReport {
    pub account: AccountKey,
    /// Sum of every approval for the account
    pub approved_total: ProfileCapacity,
    pub regions: Vec<ComparisonRecord>,
    pub unapproved: Vec<UnapprovedRecord>,
    pub clusters: Vec<ClusterRecord>,
}

impl AccountReport {
    fn empty(account: AccountKey) -> Self {
        Self {
            account,
            approved_total: ProfileCapacity::default(),
            regions: Vec::new(),
            unapproved: Vec::new(),
            clusters: Vec::new(),
        }
    }

    /// Live clusters summed across all regions
    pub fn current_total(&self) -> ProfileCapacity {
        let mut total = ProfileCapacity::default();
        for cluster in &self.clusters {
            total.add(cluster.profile, 1);
        }
        total
    }
}

/// Full reconciliation result, cached and rendered as a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityReport {
    pub generated_at: DateTime<Utc>,
    pub accounts: Vec<AccountReport>,
    /// Accounts whose inventory could not be listed
    #[serde(default)]
    pub failures: Vec<AccountFailure>,
}

impl CapacityReport {
    /// Build the per-account view. Every account in `accounts` appears even
    /// when it has no approvals or clusters.
    pub fn build<'a>(
        accounts: impl IntoIterator<Item = &'a AccountKey>,
        approvals: &[ApprovalRecord],
        clusters: Vec<ClusterRecord>,
        failures: Vec<AccountFailure>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut by_account: BTreeMap<AccountKey, AccountReport> = accounts
            .into_iter()
            .map(|key| (key.clone(), AccountReport::empty(key.clone())))
            .collect();

        fn entry<'m>(
            map: &'m mut BTreeMap<AccountKey, AccountReport>,
            key: &AccountKey,
        ) -> &'m mut AccountReport {
            map.entry(key.clone())
                .or_insert_with(|| AccountReport::empty(key.clone()))
        }

        for approval in approvals {
            entry(&mut by_account, &approval.account).approved_total += approval.total_capacity;
        }
        for record in compare(approvals, &clusters) {
            entry(&mut by_account, &record.account).regions.push(record);
        }
        for record in unapproved(approvals, &clusters) {
            entry(&mut by_account, &record.account).unapproved.push(record);
        }
        for cluster in clusters {
            let account = cluster.account.clone();
            entry(&mut by_account, &account).clusters.push(cluster);
        }

        Self {
            generated_at,
            accounts: by_account.into_values().collect(),
            failures,
        }
    }

    /// Keep only the named accounts; an empty filter keeps everything
    pub fn filter_accounts(mut self, keep: &[AccountKey]) -> Self {
        if keep.is_empty() {
            return self;
        }
        let keep: BTreeSet<&AccountKey> = keep.iter().collect();
        self.accounts.retain(|a| keep.contains(&a.account));
        self.failures.retain(|f| keep.contains(&f.account));
        self
    }

    pub fn comparisons(&self) -> impl Iterator<Item = &ComparisonRecord> {
        self.accounts.iter().flat_map(|a| a.regions.iter())
    }

    pub fn unapproved(&self) -> impl Iterator<Item = &UnapprovedRecord> {
        self.accounts.iter().flat_map(|a| a.unapproved.iter())
    }

    pub fn clusters(&self) -> impl Iterator<Item = &ClusterRecord> {
        self.accounts.iter().flat_map(|a| a.clusters.iter())
    }

    pub fn exceeded_regions(&self) -> impl Iterator<Item = &ComparisonRecord> {
        self.comparisons()
            .filter(|r| r.status == CapacityStatus::Exceeded)
    }

    pub fn degraded_clusters(&self) -> usize {
        self.clusters().filter(|c| c.degraded).count()
    }

    /// Total excess per profile across every account
    pub fn unapproved_totals(&self) -> ProfileCapacity {
        let mut totals = ProfileCapacity::default();
        for record in self.unapproved() {
            totals.add(record.profile, record.excess_count);
        }
        totals
    }
}

/// Whether any profile of the record is over its approval
pub fn has_profile_overage(record: &ComparisonRecord) -> bool {
    ProfileTag::ALL
        .iter()
        .any(|&p| record.current.get(p) > record.total.get(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InventoryError;
    use crate::normalize::NameNormalizer;

    fn key(raw: &str) -> AccountKey {
        NameNormalizer::default().normalize_account(raw)
    }

    fn region(raw: &str) -> RegionKey {
        NameNormalizer::default().normalize_region(raw)
    }

    fn capacity(counts: &[(ProfileTag, u32)]) -> ProfileCapacity {
        let mut capacity = ProfileCapacity::default();
        for &(profile, count) in counts {
            capacity.add(profile, count);
        }
        capacity
    }

    fn approval(account: &str, region_raw: &str, year: i32, counts: &[(ProfileTag, u32)]) -> ApprovalRecord {
        ApprovalRecord {
            account: key(account),
            region: region(region_raw),
            year,
            total_capacity: capacity(counts),
        }
    }

    fn cluster(account: &str, region_raw: &str, id: &str, profile: ProfileTag) -> ClusterRecord {
        ClusterRecord {
            account: key(account),
            region: region(region_raw),
            profile,
            node_count: 3,
            cluster_id: id.to_string(),
            label: format!("lke-{}", id),
            status: "ready".to_string(),
            created: None,
            max_memory_gb: 8,
            degraded: false,
        }
    }

    fn mumbai_scenario() -> (Vec<ApprovalRecord>, Vec<ClusterRecord>) {
        let approvals = vec![approval("acme", "Mumbai, IN", 2025, &[(ProfileTag::D, 2)])];
        let clusters = vec![
            cluster("acme", "mumbai", "1", ProfileTag::D),
            cluster("acme", "Mumbai, IN", "2", ProfileTag::D),
            cluster("acme", "mumbai", "3", ProfileTag::Dha),
        ];
        (approvals, clusters)
    }

    #[test]
    fn test_mumbai_scenario() {
        let (approvals, clusters) = mumbai_scenario();

        let comparisons = compare(&approvals, &clusters);
        assert_eq!(comparisons.len(), 1);
        let record = &comparisons[0];
        assert_eq!(record.region.as_str(), "mumbai");
        assert_eq!(record.current, capacity(&[(ProfileTag::D, 2), (ProfileTag::Dha, 1)]));
        assert_eq!(record.available, ProfileCapacity::default());
        assert_eq!(record.status, CapacityStatus::Exceeded);

        let excess = unapproved(&approvals, &clusters);
        assert_eq!(
            excess,
            vec![UnapprovedRecord {
                account: key("acme"),
                region: region("mumbai"),
                profile: ProfileTag::Dha,
                excess_count: 1,
            }]
        );
    }

    #[test]
    fn test_available_and_status_properties() {
        let approvals = vec![
            approval("acme", "mumbai", 2025, &[(ProfileTag::D, 3), (ProfileTag::L, 1)]),
            approval("acme", "newark", 2025, &[(ProfileTag::S, 2)]),
            approval("acme", "frankfurt", 2025, &[(ProfileTag::M, 1)]),
            approval("globex", "chennai", 2024, &[(ProfileTag::Dha, 1)]),
        ];
        let clusters = vec![
            cluster("acme", "mumbai", "1", ProfileTag::D),
            cluster("acme", "mumbai", "2", ProfileTag::M),
            cluster("acme", "newark", "3", ProfileTag::S),
            cluster("acme", "newark", "4", ProfileTag::S),
            cluster("acme", "frankfurt", "5", ProfileTag::L),
            cluster("acme", "frankfurt", "6", ProfileTag::L),
        ];

        let comparisons = compare(&approvals, &clusters);
        assert_eq!(comparisons.len(), 4);

        for record in &comparisons {
            for profile in ProfileTag::ALL {
                let expected = record.total.get(profile).saturating_sub(record.current.get(profile));
                assert_eq!(record.available.get(profile), expected);
            }
            let (total, current) = (record.total.total(), record.current.total());
            let expected = if current > total {
                CapacityStatus::Exceeded
            } else if current == total {
                CapacityStatus::AtCapacity
            } else {
                CapacityStatus::WithinLimit
            };
            assert_eq!(record.status, expected);
        }

        let by_region: HashMap<&str, CapacityStatus> = comparisons
            .iter()
            .map(|r| (r.region.as_str(), r.status))
            .collect();
        assert_eq!(by_region["mumbai"], CapacityStatus::WithinLimit);
        assert_eq!(by_region["newark"], CapacityStatus::AtCapacity);
        assert_eq!(by_region["frankfurt"], CapacityStatus::Exceeded);
        assert_eq!(by_region["chennai"], CapacityStatus::WithinLimit);
    }

    #[test]
    fn test_status_uses_aggregate_sums() {
        // Over on M, under on D: aggregate still reads within limit
        let approvals = vec![approval("acme", "mumbai", 2025, &[(ProfileTag::D, 3)])];
        let clusters = vec![
            cluster("acme", "mumbai", "1", ProfileTag::M),
            cluster("acme", "mumbai", "2", ProfileTag::M),
        ];

        let record = &compare(&approvals, &clusters)[0];
        assert_eq!(record.status, CapacityStatus::WithinLimit);
        assert!(has_profile_overage(record));
        assert_eq!(unapproved(&approvals, &clusters)[0].excess_count, 2);
    }

    #[test]
    fn test_region_join_uses_key_equality() {
        let approvals = vec![approval("acme", "London, UK", 2025, &[(ProfileTag::D, 1)])];
        let clusters = vec![
            cluster("acme", "London, UK Expansion", "1", ProfileTag::D),
            cluster("acme", "London, UK Expansion", "2", ProfileTag::D),
        ];

        let record = &compare(&approvals, &clusters)[0];
        assert_eq!(record.region.as_str(), "london");
        assert_eq!(record.current.total(), 0);
        assert_eq!(record.status, CapacityStatus::WithinLimit);

        let excess = unapproved(&approvals, &clusters);
        assert_eq!(excess.len(), 1);
        assert_eq!(excess[0].region.as_str(), "london_2");
        assert_eq!(excess[0].excess_count, 2);
    }

    #[test]
    fn test_clusters_of_other_accounts_do_not_count() {
        let approvals = vec![approval("acme", "mumbai", 2025, &[(ProfileTag::D, 1)])];
        let clusters = vec![cluster("globex", "mumbai", "1", ProfileTag::D)];

        assert_eq!(compare(&approvals, &clusters)[0].current.total(), 0);
        let excess = unapproved(&approvals, &clusters);
        assert_eq!(excess[0].account.as_str(), "globex");
    }

    #[test]
    fn test_duplicate_approvals_are_summed() {
        let approvals = vec![
            approval("acme", "mumbai", 2025, &[(ProfileTag::D, 1)]),
            approval("acme", "Mumbai, IN", 2025, &[(ProfileTag::D, 2)]),
        ];
        let comparisons = compare(&approvals, &[]);
        assert_eq!(comparisons.len(), 1);
        assert_eq!(comparisons[0].total.get(ProfileTag::D), 3);
    }

    #[test]
    fn test_unapproved_sums_approvals_across_years() {
        let approvals = vec![
            approval("acme", "mumbai", 2024, &[(ProfileTag::D, 1)]),
            approval("acme", "mumbai", 2025, &[(ProfileTag::D, 1)]),
        ];
        let clusters = vec![
            cluster("acme", "mumbai", "1", ProfileTag::D),
            cluster("acme", "mumbai", "2", ProfileTag::D),
            cluster("acme", "mumbai", "3", ProfileTag::D),
        ];

        let comparisons = compare(&approvals, &clusters);
        assert_eq!(comparisons.len(), 2);
        assert!(comparisons.iter().all(|r| r.current.get(ProfileTag::D) == 3));

        let excess = unapproved(&approvals, &clusters);
        assert_eq!(excess.len(), 1);
        assert_eq!(excess[0].excess_count, 1);
    }

    #[test]
    fn test_unapproved_never_non_positive() {
        let (approvals, clusters) = mumbai_scenario();
        let mut approvals = approvals;
        approvals.push(approval("acme", "mumbai", 2026, &[(ProfileTag::Dha, 5)]));
        assert!(unapproved(&approvals, &clusters).is_empty());
        assert!(unapproved(&[], &[]).is_empty());
    }

    #[test]
    fn test_report_includes_every_account() {
        let (approvals, clusters) = mumbai_scenario();
        let accounts = vec![key("acme"), key("globex")];
        let failures = vec![AccountFailure {
            account: key("globex"),
            error: InventoryError::ListClusters {
                account: "globex".to_string(),
                message: "401".to_string(),
            },
        }];

        let report = CapacityReport::build(&accounts, &approvals, clusters, failures, Utc::now());

        assert_eq!(report.accounts.len(), 2);
        let acme = &report.accounts[0];
        assert_eq!(acme.account.as_str(), "acme");
        assert_eq!(acme.approved_total.get(ProfileTag::D), 2);
        assert_eq!(acme.regions.len(), 1);
        assert_eq!(acme.unapproved.len(), 1);
        assert_eq!(acme.clusters.len(), 3);
        assert_eq!(acme.current_total().total(), 3);

        let globex = &report.accounts[1];
        assert!(globex.regions.is_empty() && globex.clusters.is_empty());

        assert_eq!(report.exceeded_regions().count(), 1);
        assert_eq!(report.unapproved_totals().get(ProfileTag::Dha), 1);
    }

    #[test]
    fn test_report_filter_and_json() {
        let (approvals, clusters) = mumbai_scenario();
        let accounts = vec![key("acme"), key("globex")];
        let report = CapacityReport::build(&accounts, &approvals, clusters, Vec::new(), Utc::now());

        let json = serde_json::to_string(&report).unwrap();
        let parsed: CapacityReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);

        let filtered = report.filter_accounts(&[key("globex")]);
        assert_eq!(filtered.accounts.len(), 1);
        assert_eq!(filtered.comparisons().count(), 0);

        let value = serde_json::to_value(&filtered).unwrap();
        assert_eq!(value["accounts"][0]["account"], "globex");
    }
}
