//! Approval sheet ingestion
//!
//! Each approval row stands for one approved cluster of one profile in one
//! region and year. Rows are normalised, assigned a profile, checked against
//! the account registry and summed per `(account, region, year)`.

use crate::accounts::AccountRegistry;
use crate::classify::{parse_memory_label, ProfileClassifier};
use crate::error::RowRejection;
use crate::models::{AccountKey, ApprovalRecord, ProfileCapacity, ProfileTag, RegionKey};
use crate::normalize::NameNormalizer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// An approval row as read from the sheet. Blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawApprovalRow {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    /// Explicit profile tag
    #[serde(default)]
    pub profile: Option<String>,
    /// Plan label or size, e.g. "Dedicated 16 GB"
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub nodes: Option<String>,
    /// Background colour of the row's capacity cell
    #[serde(default)]
    pub color: Option<String>,
}

/// A row that did not make it into the approval set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// Zero-based position in the input
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub reason: RowRejection,
}

/// Outcome of ingesting a batch of approval rows
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub records: Vec<ApprovalRecord>,
    pub accepted_rows: usize,
    pub rejected: Vec<RejectedRow>,
}

impl IngestReport {
    pub fn unknown_accounts(&self) -> BTreeSet<&str> {
        self.rejected
            .iter()
            .filter_map(|r| match &r.reason {
                RowRejection::UnknownAccount(key) => Some(key.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Converts raw approval rows into [`ApprovalRecord`]s
pub struct ApprovalIngestor<'a> {
    normalizer: &'a NameNormalizer,
    classifier: &'a ProfileClassifier,
}

struct AcceptedRow {
    account: AccountKey,
    region: RegionKey,
    year: i32,
    profile: ProfileTag,
}

impl<'a> ApprovalIngestor<'a> {
    pub fn new(normalizer: &'a NameNormalizer, classifier: &'a ProfileClassifier) -> Self {
        Self {
            normalizer,
            classifier,
        }
    }

    /// Ingest a batch. Bad rows are skipped and reported, never fatal.
    pub fn ingest(&self, rows: &[RawApprovalRow], registry: &dyn AccountRegistry) -> IngestReport {
        let mut grouped: BTreeMap<(AccountKey, RegionKey, i32), ProfileCapacity> = BTreeMap::new();
        let mut report = IngestReport::default();
        let mut warned: BTreeSet<AccountKey> = BTreeSet::new();

        for (index, row) in rows.iter().enumerate() {
            let accepted = match self.accept(row) {
                Ok(accepted) => accepted,
                Err(reason) => {
                    debug!(row = index, reason = %reason, "Skipping approval row");
                    report.rejected.push(RejectedRow {
                        row: index,
                        account: row.account.clone(),
                        reason,
                    });
                    continue;
                }
            };

            if !registry.contains(&accepted.account) {
                if warned.insert(accepted.account.clone()) {
                    warn!(
                        account = %accepted.account,
                        "Approval rows reference an unregistered account, dropping them"
                    );
                }
                report.rejected.push(RejectedRow {
                    row: index,
                    account: row.account.clone(),
                    reason: RowRejection::UnknownAccount(accepted.account.to_string()),
                });
                continue;
            }

            *grouped
                .entry((accepted.account, accepted.region, accepted.year))
                .or_default() += ProfileCapacity::single(accepted.profile);
            report.accepted_rows += 1;
        }

        report.records = grouped
            .into_iter()
            .map(|((account, region, year), total_capacity)| ApprovalRecord {
                account,
                region,
                year,
                total_capacity,
            })
            .collect();

        report
    }

    fn accept(&self, row: &RawApprovalRow) -> Result<AcceptedRow, RowRejection> {
        let account = present(&row.account).ok_or(RowRejection::MissingAccount)?;
        let region = present(&row.region).ok_or(RowRejection::MissingRegion)?;
        let year_raw = present(&row.year).ok_or(RowRejection::MissingYear)?;
        let year = parse_year(year_raw).ok_or_else(|| RowRejection::InvalidYear(year_raw.to_string()))?;
        let profile = self.derive_profile(row)?;

        Ok(AcceptedRow {
            account: self.normalizer.normalize_account(account),
            region: self.normalizer.normalize_region(region),
            year,
            profile,
        })
    }

    /// Explicit tag first, then memory and node count, then cell colour
    fn derive_profile(&self, row: &RawApprovalRow) -> Result<ProfileTag, RowRejection> {
        if let Some(tag) = present(&row.profile) {
            return tag
                .parse()
                .map_err(|_| RowRejection::InvalidProfile(tag.to_string()));
        }

        let memory = present(&row.memory).and_then(parse_memory_label);
        let nodes = present(&row.nodes).and_then(parse_count);
        if let (Some(memory), Some(nodes)) = (memory, nodes) {
            return Ok(ProfileClassifier::determine_profile(memory, nodes));
        }

        present(&row.color)
            .and_then(|c| self.classifier.profile_for_color(c))
            .ok_or(RowRejection::NoProfile)
    }
}

fn present(cell: &Option<String>) -> Option<&str> {
    cell.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Whole numbers, also when a sheet exported them as "2025.0"
fn parse_year(raw: &str) -> Option<i32> {
    parse_whole(raw).and_then(|v| i32::try_from(v).ok())
}

fn parse_count(raw: &str) -> Option<u32> {
    parse_whole(raw).and_then(|v| u32::try_from(v).ok())
}

fn parse_whole(raw: &str) -> Option<i64> {
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
}
