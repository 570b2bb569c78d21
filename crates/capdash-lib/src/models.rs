//! Core data models for capacity reconciliation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

/// Capacity class of a cluster, ordered from smallest to largest node tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProfileTag {
    #[serde(rename = "D")]
    D,
    #[serde(rename = "DHA")]
    Dha,
    #[serde(rename = "S")]
    S,
    #[serde(rename = "M")]
    M,
    #[serde(rename = "L")]
    L,
}

impl ProfileTag {
    /// All profiles in ascending order
    pub const ALL: [ProfileTag; 5] = [
        ProfileTag::D,
        ProfileTag::Dha,
        ProfileTag::S,
        ProfileTag::M,
        ProfileTag::L,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileTag::D => "D",
            ProfileTag::Dha => "DHA",
            ProfileTag::S => "S",
            ProfileTag::M => "M",
            ProfileTag::L => "L",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ProfileTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "D" => Ok(ProfileTag::D),
            "DHA" => Ok(ProfileTag::Dha),
            "S" => Ok(ProfileTag::S),
            "M" => Ok(ProfileTag::M),
            "L" => Ok(ProfileTag::L),
            other => Err(format!("unknown profile '{}'", other)),
        }
    }
}

/// Per-profile cluster counts. All five profiles are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCapacity {
    #[serde(rename = "D", default)]
    pub d: u32,
    #[serde(rename = "DHA", default)]
    pub dha: u32,
    #[serde(rename = "S", default)]
    pub s: u32,
    #[serde(rename = "M", default)]
    pub m: u32,
    #[serde(rename = "L", default)]
    pub l: u32,
}

impl ProfileCapacity {
    /// Capacity with a single unit in one profile slot
    pub fn single(profile: ProfileTag) -> Self {
        let mut capacity = Self::default();
        capacity.add(profile, 1);
        capacity
    }

    pub fn get(&self, profile: ProfileTag) -> u32 {
        self.as_array()[profile.index()]
    }

    pub fn add(&mut self, profile: ProfileTag, count: u32) {
        let slot = match profile {
            ProfileTag::D => &mut self.d,
            ProfileTag::Dha => &mut self.dha,
            ProfileTag::S => &mut self.s,
            ProfileTag::M => &mut self.m,
            ProfileTag::L => &mut self.l,
        };
        *slot = slot.saturating_add(count);
    }

    /// Sum across all profiles
    pub fn total(&self) -> u64 {
        self.as_array().iter().map(|&v| u64::from(v)).sum()
    }

    /// Component-wise `max(0, self - other)`
    pub fn saturating_sub(&self, other: &ProfileCapacity) -> ProfileCapacity {
        ProfileCapacity {
            d: self.d.saturating_sub(other.d),
            dha: self.dha.saturating_sub(other.dha),
            s: self.s.saturating_sub(other.s),
            m: self.m.saturating_sub(other.m),
            l: self.l.saturating_sub(other.l),
        }
    }

    /// Iterate `(profile, count)` pairs in profile order
    pub fn iter(&self) -> impl Iterator<Item = (ProfileTag, u32)> + '_ {
        ProfileTag::ALL.into_iter().map(move |p| (p, self.get(p)))
    }

    fn as_array(&self) -> [u32; 5] {
        [self.d, self.dha, self.s, self.m, self.l]
    }
}

impl AddAssign for ProfileCapacity {
    fn add_assign(&mut self, rhs: Self) {
        for (profile, count) in rhs.iter() {
            self.add(profile, count);
        }
    }
}

/// Canonical account identifier, produced by [`crate::normalize::NameNormalizer`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountKey(String);

impl AccountKey {
    pub(crate) fn from_normalized(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical region identifier, produced by [`crate::normalize::NameNormalizer`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionKey(String);

impl RegionKey {
    pub(crate) fn from_normalized(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Approved capacity for one account, region and year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub account: AccountKey,
    pub region: RegionKey,
    pub year: i32,
    pub total_capacity: ProfileCapacity,
}

/// A node pool as reported by the cloud API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePool {
    #[serde(rename = "type")]
    pub instance_type: String,
    #[serde(rename = "count")]
    pub node_count: u32,
}

impl NodePool {
    pub fn new(instance_type: impl Into<String>, node_count: u32) -> Self {
        Self {
            instance_type: instance_type.into(),
            node_count,
        }
    }
}

/// One live cluster, classified by its largest-memory node pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub account: AccountKey,
    pub region: RegionKey,
    pub profile: ProfileTag,
    pub node_count: u32,
    pub cluster_id: String,
    pub label: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    pub max_memory_gb: u32,
    /// Pool detail could not be fetched; profile and counts are defaults
    pub degraded: bool,
}

/// Aggregate comparison outcome for a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityStatus {
    Exceeded,
    AtCapacity,
    WithinLimit,
}

impl CapacityStatus {
    /// Status from aggregate sums across all profiles
    pub fn from_totals(total: &ProfileCapacity, current: &ProfileCapacity) -> Self {
        let total_sum = total.total();
        let current_sum = current.total();
        if current_sum > total_sum {
            CapacityStatus::Exceeded
        } else if current_sum == total_sum {
            CapacityStatus::AtCapacity
        } else {
            CapacityStatus::WithinLimit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityStatus::Exceeded => "EXCEEDED",
            CapacityStatus::AtCapacity => "AT_CAPACITY",
            CapacityStatus::WithinLimit => "WITHIN_LIMIT",
        }
    }
}

impl fmt::Display for CapacityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approved vs. actual capacity for one account, region and year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub account: AccountKey,
    pub region: RegionKey,
    pub year: i32,
    pub total: ProfileCapacity,
    pub current: ProfileCapacity,
    pub available: ProfileCapacity,
    pub status: CapacityStatus,
}

/// Live capacity above what was approved for a region and profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnapprovedRecord {
    pub account: AccountKey,
    pub region: RegionKey,
    pub profile: ProfileTag,
    pub excess_count: u32,
}
