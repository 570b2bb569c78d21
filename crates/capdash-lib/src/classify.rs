//! Cluster profile classification
//!
//! A cluster's profile is decided by the memory size of its largest node
//! type and its total node count:
//!
//! | memory   | nodes | profile |
//! |----------|-------|---------|
//! | >= 32 GB | any   | L       |
//! | 16 GB    | <= 16 | S       |
//! | 16 GB    | > 16  | M       |
//! | 8 GB     | <= 7  | D       |
//! | 8 GB     | > 7   | DHA     |
//! | other    | any   | D       |

use crate::models::{NodePool, ProfileTag};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Memory size and description of a cloud instance type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTypeSpec {
    pub id: String,
    pub memory_gb: u32,
    pub description: String,
}

impl InstanceTypeSpec {
    pub fn new(id: impl Into<String>, memory_gb: u32, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            memory_gb,
            description: description.into(),
        }
    }

    /// Dedicated CPU plans
    pub fn defaults() -> Vec<InstanceTypeSpec> {
        [
            ("g6-dedicated-2", 4),
            ("g6-dedicated-4", 8),
            ("g6-dedicated-8", 16),
            ("g6-dedicated-16", 32),
            ("g6-dedicated-32", 64),
            ("g6-dedicated-48", 96),
            ("g6-dedicated-50", 128),
            ("g6-dedicated-56", 256),
        ]
        .into_iter()
        .map(|(id, gb)| InstanceTypeSpec::new(id, gb, format!("Dedicated {}GB", gb)))
        .collect()
    }
}

/// Spreadsheet cell colour that marks a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileColor {
    pub color: String,
    pub profile: ProfileTag,
}

impl ProfileColor {
    pub fn new(color: impl Into<String>, profile: ProfileTag) -> Self {
        Self {
            color: color.into(),
            profile,
        }
    }

    pub fn defaults() -> Vec<ProfileColor> {
        vec![
            ProfileColor::new("#cfe2f3", ProfileTag::D),
            ProfileColor::new("#fce5cd", ProfileTag::Dha),
            ProfileColor::new("#d9d2e9", ProfileTag::S),
            ProfileColor::new("#ead1dc", ProfileTag::M),
            ProfileColor::new("#e6b8af", ProfileTag::L),
            ProfileColor::new("#ffffff", ProfileTag::D),
        ]
    }
}

/// Result of classifying a cluster's pools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterProfile {
    pub profile: ProfileTag,
    pub node_count: u32,
    pub max_memory_gb: u32,
}

/// Maps instance types and node counts to capacity profiles
#[derive(Debug, Clone)]
pub struct ProfileClassifier {
    instance_types: Vec<InstanceTypeSpec>,
    colors: Vec<ProfileColor>,
}

impl ProfileClassifier {
    pub fn new(instance_types: Vec<InstanceTypeSpec>, colors: Vec<ProfileColor>) -> Self {
        Self {
            instance_types,
            colors,
        }
    }

    fn lookup(&self, instance_type: &str) -> Option<&InstanceTypeSpec> {
        // Longest id wins so that "g6-dedicated-48" is not taken for "g6-dedicated-4"
        self.instance_types
            .iter()
            .filter(|spec| !spec.id.is_empty() && instance_type.contains(spec.id.as_str()))
            .max_by_key(|spec| spec.id.len())
    }

    /// Memory size in GB for an instance type, 0 when unknown
    pub fn memory_gb(&self, instance_type: &str) -> u32 {
        self.lookup(instance_type).map(|s| s.memory_gb).unwrap_or(0)
    }

    pub fn description(&self, instance_type: &str) -> &str {
        self.lookup(instance_type)
            .map(|s| s.description.as_str())
            .unwrap_or("Unknown")
    }

    /// Profile for a memory size and total node count
    pub fn determine_profile(max_memory_gb: u32, total_node_count: u32) -> ProfileTag {
        match max_memory_gb {
            m if m >= 32 => ProfileTag::L,
            16 if total_node_count <= 16 => ProfileTag::S,
            16 => ProfileTag::M,
            8 if total_node_count <= 7 => ProfileTag::D,
            8 => ProfileTag::Dha,
            _ => ProfileTag::D,
        }
    }

    /// Classify a cluster from all of its node pools.
    ///
    /// Node counts are summed across pools; memory is the largest single
    /// pool's instance size. An empty pool list classifies as `D`.
    pub fn classify_cluster(&self, pools: &[NodePool]) -> ClusterProfile {
        let node_count = pools
            .iter()
            .fold(0u32, |acc, p| acc.saturating_add(p.node_count));
        let max_memory_gb = pools
            .iter()
            .map(|p| self.memory_gb(&p.instance_type))
            .max()
            .unwrap_or(0);

        ClusterProfile {
            profile: Self::determine_profile(max_memory_gb, node_count),
            node_count,
            max_memory_gb,
        }
    }

    /// Profile marked by a cell colour such as `#FCE5CD` or `fce5cd`
    pub fn profile_for_color(&self, color: &str) -> Option<ProfileTag> {
        let wanted = color.trim().trim_start_matches('#');
        self.colors
            .iter()
            .find(|c| c.color.trim_start_matches('#').eq_ignore_ascii_case(wanted))
            .map(|c| c.profile)
    }
}

impl Default for ProfileClassifier {
    fn default() -> Self {
        Self::new(InstanceTypeSpec::defaults(), ProfileColor::defaults())
    }
}

/// Memory size from a plan label such as "Dedicated 16 GB" or "32GB"
pub fn parse_memory_label(label: &str) -> Option<u32> {
    static MEMORY_RE: OnceLock<Regex> = OnceLock::new();
    let re = MEMORY_RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*gb").expect("memory label pattern is valid")
    });

    if let Some(caps) = re.captures(label) {
        return caps[1].parse().ok();
    }
    label.trim().parse().ok()
}
