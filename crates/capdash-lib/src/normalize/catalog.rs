//! Cloud region slugs and their human-readable labels

use std::collections::HashMap;

const DEFAULT_REGIONS: &[(&str, &str)] = &[
    // North America
    ("us-southeast", "Atlanta, GA"),
    ("us-ord", "Chicago, IL"),
    ("us-central", "Dallas, TX"),
    ("us-west", "Fremont, CA"),
    ("us-lax", "Los Angeles, CA"),
    ("us-mia", "Miami, FL"),
    ("us-east", "Newark, NJ"),
    ("us-sea", "Seattle, WA"),
    ("us-iad", "Washington, D.C."),
    ("ca-central", "Toronto, Canada"),
    // Europe
    ("se-sto", "Stockholm, SE"),
    ("nl-ams", "Amsterdam, NL"),
    ("it-mil", "Milan, IT"),
    ("eu-west", "London, UK"),
    ("gb-lon", "London, UK Expansion"),
    ("fr-par", "Paris, FR"),
    ("es-mad", "Madrid, ES"),
    ("eu-central", "Frankfurt, DE"),
    ("de-fra-2", "Frankfurt, DE Expansion"),
    // Asia
    ("ap-south", "Singapore, SP"),
    ("sg-sin-2", "Singapore Expansion, SP"),
    ("jp-osa", "Osaka, JP"),
    ("ap-northeast", "Tokyo, JP"),
    ("jp-tyo-3", "Tokyo Expansion, JP"),
    ("in-maa", "Chennai, IN"),
    ("ap-west", "Mumbai, IN"),
    ("in-bom-2", "Mumbai Expansion, IN"),
    ("id-cgk", "Jakarta, ID"),
    // South America
    ("br-gru", "São Paulo, BR"),
    // Oceania
    ("au-mel", "Melbourne, AU"),
    ("ap-southeast", "Sydney, AU"),
];

/// Lookup from API region slug to the label used in approval sheets
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    labels: HashMap<String, String>,
}

impl RegionCatalog {
    pub fn new<I, S, L>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: Into<String>,
    {
        Self {
            labels: entries
                .into_iter()
                .map(|(slug, label)| (slug.into().to_ascii_lowercase(), label.into()))
                .collect(),
        }
    }

    /// Label for a slug, or `None` when the input is not a known slug
    pub fn label_for(&self, slug: &str) -> Option<&str> {
        self.labels
            .get(&slug.trim().to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for RegionCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_REGIONS.iter().copied())
    }
}
