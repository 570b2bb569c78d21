//! Region label canonicalisation

use super::{tokenize, UNKNOWN_KEY};
use crate::models::RegionKey;
use std::collections::HashSet;

/// Distinguished key for the second London site
pub const LONDON_SECOND_SITE: &str = "london_2";

/// Word that marks a second site in the same city
const EXPANSION_WORD: &str = "expansion";

/// Trailing country, state and country-name tokens stripped from labels
const DEFAULT_SUFFIXES: &[&str] = &[
    // countries
    "ae", "au", "br", "ca", "ch", "cn", "de", "es", "fr", "gb", "id", "in", "it", "jp", "kr",
    "nl", "ru", "se", "sg", "sp", "uk", "us", "za",
    // states
    "dc", "fl", "ga", "il", "nj", "tx", "wa",
    // names
    "brazil", "canada", "france", "germany", "india", "japan", "usa",
];

/// Maps free-text region labels to [`RegionKey`]s
///
/// "Mumbai, IN", "mumbai" and "MUMBAI" all become `mumbai`. A label that
/// mentions "Expansion" names a second site and becomes `<city>_2`; any
/// London label with an expansion marker or a digit becomes `london_2`.
#[derive(Debug, Clone)]
pub struct RegionNormalizer {
    suffixes: HashSet<String>,
}

impl RegionNormalizer {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            suffixes: suffixes
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Default suffix table extended with `extra`
    pub fn with_extra_suffixes<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra: Vec<String> = extra.into_iter().map(|s| s.as_ref().to_string()).collect();
        Self::new(DEFAULT_SUFFIXES.iter().copied().chain(extra.iter().map(String::as_str)))
    }

    /// Canonicalise a region label. Never fails and is idempotent.
    pub fn normalize(&self, raw: &str) -> RegionKey {
        let mut tokens = tokenize(raw);
        if tokens.is_empty() {
            return RegionKey::from_normalized(UNKNOWN_KEY.to_string());
        }

        let expansion = tokens.iter().any(|t| t == EXPANSION_WORD);
        if expansion {
            tokens.retain(|t| t != EXPANSION_WORD);
            // A label of nothing but markers stays the bare word
            if tokens.is_empty() {
                tokens.push(EXPANSION_WORD.to_string());
            }
        }

        while tokens.len() > 1 && tokens.last().is_some_and(|t| self.suffixes.contains(t)) {
            tokens.pop();
        }

        let joined = tokens.join("_");

        if joined.contains("london") && (expansion || joined.chars().any(|c| c.is_ascii_digit())) {
            return RegionKey::from_normalized(LONDON_SECOND_SITE.to_string());
        }

        if expansion && joined != EXPANSION_WORD {
            return RegionKey::from_normalized(format!("{}_2", joined));
        }

        RegionKey::from_normalized(joined)
    }
}

impl Default for RegionNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIXES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(raw: &str) -> String {
        RegionNormalizer::default().normalize(raw).as_str().to_string()
    }

    #[test]
    fn test_country_suffix_stripped() {
        assert_eq!(normalize("Mumbai, IN"), "mumbai");
        assert_eq!(normalize("mumbai"), "mumbai");
        assert_eq!(normalize("MUMBAI in"), "mumbai");
        assert_eq!(normalize("Mumbai,IN"), "mumbai");
    }

    #[test]
    fn test_state_and_country_words_stripped() {
        assert_eq!(normalize("Newark, NJ"), "newark");
        assert_eq!(normalize("Newark, NJ, US"), "newark");
        assert_eq!(normalize("Toronto, Canada"), "toronto");
        assert_eq!(normalize("Washington, D.C."), "washington");
        assert_eq!(normalize("Los Angeles, CA"), "los_angeles");
    }

    #[test]
    fn test_diacritics_removed() {
        assert_eq!(normalize("São Paulo, BR"), "sao_paulo");
        assert_eq!(normalize("Sao Paulo, Brazil"), "sao_paulo");
    }

    #[test]
    fn test_lone_suffix_token_kept() {
        assert_eq!(normalize("US"), "us");
        assert_eq!(normalize("in"), "in");
    }

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(normalize(""), UNKNOWN_KEY);
        assert_eq!(normalize("   "), UNKNOWN_KEY);
        assert_eq!(normalize(", ."), UNKNOWN_KEY);
    }

    #[test]
    fn test_london_second_site() {
        assert_eq!(normalize("London, UK"), "london");
        assert_eq!(normalize("London, UK Expansion"), LONDON_SECOND_SITE);
        assert_eq!(normalize("London 2"), LONDON_SECOND_SITE);
        assert_eq!(normalize("london_2"), LONDON_SECOND_SITE);
        assert_ne!(normalize("London, UK"), normalize("London, UK Expansion"));
    }

    #[test]
    fn test_other_expansion_sites() {
        assert_eq!(normalize("Mumbai Expansion, IN"), "mumbai_2");
        assert_eq!(normalize("Frankfurt, DE Expansion"), "frankfurt_2");
        assert_eq!(normalize("Frankfurt Expansion, DE"), "frankfurt_2");
        assert_eq!(normalize("Expansion"), "expansion");
        assert_eq!(normalize("Expansion Expansion"), "expansion");
    }

    #[test]
    fn test_shared_prefix_regions_stay_distinct() {
        assert_ne!(normalize("Mumbai, IN"), normalize("Mumbai Expansion, IN"));
        assert_ne!(normalize("Paris, FR"), normalize("Parisville"));
    }

    #[test]
    fn test_idempotent() {
        let normalizer = RegionNormalizer::default();
        for raw in [
            "Mumbai, IN",
            "London, UK Expansion",
            "London, UK",
            "São Paulo, BR",
            "Washington, D.C.",
            "Frankfurt, DE Expansion",
            "Tokyo Expansion, JP",
            "us-east",
            "Expansion",
            "Expansion Expansion",
            "Expansion, IN",
            "",
            "US",
            "  weird -- region // name  ",
        ] {
            let once = normalizer.normalize(raw);
            let twice = normalizer.normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_custom_suffixes() {
        let normalizer = RegionNormalizer::new(["north"]);
        assert_eq!(normalizer.normalize("Oslo North").as_str(), "oslo");
        assert_eq!(normalizer.normalize("Oslo, NO").as_str(), "oslo_no");
    }

    #[test]
    fn test_extra_suffixes_keep_defaults() {
        let normalizer = RegionNormalizer::with_extra_suffixes(["no"]);
        assert_eq!(normalizer.normalize("Oslo, NO").as_str(), "oslo");
        assert_eq!(normalizer.normalize("Mumbai, IN").as_str(), "mumbai");
    }
}
