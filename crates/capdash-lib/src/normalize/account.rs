//! Account name canonicalisation

use super::{tokenize, UNKNOWN_KEY};
use crate::models::AccountKey;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Key assigned to proof-of-concept accounts
pub const POC_KEY: &str = "poc";

const POC_PATTERN: &str = r"^[^-\s]+(?:-[^-\s]+)?-poc$";

/// A legacy naming convention and the short code it maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPattern {
    pub pattern: String,
    pub code: String,
}

impl AccountPattern {
    pub fn new(pattern: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            code: code.into(),
        }
    }

    /// The six `<org>-<env>-team-<cloud>` conventions
    pub fn defaults() -> Vec<AccountPattern> {
        vec![
            AccountPattern::new(r"^.*-devtest-team-az$", "dt_az"),
            AccountPattern::new(r"^.*-devtest-team-aws$", "dt_aws"),
            AccountPattern::new(r"^.*-e2e-team-az$", "e2e_az"),
            AccountPattern::new(r"^.*-e2e-team-aws$", "e2e_aws"),
            AccountPattern::new(r"^.*-dev-team-az$", "dev_az"),
            AccountPattern::new(r"^.*-dev-team-aws$", "dev_aws"),
        ]
    }
}

/// Maps raw account holder names to [`AccountKey`]s
#[derive(Debug, Clone)]
pub struct AccountNormalizer {
    patterns: Vec<(Regex, String)>,
    poc: Regex,
}

impl AccountNormalizer {
    /// Build from a pattern table. Matching is case-insensitive.
    pub fn new(patterns: &[AccountPattern]) -> Result<Self, regex::Error> {
        let compiled = patterns
            .iter()
            .map(|p| Ok((case_insensitive(&p.pattern)?, p.code.clone())))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            patterns: compiled,
            poc: case_insensitive(POC_PATTERN)?,
        })
    }

    /// Canonicalise a raw account name. Never fails.
    pub fn normalize(&self, raw: &str) -> AccountKey {
        let trimmed = raw.trim();

        if let Some((_, code)) = self.patterns.iter().find(|(re, _)| re.is_match(trimmed)) {
            return AccountKey::from_normalized(code.clone());
        }

        if self.poc.is_match(trimmed) {
            return AccountKey::from_normalized(POC_KEY.to_string());
        }

        let cleaned = tokenize(trimmed).join("_");
        if cleaned.is_empty() {
            AccountKey::from_normalized(UNKNOWN_KEY.to_string())
        } else {
            AccountKey::from_normalized(cleaned)
        }
    }
}

impl Default for AccountNormalizer {
    fn default() -> Self {
        Self::new(&AccountPattern::defaults()).expect("built-in account patterns are valid")
    }
}

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(raw: &str) -> String {
        AccountNormalizer::default().normalize(raw).as_str().to_string()
    }

    #[test]
    fn test_legacy_patterns() {
        assert_eq!(normalize("org-devtest-team-az"), "dt_az");
        assert_eq!(normalize("org-devtest-team-aws"), "dt_aws");
        assert_eq!(normalize("org-e2e-team-az"), "e2e_az");
        assert_eq!(normalize("org-e2e-team-aws"), "e2e_aws");
        assert_eq!(normalize("acme-cloudms-dev-team-az"), "dev_az");
        assert_eq!(normalize("acme-cloudms-dev-team-aws"), "dev_aws");
    }

    #[test]
    fn test_patterns_are_case_insensitive_and_trimmed() {
        assert_eq!(normalize("  ORG-DevTest-Team-AZ  "), "dt_az");
    }

    #[test]
    fn test_devtest_not_confused_with_dev() {
        assert_eq!(normalize("org-devtest-team-aws"), "dt_aws");
        assert_eq!(normalize("org-dev-team-aws"), "dev_aws");
    }

    #[test]
    fn test_poc_accounts() {
        assert_eq!(normalize("myteam-poc"), POC_KEY);
        assert_eq!(normalize("acme-search-poc"), POC_KEY);
        assert_eq!(normalize("MyTeam-POC"), POC_KEY);
    }

    #[test]
    fn test_fallback_is_lowercase_cleaned() {
        assert_eq!(normalize("Acme"), "acme");
        assert_eq!(normalize("Acme Platform-Ops"), "acme_platform_ops");
        assert_eq!(normalize("a-b-c-poc"), "a_b_c_poc");
    }

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(normalize(""), UNKNOWN_KEY);
        assert_eq!(normalize(" -- "), UNKNOWN_KEY);
    }

    #[test]
    fn test_idempotent() {
        let normalizer = AccountNormalizer::default();
        for raw in [
            "org-devtest-team-az",
            "myteam-poc",
            "Acme Platform-Ops",
            "dt_az",
            "",
            "Señor-Cloud",
        ] {
            let once = normalizer.normalize(raw);
            let twice = normalizer.normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_custom_patterns() {
        let normalizer =
            AccountNormalizer::new(&[AccountPattern::new(r"^acme-prod-.*$", "prod")]).unwrap();
        assert_eq!(normalizer.normalize("acme-prod-eu").as_str(), "prod");
        assert_eq!(normalizer.normalize("org-dev-team-az").as_str(), "org_dev_team_az");
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(AccountNormalizer::new(&[AccountPattern::new("(", "x")]).is_err());
    }
}
