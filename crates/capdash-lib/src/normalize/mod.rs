//! Canonicalisation of account and region names
//!
//! Approval sheets and the cloud API spell the same account or region in
//! different ways. Everything that joins the two data sets goes through
//! [`NameNormalizer`] first so both sides agree on [`AccountKey`] and
//! [`RegionKey`] values.

mod account;
mod catalog;
mod region;

pub use account::{AccountNormalizer, AccountPattern};
pub use catalog::RegionCatalog;
pub use region::RegionNormalizer;

use crate::models::{AccountKey, RegionKey};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Key used when a name has no usable characters
pub const UNKNOWN_KEY: &str = "unknown";

/// Account and region normalisation with their lookup tables
#[derive(Debug, Clone, Default)]
pub struct NameNormalizer {
    accounts: AccountNormalizer,
    regions: RegionNormalizer,
    catalog: RegionCatalog,
}

impl NameNormalizer {
    pub fn new(accounts: AccountNormalizer, regions: RegionNormalizer, catalog: RegionCatalog) -> Self {
        Self {
            accounts,
            regions,
            catalog,
        }
    }

    pub fn normalize_account(&self, raw: &str) -> AccountKey {
        self.accounts.normalize(raw)
    }

    /// Normalise a region label or API slug. Known slugs such as `ap-west`
    /// are first resolved to their catalog label, so approval sheets and the
    /// cloud API meet on the same key whichever spelling they use.
    pub fn normalize_region(&self, raw: &str) -> RegionKey {
        match self.catalog.label_for(raw) {
            Some(label) => self.regions.normalize(label),
            None => self.regions.normalize(raw),
        }
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }
}

/// Decompose and drop combining marks, so "São" becomes "Sao"
pub(crate) fn fold_diacritics(raw: &str) -> String {
    raw.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lowercase, fold diacritics and split on anything that is not a letter or
/// digit. Dots and apostrophes join their neighbours ("D.C." -> "dc").
pub(crate) fn tokenize(raw: &str) -> Vec<String> {
    let cleaned: String = fold_diacritics(raw)
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            '.' | '\'' | '\u{2019}' => None,
            c if c.is_alphanumeric() => Some(c),
            _ => Some(' '),
        })
        .collect();

    cleaned.split_whitespace().map(str::to_string).collect()
}
