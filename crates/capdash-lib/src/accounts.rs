//! Directory of monitored cloud accounts

use crate::models::AccountKey;
use crate::normalize::NameNormalizer;
use std::fmt;

/// Registry check used when ingesting approvals
pub trait AccountRegistry: Send + Sync {
    /// Whether the account is known and active
    fn contains(&self, account: &AccountKey) -> bool;
}

/// A monitored account and its API token
#[derive(Clone)]
pub struct Account {
    pub name: String,
    pub key: AccountKey,
    token: String,
}

impl Account {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether `name` refers to this same account, ignoring case and
    /// surrounding whitespace
    pub fn has_name(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// In-memory account directory.
///
/// Several accounts may share one canonical key (every `*-poc` account is
/// `poc`); each is kept and fetched separately.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    accounts: Vec<Account>,
}

impl AccountDirectory {
    /// Build from `(name, token)` pairs. A later entry with the same raw
    /// name replaces the earlier one.
    pub fn from_entries<I, N, T>(normalizer: &NameNormalizer, entries: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        let mut directory = Self::default();
        for (name, token) in entries {
            directory.insert(normalizer, name, token);
        }
        directory
    }

    pub fn insert(&mut self, normalizer: &NameNormalizer, name: impl Into<String>, token: impl Into<String>) {
        let name = name.into();
        let key = normalizer.normalize_account(&name);
        let account = Account {
            name,
            key,
            token: token.into(),
        };

        match self.accounts.iter_mut().find(|a| a.has_name(&account.name)) {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }
    }

    /// Accounts sharing a canonical key
    pub fn get(&self, key: &AccountKey) -> impl Iterator<Item = &Account> + '_ {
        let key = key.clone();
        self.accounts.iter().filter(move |a| a.key == key)
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Distinct canonical keys, in first-seen order
    pub fn keys(&self) -> Vec<&AccountKey> {
        let mut keys: Vec<&AccountKey> = Vec::new();
        for account in &self.accounts {
            if !keys.contains(&&account.key) {
                keys.push(&account.key);
            }
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountRegistry for AccountDirectory {
    fn contains(&self, account: &AccountKey) -> bool {
        self.accounts.iter().any(|a| &a.key == account)
    }
}
