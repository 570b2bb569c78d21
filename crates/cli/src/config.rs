//! Configuration management for the CLI

use anyhow::{Context, Result};
use capdash_lib::{
    AccountDirectory, AccountNormalizer, AccountPattern, InstanceTypeSpec, NameNormalizer,
    ProfileClassifier, ProfileColor, RegionCatalog, RegionNormalizer,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Prefix of configuration environment variables
const ENV_PREFIX: &str = "CAPDASH";

/// CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Linode API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Lifetime of a cached report in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Timeout for each inventory API call in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Monitored accounts
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,

    /// Replaces the built-in instance type table
    #[serde(default)]
    pub instance_types: Option<Vec<InstanceTypeSpec>>,

    /// Replaces the built-in account naming conventions
    #[serde(default)]
    pub account_patterns: Option<Vec<AccountPattern>>,

    /// Extra trailing region words to strip
    #[serde(default)]
    pub region_suffixes: Vec<String>,
}

/// An account as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct AccountEntry {
    pub name: String,
    /// Falls back to `CAPDASH_TOKEN_<NAME>` when absent
    #[serde(default)]
    pub token: Option<String>,
}

fn default_api_url() -> String {
    "https://api.linode.com/v4/".to_string()
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_fetch_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            cache_ttl_secs: default_cache_ttl(),
            fetch_timeout_secs: default_fetch_timeout(),
            log_json: false,
            accounts: Vec::new(),
            instance_types: None,
            account_patterns: None,
            region_suffixes: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from the config file and `CAPDASH_*` environment variables.
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match explicit {
            Some(path) => {
                builder = builder.add_source(
                    config::File::from(path.to_path_buf())
                        .format(config::FileFormat::Toml)
                        .required(true),
                );
            }
            None => {
                if let Some(path) = Self::default_path() {
                    builder = builder.add_source(
                        config::File::from(path)
                            .format(config::FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// `~/.config/capdash/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("capdash").join("config.toml"))
    }

    pub fn normalizer(&self) -> Result<NameNormalizer> {
        let patterns = self
            .account_patterns
            .clone()
            .unwrap_or_else(AccountPattern::defaults);
        let accounts =
            AccountNormalizer::new(&patterns).context("Invalid account pattern in configuration")?;

        Ok(NameNormalizer::new(
            accounts,
            RegionNormalizer::with_extra_suffixes(&self.region_suffixes),
            RegionCatalog::default(),
        ))
    }

    pub fn classifier(&self) -> ProfileClassifier {
        let instance_types = self
            .instance_types
            .clone()
            .unwrap_or_else(InstanceTypeSpec::defaults);
        ProfileClassifier::new(instance_types, ProfileColor::defaults())
    }

    /// Accounts with their resolved tokens; a missing token is empty
    pub fn directory(&self, normalizer: &NameNormalizer) -> AccountDirectory {
        AccountDirectory::from_entries(
            normalizer,
            self.accounts.iter().map(|entry| {
                let token = entry
                    .token
                    .clone()
                    .or_else(|| std::env::var(token_env_var(&entry.name)).ok())
                    .unwrap_or_default();
                (entry.name.clone(), token)
            }),
        )
    }
}

/// `CAPDASH_TOKEN_<NAME>` with the name upper-cased and non-alphanumerics
/// replaced by underscores
pub fn token_env_var(account: &str) -> String {
    let name: String = account
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}_TOKEN_{}", ENV_PREFIX, name)
}
