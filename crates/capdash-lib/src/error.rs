//! Recoverable problems reported alongside engine results

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an approval row was left out of the approval set
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RowRejection {
    #[error("account is missing")]
    MissingAccount,

    #[error("region is missing")]
    MissingRegion,

    #[error("year is missing")]
    MissingYear,

    #[error("year '{0}' is not a number")]
    InvalidYear(String),

    #[error("profile '{0}' is not one of D, DHA, S, M, L")]
    InvalidProfile(String),

    #[error("no profile, memory and node count, or colour to derive a profile from")]
    NoProfile,

    #[error("account '{0}' is not registered")]
    UnknownAccount(String),
}

/// Failure of an external inventory fetch
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InventoryError {
    #[error("listing clusters for account {account} failed: {message}")]
    ListClusters { account: String, message: String },

    #[error("fetching pools for cluster {cluster_id} failed: {message}")]
    PoolFetch { cluster_id: String, message: String },

    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout { operation: String, timeout_secs: u64 },
}
