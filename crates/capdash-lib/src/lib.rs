//! Capacity reconciliation library
//!
//! This crate provides the core functionality for:
//! - Canonicalising account and region names
//! - Classifying clusters into capacity profiles
//! - Ingesting approval sheets and aggregating live cluster inventory
//! - Reconciling approved against live capacity
//! - Caching reports and observability

pub mod accounts;
pub mod classify;
pub mod error;
pub mod ingest;
pub mod inventory;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod reconcile;
pub mod service;
pub mod store;

pub use accounts::{Account, AccountDirectory, AccountRegistry};
pub use classify::{InstanceTypeSpec, ProfileClassifier, ProfileColor};
pub use error::{InventoryError, RowRejection};
pub use ingest::{ApprovalIngestor, IngestReport, RawApprovalRow, RejectedRow};
pub use inventory::{
    AccountFailure, ClusterSummary, InventoryAggregator, InventoryFetcher, InventoryProvider,
    InventorySnapshot, PoolDetail, RawCluster,
};
pub use models::*;
pub use normalize::{AccountNormalizer, AccountPattern, NameNormalizer, RegionCatalog, RegionNormalizer};
pub use observability::{ReconcileLogger, ReconcileMetrics};
pub use reconcile::{AccountReport, CapacityReport};
pub use service::CapacityService;
pub use store::{MemoryStore, ReportStore};
