//! Catalog Migrator Library
//!
//! Migrates flat CSV exports of a product catalog into a document store.
//!
//! This library provides tools for:
//! - Reading and validating category, vendor and product records
//! - Rebuilding the category hierarchy from positional category codes
//! - Embedding vendor and category snapshots into products
//! - Idempotent upserts in batches, with optional per-migration transactions
//! - Connecting to the store with bounded exponential-backoff retries

pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod dates;
pub mod error;
pub mod migration;
pub mod models;
pub mod source;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{MigrationStage, MigratorError, Result};
pub use migration::{
    CategoryMigration, Migration, MigrationContext, MigrationOptions, MigrationRunner,
    ProductMigration, RunOutcome, RunReport, VendorMigration,
};
pub use models::{Category, CategoryTree, Collection, CollectionStats, Product, Vendor};
pub use store::{DocumentStore, EmbeddedStore, open_store};
