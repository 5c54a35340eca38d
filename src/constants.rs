//! Application constants for the catalog migrator
//!
//! Default values, environment variable names and source column names
//! used throughout the migration pipeline.

// =============================================================================
// Migration Defaults
// =============================================================================

/// Records per bulk write when nothing else is configured
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Minimum time between two progress reports of the batch processor
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 5000;

/// Progress cadence used by the domain migrations
pub const MIGRATION_PROGRESS_INTERVAL_MS: u64 = 2000;

/// Retry attempts recorded for migration-level retries
pub const DEFAULT_MIGRATION_RETRY_ATTEMPTS: u32 = 3;

// =============================================================================
// Store Defaults
// =============================================================================

pub const DEFAULT_STORE_URI: &str = "memory://";
pub const DEFAULT_CONNECT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_SERVER_SELECTION_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 45_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_POOL_SIZE: u32 = 10;

/// Id of the singleton category tree document
pub const CATEGORY_TREE_ID: &str = "categoryTree";

// =============================================================================
// Environment Variables
// =============================================================================

pub mod env_vars {
    pub const APP_ENV: &str = "APP_ENV";
    pub const NODE_ENV: &str = "NODE_ENV";
    pub const STORE_URI: &str = "STORE_URI";
    pub const STORE_RETRY_ATTEMPTS: &str = "STORE_RETRY_ATTEMPTS";
    pub const BATCH_SIZE: &str = "MIGRATION_BATCH_SIZE";
    pub const MIGRATION_RETRY_ATTEMPTS: &str = "MIGRATION_RETRY_ATTEMPTS";
    pub const USE_TRANSACTIONS: &str = "MIGRATION_USE_TRANSACTIONS";
    pub const CATEGORIES_PATH: &str = "CATEGORIES_PATH";
    pub const VENDORS_PATH: &str = "VENDORS_PATH";
    pub const PRODUCTS_PATH: &str = "PRODUCTS_PATH";
}

pub const DEFAULT_CATEGORIES_FILE: &str = "categories.csv";
pub const DEFAULT_VENDORS_FILE: &str = "vendors.csv";
pub const DEFAULT_PRODUCTS_FILE: &str = "products.csv";

// =============================================================================
// Source Columns
// =============================================================================

/// Column names of the category export
pub mod category_columns {
    pub const CODE: &str = "CATEGORY_CODE";
    pub const NAME: &str = "CATEGORY_NAME";
    pub const CREATE_DATE: &str = "CREATE_DATE";
    pub const LAST_MODIFIED_DATE: &str = "LAST_MODIFIED_DATE";
}

/// Column names of the vendor export
pub mod vendor_columns {
    pub const ID: &str = "VENDOR_ID";
    pub const NAME: &str = "VENDOR_NAME";
    pub const CREATE_DATE: &str = "CREATE_DATE";
    pub const LAST_MODIFIED_DATE: &str = "LAST_MODIFIED_DATE";
}

/// Column names of the product export
pub mod product_columns {
    pub const SKU: &str = "SKU";
    pub const MANUFACTURER_PART_NO: &str = "MANUFACTURER_PART_NO";
    pub const NAME: &str = "PRODUCT_NAME";
    pub const VENDOR: &str = "VENDOR";
    pub const DESCRIPTION: &str = "DESCRIPTION";
    pub const ACTIVE_STATUS: &str = "ACTIVE_STATUS";
    pub const DISCONTINUED: &str = "DISCONTINUED";
    pub const CREATED_DATE: &str = "CREATED_DATE";
    pub const LAST_MODIFIED_DATE: &str = "LAST_MODIFIED_DATE";
    pub const COLOR: &str = "COLOR";
    pub const CATEGORY_CODE: &str = "CATEGORY_CODE";
}

// =============================================================================
// Category Codes
// =============================================================================

/// Digits added per hierarchy level; also the length of a root code
pub const CATEGORY_LEVEL_WIDTH: usize = 2;

/// Longest accepted category code (four levels)
pub const MAX_CATEGORY_CODE_LEN: usize = 8;

/// Date placeholder used by the exports for "no date"
pub const ZERO_DATE_SENTINEL: &str = "00000000";
