//! Command-line argument definitions for the catalog migrator
//!
//! Every option overrides the value resolved from the environment; options
//! that are not given leave the environment or built-in default in place.

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Migrate category, vendor and product CSV exports into a document store
#[derive(Debug, Clone, Parser)]
#[command(
    name = "catalog-migrator",
    version,
    about = "Migrate category, vendor and product CSV exports into a document store",
    long_about = "Reads flat CSV exports of categories, vendors and products, validates \
                  every record, rebuilds the category hierarchy and upserts everything into \
                  a document store in batches. Products embed snapshots of their vendor and \
                  category, so products must be migrated after vendors and categories."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Store location: memory://, file://<dir> or a directory path
    #[arg(long = "store", value_name = "URI", global = true)]
    pub store_uri: Option<String>,

    /// Records per bulk write
    #[arg(short = 'b', long = "batch-size", value_name = "N", global = true)]
    pub batch_size: Option<usize>,

    /// Run each migration inside a transaction
    #[arg(long, global = true, conflicts_with = "no_transactions")]
    pub transactions: bool,

    /// Write directly, without transactions
    #[arg(long = "no-transactions", global = true)]
    pub no_transactions: bool,

    /// Do not clear target collections before writing
    #[arg(long = "keep-existing", global = true)]
    pub keep_existing: bool,

    /// Category export
    #[arg(long = "categories", value_name = "PATH", global = true)]
    pub categories_path: Option<PathBuf>,

    /// Vendor export
    #[arg(long = "vendors", value_name = "PATH", global = true)]
    pub vendors_path: Option<PathBuf>,

    /// Product export
    #[arg(long = "products", value_name = "PATH", global = true)]
    pub products_path: Option<PathBuf>,

    /// Disable periodic progress log lines
    #[arg(long = "no-progress", global = true)]
    pub no_progress: bool,

    /// Draw a progress bar for each batch run
    #[arg(long = "progress-bar", global = true)]
    pub progress_bar: bool,

    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true
    )]
    pub verbose: u8,

    /// Only show errors
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Migrate categories, vendors and products, in that order
    Run,
    /// Migrate categories and rebuild the category tree
    Categories,
    /// Migrate vendors
    Vendors,
    /// Migrate products (vendors and categories must already be stored)
    Products,
    /// Delete every document from every collection
    Clear,
    /// Print the stored category tree
    Tree,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    pub fn show_progress_bar(&self) -> bool {
        self.progress_bar && !self.quiet
    }

    /// `Some(true)` for --transactions, `Some(false)` for --no-transactions
    pub fn transactions_override(&self) -> Option<bool> {
        if self.transactions {
            Some(true)
        } else if self.no_transactions {
            Some(false)
        } else {
            None
        }
    }

    /// Overlay the command-line options on `config`
    pub fn apply_to(&self, mut config: AppConfig) -> AppConfig {
        if let Some(uri) = &self.store_uri {
            config = config.with_store_uri(uri.clone());
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        if let Some(enabled) = self.transactions_override() {
            config = config.with_transactions(enabled);
        }
        if let Some(path) = &self.categories_path {
            config = config.with_categories_path(path);
        }
        if let Some(path) = &self.vendors_path {
            config = config.with_vendors_path(path);
        }
        if let Some(path) = &self.products_path {
            config = config.with_products_path(path);
        }
        if self.no_progress {
            config = config.with_progress(false);
        }
        config
    }
}
