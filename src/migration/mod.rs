//! Transactional batch migration engine.
//!
//! A [`Migration`] supplies only its `execute` step. [`MigrationRunner`]
//! wraps it in the common lifecycle: connect, optionally begin a
//! transaction, execute, then commit or abort, and always disconnect.
//! Domain migrations write through [`MigrationContext::upsert_in_batches`],
//! which routes every window through the [`BatchProcessor`] and tags each
//! write with the run's session.

pub mod batch;
pub mod categories;
pub mod lookup;
pub mod products;
pub mod runner;
pub mod tree;
pub mod vendors;

#[cfg(test)]
mod tests;

pub use batch::{BatchFailure, BatchOptions, BatchProcessor, BatchReport, ProgressObserver};
pub use categories::CategoryMigration;
pub use lookup::LookupTables;
pub use products::ProductMigration;
pub use runner::{MigrationRunner, RunOutcome, RunReport, RunState};
pub use tree::build_category_tree;
pub use vendors::VendorMigration;

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::models::{Collection, CollectionStats};
use crate::store::{BulkWriteOutcome, DocumentStore, Session, UpsertOp};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One domain-specific migration step
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &str;

    /// Collections this migration writes
    fn collections(&self) -> &[Collection];

    async fn execute(&self, ctx: &mut MigrationContext) -> Result<()>;
}

/// Options resolved for one migration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    pub use_transactions: bool,
    pub clear_existing_data: bool,
    pub batch_size: usize,
    /// Connection retries at the start of each run
    pub retry_attempts: u32,
    pub report_progress: bool,
    pub progress_interval: Duration,
    pub show_progress_bar: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self::from(&MigrationConfig::default())
    }
}

impl From<&MigrationConfig> for MigrationOptions {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            use_transactions: config.use_transactions,
            clear_existing_data: true,
            batch_size: config.batch_size,
            retry_attempts: config.retry_attempts,
            report_progress: config.report_progress,
            progress_interval: config.progress_interval(),
            show_progress_bar: false,
        }
    }
}

impl MigrationOptions {
    pub fn with_transactions(mut self, enabled: bool) -> Self {
        self.use_transactions = enabled;
        self
    }

    pub fn with_clear_existing_data(mut self, enabled: bool) -> Self {
        self.clear_existing_data = enabled;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.show_progress_bar = enabled;
        self
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            batch_size: self.batch_size,
            progress_interval: self.progress_interval,
            report_progress: self.report_progress,
            show_progress_bar: self.show_progress_bar,
        }
    }
}

/// Result of writing one document inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub id: String,
    /// Store's reason for rejecting the document
    pub error: Option<String>,
}

impl WriteResult {
    pub fn is_accepted(&self) -> bool {
        self.error.is_none()
    }

    /// Pair the submitted ids with a bulk outcome
    pub fn from_outcome(ids: Vec<String>, outcome: BulkWriteOutcome) -> Vec<Self> {
        let mut causes: HashMap<usize, String> = outcome
            .failed
            .into_iter()
            .map(|failure| (failure.index, failure.cause))
            .collect();
        ids.into_iter()
            .enumerate()
            .map(|(index, id)| WriteResult {
                id,
                error: causes.remove(&index),
            })
            .collect()
    }
}

/// State shared between the runner and a migration's `execute` step
pub struct MigrationContext {
    store: Arc<dyn DocumentStore>,
    session: Option<Session>,
    options: MigrationOptions,
    stats: BTreeMap<Collection, CollectionStats>,
}

impl MigrationContext {
    pub fn new(store: Arc<dyn DocumentStore>, options: MigrationOptions) -> Self {
        Self {
            store,
            session: None,
            options,
            stats: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Session every write of this run must carry, when transactions are on
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    pub fn stats(&self) -> &BTreeMap<Collection, CollectionStats> {
        &self.stats
    }

    pub fn stats_mut(&mut self, collection: Collection) -> &mut CollectionStats {
        self.stats.entry(collection).or_default()
    }

    pub(crate) fn open_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Hand the session back for commit or abort; later calls return `None`
    pub(crate) fn take_session(&mut self) -> Option<Session> {
        self.session.take()
    }

    pub(crate) fn into_stats(self) -> BTreeMap<Collection, CollectionStats> {
        self.stats
    }

    /// Delete every document of `collection`; a no-op when existing data is kept
    pub async fn clear_collection(&self, collection: Collection) -> Result<u64> {
        if !self.options.clear_existing_data {
            info!("Keeping existing {} documents", collection);
            return Ok(0);
        }
        let removed = self.store.delete_all(collection, self.session()).await?;
        info!("Cleared {} documents from {}", removed, collection);
        Ok(removed)
    }

    /// Upsert `items` in windows of the configured batch size.
    ///
    /// Store-side rejections and failed windows are counted as rejected in
    /// the collection's stats; they do not fail the migration.
    pub async fn upsert_in_batches<T, F>(
        &mut self,
        collection: Collection,
        items: &[T],
        to_op: F,
    ) -> Result<BatchReport<WriteResult>>
    where
        T: Sync,
        F: Fn(&T) -> Result<UpsertOp> + Sync,
    {
        let processor =
            BatchProcessor::new(self.options.batch_options()).with_label(collection.name());
        let store = Arc::clone(&self.store);
        let session = self.session.as_ref();
        let to_op = &to_op;

        let report = processor
            .process(items, |batch, start, end| {
                let store = Arc::clone(&store);
                async move {
                    let ops = batch.iter().map(to_op).collect::<Result<Vec<_>>>()?;
                    let ids: Vec<String> = ops.iter().map(|op| op.id.clone()).collect();
                    let outcome = store
                        .bulk_upsert(collection, ops, session)
                        .await
                        .map_err(BatchFailure::from_store_error)?;

                    if !outcome.is_complete() {
                        warn!(
                            batch_start = start,
                            batch_end = end,
                            "{} of {} {} documents rejected by the store",
                            outcome.rejected(),
                            outcome.accepted() + outcome.rejected(),
                            collection
                        );
                    }
                    Ok::<_, BatchFailure>(WriteResult::from_outcome(ids, outcome))
                }
            })
            .await?;

        let accepted = report.results.iter().filter(|r| r.is_accepted()).count();
        let stats = self.stats_mut(collection);
        stats.inserted += accepted;
        stats.rejected += items.len() - accepted;
        info!(
            "Upserted {} of {} {} documents",
            accepted,
            items.len(),
            collection
        );
        Ok(report)
    }
}

/// Delete every document from every collection
pub async fn clear_all_collections(store: &dyn DocumentStore) -> Result<Vec<(Collection, u64)>> {
    let mut cleared = Vec::with_capacity(Collection::ALL.len());
    for collection in Collection::ALL {
        let removed = store.delete_all(collection, None).await?;
        info!("Deleted {} documents from {}", removed, collection);
        cleared.push((collection, removed));
    }
    Ok(cleared)
}
