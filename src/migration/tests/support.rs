//! Shared fixtures for migration pipeline tests

use crate::error::{MigratorError, Result};
use crate::models::Collection;
use crate::source::{MemorySource, RawRecord};
use crate::store::{
    BulkWriteOutcome, Document, DocumentStore, EmbeddedStore, Session, UpsertOp, WriteFailure,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Embedded store with injectable faults and call counters
#[derive(Default)]
pub struct FlakyStore {
    inner: EmbeddedStore,
    reject_ids: HashSet<String>,
    failing_bulk_calls: HashSet<usize>,
    fail_connect: bool,
    fail_commit: bool,
    pub connects: AtomicUsize,
    pub bulk_calls: AtomicUsize,
    pub commits: AtomicUsize,
    pub aborts: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store refuses documents with these ids
    pub fn rejecting(mut self, ids: &[&str]) -> Self {
        self.reject_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    /// These bulk calls (0-based, counted across collections) fail outright
    pub fn failing_bulk_calls(mut self, calls: &[usize]) -> Self {
        self.failing_bulk_calls = calls.iter().copied().collect();
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(MigratorError::database("connect", "connection refused"));
        }
        self.inner.connect().await
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.inner.disconnect().await
    }

    async fn begin_transaction(&self) -> Result<Session> {
        self.inner.begin_transaction().await
    }

    async fn commit(&self, session: &Session) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit {
            return Err(MigratorError::database("commit", "write conflict"));
        }
        self.inner.commit(session).await
    }

    async fn abort(&self, session: &Session) -> Result<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort(session).await
    }

    async fn delete_all(&self, collection: Collection, session: Option<&Session>) -> Result<u64> {
        self.inner.delete_all(collection, session).await
    }

    async fn bulk_upsert(
        &self,
        collection: Collection,
        ops: Vec<UpsertOp>,
        session: Option<&Session>,
    ) -> Result<BulkWriteOutcome> {
        let call = self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_bulk_calls.contains(&call) {
            return Err(MigratorError::database("bulk upsert", "socket closed"));
        }

        let mut rejected = Vec::new();
        let mut kept_positions = Vec::new();
        let mut kept = Vec::new();
        for (index, op) in ops.into_iter().enumerate() {
            if self.reject_ids.contains(&op.id) {
                rejected.push(WriteFailure {
                    index,
                    cause: format!("duplicate key {}", op.id),
                });
            } else {
                kept_positions.push(index);
                kept.push(op);
            }
        }

        let inner = self.inner.bulk_upsert(collection, kept, session).await?;
        let mut outcome = BulkWriteOutcome {
            succeeded: inner.succeeded.iter().map(|&i| kept_positions[i]).collect(),
            failed: rejected,
        };
        outcome
            .failed
            .extend(inner.failed.into_iter().map(|failure| WriteFailure {
                index: kept_positions[failure.index],
                cause: failure.cause,
            }));
        outcome.failed.sort_by_key(|failure| failure.index);
        Ok(outcome)
    }

    async fn find(&self, collection: Collection, projection: &[&str]) -> Result<Vec<Document>> {
        self.inner.find(collection, projection).await
    }

    async fn count(&self, collection: Collection, session: Option<&Session>) -> Result<usize> {
        self.inner.count(collection, session).await
    }
}

pub fn category_source(rows: &[(&str, &str)]) -> MemorySource {
    MemorySource::new(
        "categories",
        rows.iter()
            .map(|(code, name)| {
                RawRecord::new()
                    .with("CATEGORY_CODE", *code)
                    .with("CATEGORY_NAME", *name)
                    .with("CREATE_DATE", "20200101")
                    .with("LAST_MODIFIED_DATE", "20200101")
            })
            .collect(),
    )
}

pub fn vendor_source(rows: &[(&str, &str)]) -> MemorySource {
    MemorySource::new(
        "vendors",
        rows.iter()
            .map(|(id, name)| {
                RawRecord::new()
                    .with("VENDOR_ID", *id)
                    .with("VENDOR_NAME", *name)
                    .with("CREATE_DATE", "1/15/2020")
                    .with("LAST_MODIFIED_DATE", "20210301")
            })
            .collect(),
    )
}

/// Well-formed product row; override columns with [`RawRecord::with`]
pub fn product_row(sku: &str, vendor: &str, category: &str) -> RawRecord {
    RawRecord::new()
        .with("SKU", sku)
        .with("MANUFACTURER_PART_NO", format!("MPN-{sku}"))
        .with("PRODUCT_NAME", format!("Product {sku}"))
        .with("VENDOR", vendor)
        .with("DESCRIPTION", "A well described product")
        .with("ACTIVE_STATUS", "Yes")
        .with("DISCONTINUED", "No")
        .with("CREATED_DATE", "3/1/2019")
        .with("LAST_MODIFIED_DATE", "20200610")
        .with("COLOR", "")
        .with("CATEGORY_CODE", category)
}

pub fn product_source(rows: Vec<RawRecord>) -> MemorySource {
    MemorySource::new("products", rows)
}

pub fn as_store(store: &Arc<FlakyStore>) -> Arc<dyn DocumentStore> {
    Arc::clone(store) as Arc<dyn DocumentStore>
}
