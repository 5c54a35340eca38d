//! Document store collaborator.
//!
//! The migration engine only needs a handful of operations from its target:
//! clear a collection, bulk upsert by id, read back ids and names, and group
//! writes into a transaction through an opaque [`Session`]. [`DocumentStore`]
//! captures exactly that; [`EmbeddedStore`] is the implementation shipped
//! with the tool.

pub mod connect;
pub mod embedded;

pub use connect::{RetryPolicy, connect_with_retry, redact_uri};
pub use embedded::EmbeddedStore;

use crate::error::{MigratorError, Result};
use crate::models::Collection;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Stored document; always a JSON object with a string `_id`
pub type Document = Value;

/// Opaque transaction handle.
///
/// Not `Clone`: a session belongs to exactly one migration run and every
/// write of that run is tagged with it.
#[derive(Debug, PartialEq, Eq)]
pub struct Session {
    id: u64,
}

impl Session {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Insert-or-update of one document keyed by id
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOp {
    pub id: String,
    pub document: Document,
}

impl UpsertOp {
    pub fn new(id: impl Into<String>, document: Document) -> Self {
        Self {
            id: id.into(),
            document,
        }
    }

    /// Serialize a model into an upsert keyed by `id`
    pub fn from_model<T: Serialize>(id: impl Into<String>, model: &T) -> Result<Self> {
        Ok(Self::new(id, serde_json::to_value(model)?))
    }
}

/// One document the store refused inside an otherwise applied bulk write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// Position of the operation in the submitted batch
    pub index: usize,
    pub cause: String,
}

/// Per-operation result of an unordered bulk upsert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteOutcome {
    /// Positions of the operations that were applied
    pub succeeded: Vec<usize>,
    pub failed: Vec<WriteFailure>,
}

impl BulkWriteOutcome {
    pub fn accepted(&self) -> usize {
        self.succeeded.len()
    }

    pub fn rejected(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Establish (or confirm) the connection; idempotent
    async fn connect(&self) -> Result<()>;

    /// Release the connection. Open sessions are discarded.
    async fn disconnect(&self) -> Result<()>;

    async fn begin_transaction(&self) -> Result<Session>;

    async fn commit(&self, session: &Session) -> Result<()>;

    async fn abort(&self, session: &Session) -> Result<()>;

    /// Remove every document; returns how many were removed
    async fn delete_all(&self, collection: Collection, session: Option<&Session>) -> Result<u64>;

    /// Unordered upsert: rejected documents do not stop the others
    async fn bulk_upsert(
        &self,
        collection: Collection,
        ops: Vec<UpsertOp>,
        session: Option<&Session>,
    ) -> Result<BulkWriteOutcome>;

    /// Committed documents, reduced to `_id` plus `projection` fields
    /// (all fields when `projection` is empty)
    async fn find(&self, collection: Collection, projection: &[&str]) -> Result<Vec<Document>>;

    async fn count(&self, collection: Collection, session: Option<&Session>) -> Result<usize>;

    /// Single upsert that fails when the store rejects the document
    async fn upsert_one(
        &self,
        collection: Collection,
        op: UpsertOp,
        session: Option<&Session>,
    ) -> Result<()> {
        let id = op.id.clone();
        let outcome = self.bulk_upsert(collection, vec![op], session).await?;
        match outcome.failed.into_iter().next() {
            Some(failure) => Err(MigratorError::database(
                format!("upsert {} into {}", id, collection),
                failure.cause,
            )),
            None => Ok(()),
        }
    }
}

/// Where a store URI points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    Directory(PathBuf),
}

impl StoreLocation {
    /// `memory://`, `file://<dir>` or a bare directory path
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(MigratorError::configuration("store URI is empty"));
        }
        if uri == "memory://" || uri == "memory" {
            return Ok(Self::Memory);
        }
        if let Some(path) = uri.strip_prefix("file://") {
            if path.is_empty() {
                return Err(MigratorError::configuration("file:// store URI has no path"));
            }
            return Ok(Self::Directory(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = uri.split_once("://") {
            return Err(MigratorError::configuration(format!(
                "unsupported store scheme '{}' (expected memory:// or file://)",
                scheme
            )));
        }
        Ok(Self::Directory(PathBuf::from(uri)))
    }
}

/// Build the store a URI refers to. Does not connect.
pub fn open_store(uri: &str) -> Result<Arc<dyn DocumentStore>> {
    let store = match StoreLocation::parse(uri)? {
        StoreLocation::Memory => EmbeddedStore::in_memory(),
        StoreLocation::Directory(dir) => EmbeddedStore::in_directory(dir),
    };
    Ok(Arc::new(store))
}
