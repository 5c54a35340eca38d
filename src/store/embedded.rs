//! Embedded transactional document store.
//!
//! Collections are ordered maps from `_id` to JSON document. A session gets
//! a private copy of each collection the first time it writes to it; commit
//! publishes only those copies, so runs over disjoint collections never
//! overwrite each other. With a data directory every collection is mirrored
//! to `<dir>/<collection>.json`, replaced atomically on each publish.

use super::{BulkWriteOutcome, Document, DocumentStore, Session, UpsertOp, WriteFailure};
use crate::error::{MigratorError, Result};
use crate::models::Collection;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

type CollectionData = BTreeMap<String, Document>;

#[derive(Debug, Default)]
struct SessionState {
    workspace: HashMap<Collection, CollectionData>,
}

#[derive(Debug, Default)]
struct State {
    connected: bool,
    committed: HashMap<Collection, CollectionData>,
    sessions: HashMap<u64, SessionState>,
    next_session: u64,
}

impl State {
    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(MigratorError::NotConnected)
        }
    }

    /// Collection as seen by `session`, copied into its workspace on first use
    fn writable(
        &mut self,
        collection: Collection,
        session: Option<&Session>,
    ) -> Result<&mut CollectionData> {
        match session {
            None => Ok(self.committed.entry(collection).or_default()),
            Some(session) => {
                let state = self
                    .sessions
                    .get_mut(&session.id())
                    .ok_or_else(|| unknown_session(session))?;
                let committed = &self.committed;
                Ok(state
                    .workspace
                    .entry(collection)
                    .or_insert_with(|| committed.get(&collection).cloned().unwrap_or_default()))
            }
        }
    }

    fn readable(
        &self,
        collection: Collection,
        session: Option<&Session>,
    ) -> Result<Option<&CollectionData>> {
        if let Some(session) = session {
            let state = self
                .sessions
                .get(&session.id())
                .ok_or_else(|| unknown_session(session))?;
            if let Some(data) = state.workspace.get(&collection) {
                return Ok(Some(data));
            }
        }
        Ok(self.committed.get(&collection))
    }
}

fn unknown_session(session: &Session) -> MigratorError {
    MigratorError::transaction(format!(
        "session {} is not open (already committed or aborted)",
        session.id()
    ))
}

#[derive(Debug)]
pub struct EmbeddedStore {
    data_dir: Option<PathBuf>,
    state: Mutex<State>,
}

impl EmbeddedStore {
    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Store mirrored to JSON files under `dir`
    pub fn in_directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            state: Mutex::new(State::default()),
        }
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| MigratorError::database("lock", "store state poisoned"))
    }

    fn collection_file(dir: &Path, collection: Collection) -> PathBuf {
        dir.join(format!("{}.json", collection.name()))
    }

    fn load_all(dir: &Path) -> Result<HashMap<Collection, CollectionData>> {
        fs::create_dir_all(dir)?;
        let mut collections = HashMap::new();
        for collection in Collection::ALL {
            let path = Self::collection_file(dir, collection);
            if !path.exists() {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            let docs: Vec<Document> = serde_json::from_str(&content)?;
            let mut data = CollectionData::new();
            for doc in docs {
                match doc.get("_id").and_then(Value::as_str) {
                    Some(id) => {
                        data.insert(id.to_string(), doc);
                    }
                    None => warn!("Ignoring document without _id in {}", path.display()),
                }
            }
            debug!("Loaded {} documents from {}", data.len(), path.display());
            collections.insert(collection, data);
        }
        Ok(collections)
    }

    /// Write `data` to a temp file next to the collection file
    fn stage(dir: &Path, data: &CollectionData) -> Result<tempfile::NamedTempFile> {
        let docs: Vec<&Document> = data.values().collect();
        let bytes = serde_json::to_vec_pretty(&docs)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        Ok(tmp)
    }

    fn replace_file(dir: &Path, collection: Collection, tmp: tempfile::NamedTempFile) -> Result<()> {
        tmp.persist(Self::collection_file(dir, collection))
            .map_err(|e| MigratorError::Io(e.error))?;
        Ok(())
    }

    /// Replace the collection file with the given contents
    fn persist(&self, collection: Collection, data: &CollectionData) -> Result<()> {
        let Some(dir) = &self.data_dir else {
            return Ok(());
        };
        Self::replace_file(dir, collection, Self::stage(dir, data)?)
    }

    /// Publish a session's workspace to disk, all collections or none.
    ///
    /// Every collection is staged before the first rename. If a rename
    /// fails, files already replaced are restored from `committed`.
    fn publish(
        &self,
        workspace: &HashMap<Collection, CollectionData>,
        committed: &HashMap<Collection, CollectionData>,
    ) -> Result<()> {
        let Some(dir) = &self.data_dir else {
            return Ok(());
        };

        let mut collections: Vec<Collection> = workspace.keys().copied().collect();
        collections.sort();
        let mut staged = Vec::with_capacity(collections.len());
        for collection in collections {
            staged.push((collection, Self::stage(dir, &workspace[&collection])?));
        }

        let mut replaced = Vec::with_capacity(staged.len());
        for (collection, tmp) in staged {
            if let Err(e) = Self::replace_file(dir, collection, tmp) {
                for collection in replaced {
                    let previous = committed.get(&collection).cloned().unwrap_or_default();
                    if let Err(restore_err) = self.persist(collection, &previous) {
                        error!(
                            "Failed to restore {} after aborted commit: {}",
                            collection, restore_err
                        );
                    }
                }
                return Err(e);
            }
            replaced.push(collection);
        }
        Ok(())
    }
}

impl Default for EmbeddedStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Apply `$set` semantics: incoming top-level fields overwrite existing ones
fn merge_document(existing: &mut Document, incoming: Map<String, Value>) {
    match existing.as_object_mut() {
        Some(target) => {
            for (key, value) in incoming {
                target.insert(key, value);
            }
        }
        None => *existing = Value::Object(incoming),
    }
}

/// Reason a document cannot be stored under `op.id`, if any
fn check_op(op: &UpsertOp) -> std::result::Result<Map<String, Value>, String> {
    if op.id.trim().is_empty() {
        return Err("empty _id in upsert filter".to_string());
    }
    let Value::Object(fields) = &op.document else {
        return Err("document is not an object".to_string());
    };
    match fields.get("_id").and_then(Value::as_str) {
        Some(id) if id == op.id => Ok(fields.clone()),
        Some(id) => Err(format!("document _id '{}' does not match filter '{}'", id, op.id)),
        None => Err("document has no string _id".to_string()),
    }
}

fn project(doc: &Document, projection: &[&str]) -> Document {
    if projection.is_empty() {
        return doc.clone();
    }
    let mut out = Map::new();
    if let Some(fields) = doc.as_object() {
        for (key, value) in fields {
            if key == "_id" || projection.contains(&key.as_str()) {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(out)
}

#[async_trait]
impl DocumentStore for EmbeddedStore {
    async fn connect(&self) -> Result<()> {
        let mut state = self.state()?;
        if state.connected {
            return Ok(());
        }
        if let Some(dir) = &self.data_dir {
            state.committed = Self::load_all(dir)?;
            info!("Opened store directory {}", dir.display());
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state()?;
        if !state.connected {
            return Ok(());
        }
        if !state.sessions.is_empty() {
            warn!(
                "Discarding {} open session(s) on disconnect",
                state.sessions.len()
            );
            state.sessions.clear();
        }
        if self.data_dir.is_some() {
            // reloaded from disk on the next connect
            state.committed.clear();
        }
        state.connected = false;
        debug!("Store disconnected");
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<Session> {
        let mut state = self.state()?;
        state.ensure_connected()?;
        state.next_session += 1;
        let id = state.next_session;
        state.sessions.insert(id, SessionState::default());
        debug!("Session {} started", id);
        Ok(Session::new(id))
    }

    async fn commit(&self, session: &Session) -> Result<()> {
        let mut state = self.state()?;
        state.ensure_connected()?;
        {
            let state = &*state;
            let session_state = state
                .sessions
                .get(&session.id())
                .ok_or_else(|| unknown_session(session))?;
            // on failure the session stays open so it can still be aborted
            self.publish(&session_state.workspace, &state.committed)?;
        }

        if let Some(session_state) = state.sessions.remove(&session.id()) {
            state.committed.extend(session_state.workspace);
        }
        debug!("Session {} committed", session.id());
        Ok(())
    }

    async fn abort(&self, session: &Session) -> Result<()> {
        let mut state = self.state()?;
        state
            .sessions
            .remove(&session.id())
            .ok_or_else(|| unknown_session(session))?;
        debug!("Session {} aborted", session.id());
        Ok(())
    }

    async fn delete_all(&self, collection: Collection, session: Option<&Session>) -> Result<u64> {
        let mut state = self.state()?;
        state.ensure_connected()?;
        let data = state.writable(collection, session)?;
        let removed = data.len() as u64;
        data.clear();
        if session.is_none() {
            self.persist(collection, &CollectionData::new())?;
        }
        Ok(removed)
    }

    async fn bulk_upsert(
        &self,
        collection: Collection,
        ops: Vec<UpsertOp>,
        session: Option<&Session>,
    ) -> Result<BulkWriteOutcome> {
        let mut state = self.state()?;
        state.ensure_connected()?;
        let data = state.writable(collection, session)?;

        let mut outcome = BulkWriteOutcome::default();
        for (index, op) in ops.into_iter().enumerate() {
            match check_op(&op) {
                Ok(fields) => {
                    match data.get_mut(&op.id) {
                        Some(existing) => merge_document(existing, fields),
                        None => {
                            data.insert(op.id, Value::Object(fields));
                        }
                    }
                    outcome.succeeded.push(index);
                }
                Err(cause) => outcome.failed.push(WriteFailure { index, cause }),
            }
        }

        if session.is_none() && !outcome.succeeded.is_empty() {
            self.persist(collection, data)?;
        }
        Ok(outcome)
    }

    async fn find(&self, collection: Collection, projection: &[&str]) -> Result<Vec<Document>> {
        let state = self.state()?;
        state.ensure_connected()?;
        Ok(state
            .readable(collection, None)?
            .map(|data| data.values().map(|doc| project(doc, projection)).collect())
            .unwrap_or_default())
    }

    async fn count(&self, collection: Collection, session: Option<&Session>) -> Result<usize> {
        let state = self.state()?;
        state.ensure_connected()?;
        Ok(state
            .readable(collection, session)?
            .map(BTreeMap::len)
            .unwrap_or(0))
    }
}
