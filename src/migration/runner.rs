//! Migration lifecycle: connect, begin, execute, commit or abort, disconnect

use super::{Migration, MigrationContext, MigrationOptions};
use crate::error::{MigrationStage, MigratorError, Result};
use crate::models::{Collection, CollectionStats};
use crate::store::{DocumentStore, RetryPolicy, connect_with_retry};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Lifecycle state of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Connected,
    TransactionOpen,
    Executing,
    Committed,
    Aborted,
    Disconnected,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Connected => "connected",
            RunState::TransactionOpen => "transaction-open",
            RunState::Executing => "executing",
            RunState::Committed => "committed",
            RunState::Aborted => "aborted",
            RunState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// How a successful run finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Writes were published by a transaction commit
    Committed,
    /// Writes were applied directly, without a transaction
    Completed,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub migration: String,
    pub outcome: RunOutcome,
    pub duration: Duration,
    pub stats: BTreeMap<Collection, CollectionStats>,
}

/// Current state of a run; transitions are logged at debug level
#[derive(Debug)]
struct StateTrail {
    migration: String,
    state: RunState,
}

impl StateTrail {
    fn new(migration: &str) -> Self {
        Self {
            migration: migration.to_string(),
            state: RunState::Idle,
        }
    }

    fn current(&self) -> RunState {
        self.state
    }

    fn enter(&mut self, next: RunState) {
        debug!(migration = %self.migration, "State {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Runs migrations against one store with one set of options
pub struct MigrationRunner {
    store: Arc<dyn DocumentStore>,
    options: MigrationOptions,
}

impl MigrationRunner {
    pub fn new(store: Arc<dyn DocumentStore>, options: MigrationOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Fresh context with an empty stats entry for every collection the
    /// migration writes, so a run that fails early still reports them
    pub fn context_for(&self, migration: &dyn Migration) -> MigrationContext {
        let mut ctx = self.context_for(migration);
        for collection in migration.collections() {
            ctx.stats_mut(*collection);
        }
        ctx
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.options.retry_attempts,
            ..RetryPolicy::default()
        }
    }

    /// Run one migration through the full lifecycle.
    ///
    /// The store is disconnected afterwards whatever the outcome. A failure
    /// is returned as [`MigratorError::Migration`] tagged with the stage it
    /// happened in.
    pub async fn run(&self, migration: &dyn Migration) -> Result<RunReport> {
        let name = migration.name().to_string();
        let started = Instant::now();
        let mut trail = StateTrail::new(&name);
        let mut ctx = self.context_for(migration);

        info!(migration = %name, "Starting {} migration", name);
        let result = self.drive(migration, &mut ctx, &mut trail).await;

        if let Err(e) = self.store.disconnect().await {
            warn!(migration = %name, "Failed to disconnect from store: {}", e);
        }
        trail.enter(RunState::Disconnected);
        let duration = started.elapsed();
        let stats = ctx.into_stats();

        match result {
            Ok(outcome) => {
                for (collection, collection_stats) in &stats {
                    info!("{}", collection_stats.summary_line(*collection));
                }
                info!(
                    migration = %name,
                    "Migration {} completed successfully in {:.2?}",
                    name,
                    duration
                );
                Ok(RunReport {
                    migration: name,
                    outcome,
                    duration,
                    stats,
                })
            }
            Err((stage, err)) => {
                error!(migration = %name, "{}", err.format_detailed());
                for (collection, collection_stats) in &stats {
                    error!("{}", collection_stats.summary_line(*collection));
                }
                error!(
                    migration = %name,
                    "Migration {} failed at {} after {:.2?}",
                    name,
                    stage,
                    duration
                );
                Err(err.at_stage(name, stage))
            }
        }
    }

    /// Run migrations in order, stopping at the first failure
    pub async fn run_all(&self, migrations: &[&dyn Migration]) -> Result<Vec<RunReport>> {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(migrations.len());
        for migration in migrations {
            reports.push(self.run(*migration).await?);
        }
        info!("All migrations completed in {:.2?}", started.elapsed());
        Ok(reports)
    }

    async fn drive(
        &self,
        migration: &dyn Migration,
        ctx: &mut MigrationContext,
        trail: &mut StateTrail,
    ) -> std::result::Result<RunOutcome, (MigrationStage, MigratorError)> {
        let target = format!("store for {} migration", migration.name());
        connect_with_retry(self.store.as_ref(), &target, &self.retry_policy())
            .await
            .map_err(|e| (MigrationStage::Connect, e))?;
        trail.enter(RunState::Connected);

        if self.options.use_transactions {
            let session = self
                .store
                .begin_transaction()
                .await
                .map_err(|e| (MigrationStage::BeginTransaction, e))?;
            debug!("Transaction {} opened", session.id());
            ctx.open_session(session);
            trail.enter(RunState::TransactionOpen);
        }

        trail.enter(RunState::Executing);
        if let Err(e) = migration.execute(ctx).await {
            self.abort(ctx, trail).await;
            return Err((MigrationStage::Execute, e));
        }

        let Some(session) = ctx.take_session() else {
            trail.enter(RunState::Committed);
            return Ok(RunOutcome::Completed);
        };

        match self.store.commit(&session).await {
            Ok(()) => {
                info!("Transaction {} committed", session.id());
                trail.enter(RunState::Committed);
                Ok(RunOutcome::Committed)
            }
            Err(e) => {
                if let Err(abort_err) = self.store.abort(&session).await {
                    debug!("Abort after failed commit: {}", abort_err);
                }
                trail.enter(RunState::Aborted);
                Err((MigrationStage::Commit, e))
            }
        }
    }

    /// Abort the open transaction, if any. Safe to call more than once.
    async fn abort(&self, ctx: &mut MigrationContext, trail: &mut StateTrail) {
        if let Some(session) = ctx.take_session() {
            match self.store.abort(&session).await {
                Ok(()) => warn!("Transaction {} aborted", session.id()),
                Err(e) => error!("Failed to abort transaction {}: {}", session.id(), e),
            }
        }
        if trail.current() != RunState::Aborted {
            trail.enter(RunState::Aborted);
        }
    }
}
