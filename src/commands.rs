//! Command implementations for the catalog migrator CLI
//!
//! Resolves configuration, connects to the store once with retries, then
//! dispatches to the selected command and prints a summary.

use crate::cli::{Args, Commands};
use crate::config::AppConfig;
use crate::constants::CATEGORY_TREE_ID;
use crate::error::{MigratorError, Result};
use crate::migration::{
    CategoryMigration, Migration, MigrationOptions, MigrationRunner, ProductMigration, RunOutcome,
    RunReport, VendorMigration, clear_all_collections,
};
use crate::models::{CategoryNode, CategoryTree, Collection};
use crate::store::{DocumentStore, RetryPolicy, connect_with_retry, open_store, redact_uri};
use colored::*;
use indicatif::HumanDuration;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run the selected command
pub async fn run(args: Args) -> Result<()> {
    setup_logging(&args)?;

    let Some(command) = args.command else {
        return Err(MigratorError::configuration("no command given"));
    };

    let config = load_configuration(&args)?;
    debug!("Loaded configuration: {:?}", config);

    let store = open_store(&config.database.uri)?;
    let work = execute(command, &args, &config, Arc::clone(&store));
    run_until_interrupted(store.as_ref(), work, shutdown_signal()).await
}

/// Drive `work` until it finishes or `signal` fires.
///
/// On interrupt the store is disconnected, which discards any transaction
/// the abandoned run still had open.
pub async fn run_until_interrupted<T>(
    store: &dyn DocumentStore,
    work: impl Future<Output = Result<T>>,
    signal: impl Future<Output = ()>,
) -> Result<T> {
    tokio::select! {
        result = work => result,
        _ = signal => {
            warn!("Interrupted, releasing the store");
            disconnect(store).await;
            Err(MigratorError::interrupted("Migration interrupted by user"))
        }
    }
}

/// Resolves on the first CTRL+C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => eprintln!("\nReceived CTRL+C, shutting down..."),
        Err(e) => {
            warn!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

async fn execute(
    command: Commands,
    args: &Args,
    config: &AppConfig,
    store: Arc<dyn DocumentStore>,
) -> Result<()> {
    connect_with_retry(
        store.as_ref(),
        &config.database.uri,
        &RetryPolicy::from_config(&config.database),
    )
    .await?;

    let options = MigrationOptions::from(&config.migration)
        .with_clear_existing_data(!args.keep_existing)
        .with_progress_bar(args.show_progress_bar());
    let runner = MigrationRunner::new(Arc::clone(&store), options);
    let paths = &config.migration.paths;

    match command {
        Commands::Run => {
            let started = Instant::now();
            let categories = CategoryMigration::from_path(&paths.categories);
            let vendors = VendorMigration::from_path(&paths.vendors);
            let products = ProductMigration::from_path(&paths.products);
            let plan: [&dyn Migration; 3] = [&categories, &vendors, &products];

            for report in runner.run_all(&plan).await? {
                print_run_summary(&report);
            }
            println!(
                "\n{} in {}",
                "All migrations completed".bright_green().bold(),
                HumanDuration(started.elapsed())
            );
            Ok(())
        }
        Commands::Categories => {
            run_single(&runner, &CategoryMigration::from_path(&paths.categories)).await
        }
        Commands::Vendors => run_single(&runner, &VendorMigration::from_path(&paths.vendors)).await,
        Commands::Products => {
            run_single(&runner, &ProductMigration::from_path(&paths.products)).await
        }
        Commands::Clear => {
            let result = clear_all_collections(store.as_ref()).await;
            disconnect(store.as_ref()).await;
            print_clear_summary(&result?);
            Ok(())
        }
        Commands::Tree => {
            let result = load_tree(store.as_ref()).await;
            disconnect(store.as_ref()).await;
            match result? {
                Some(tree) => print_tree(&tree),
                None => println!("{}", "No category tree stored".bright_yellow()),
            }
            Ok(())
        }
    }
}

/// Set up structured logging based on CLI arguments
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("catalog_migrator={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| MigratorError::configuration(format!("logging setup failed: {}", e)))?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Environment first, then command-line overrides
fn load_configuration(args: &Args) -> Result<AppConfig> {
    let config = args.apply_to(AppConfig::from_env()?);
    config.validate()?;
    info!(
        "Environment {}, store {}, batch size {}, transactions {}",
        config.env,
        redact_uri(&config.database.uri),
        config.migration.batch_size,
        if config.migration.use_transactions {
            "on"
        } else {
            "off"
        }
    );
    Ok(config)
}

async fn run_single(runner: &MigrationRunner, migration: &dyn Migration) -> Result<()> {
    let report = runner.run(migration).await?;
    print_run_summary(&report);
    Ok(())
}

async fn disconnect(store: &dyn DocumentStore) {
    if let Err(e) = store.disconnect().await {
        warn!("Failed to disconnect from store: {}", e);
    }
}

async fn load_tree(store: &dyn DocumentStore) -> Result<Option<CategoryTree>> {
    let docs = store.find(Collection::CategoryTree, &[]).await?;
    docs.into_iter()
        .find(|doc| doc.get("_id").and_then(Value::as_str) == Some(CATEGORY_TREE_ID))
        .map(|doc| serde_json::from_value::<CategoryTree>(doc).map_err(MigratorError::from))
        .transpose()
}

fn print_run_summary(report: &RunReport) {
    let outcome = match report.outcome {
        RunOutcome::Committed => "committed",
        RunOutcome::Completed => "completed",
    };
    println!(
        "\n{} {} ({}, {})",
        "Migration".bright_green().bold(),
        report.migration.bright_white().bold(),
        outcome,
        HumanDuration(report.duration)
    );

    for (collection, stats) in &report.stats {
        let rejected = if stats.rejected > 0 {
            stats.rejected.to_string().bright_red().bold()
        } else {
            stats.rejected.to_string().normal()
        };
        println!(
            "  {:<14} read {:>7}  valid {:>7}  skipped {:>7}  inserted {:>7}  rejected {:>7}",
            collection.to_string().bright_cyan(),
            stats.read,
            stats.valid,
            stats.skipped,
            stats.inserted.to_string().bright_white().bold(),
            rejected
        );
    }
}

fn print_clear_summary(cleared: &[(Collection, u64)]) {
    println!("\n{}", "Cleared collections".bright_green().bold());
    for (collection, removed) in cleared {
        println!(
            "  {:<14} {} documents deleted",
            collection.to_string().bright_cyan(),
            removed
        );
    }
}

fn print_tree(tree: &CategoryTree) {
    println!(
        "{} ({} categories)",
        "Category tree".bright_green().bold(),
        tree.node_count()
    );
    print_nodes(&tree.children, 1);
}

fn print_nodes(nodes: &[CategoryNode], depth: usize) {
    for node in nodes {
        println!(
            "{}{} {}",
            "  ".repeat(depth),
            node.id.bright_yellow(),
            node.name
        );
        print_nodes(&node.children, depth + 1);
    }
}
