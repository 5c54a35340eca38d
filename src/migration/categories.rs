//! Category migration: flat categories plus the derived category tree

use super::tree::build_category_tree;
use super::{Migration, MigrationContext};
use crate::constants::CATEGORY_TREE_ID;
use crate::error::Result;
use crate::models::{Category, CategoryRow, CategoryTree, Collection};
use crate::source::{CsvSource, Parsed, RawRecord, RecordSource};
use crate::store::UpsertOp;
use crate::validation::{is_non_empty, is_valid_category_code};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

const COLLECTIONS: [Collection; 2] = [Collection::Categories, Collection::CategoryTree];

pub struct CategoryMigration {
    source: Box<dyn RecordSource>,
}

impl CategoryMigration {
    pub fn new(source: impl RecordSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(CsvSource::new(path))
    }

    /// Read the source, keeping only categories with a valid code and a name
    pub fn parse(&self) -> Result<Parsed<Category>> {
        self.source.open()?;
        self.source.parse_with(category_from_record)
    }
}

fn category_from_record(record: RawRecord) -> Option<Category> {
    let row = CategoryRow::from(&record);
    if !is_valid_category_code(&row.code) {
        warn!("Skipping category with invalid code '{}'", row.code);
        return None;
    }
    if !is_non_empty(&row.name) {
        warn!("Skipping category {} with empty name", row.code);
        return None;
    }
    Some(Category::new(row.code, row.name.trim()))
}

#[async_trait]
impl Migration for CategoryMigration {
    fn name(&self) -> &str {
        "categories"
    }

    fn collections(&self) -> &[Collection] {
        &COLLECTIONS
    }

    async fn execute(&self, ctx: &mut MigrationContext) -> Result<()> {
        info!("Reading categories from {}", self.source.describe());
        let parsed = self.parse()?;
        {
            let stats = ctx.stats_mut(Collection::Categories);
            stats.read = parsed.read;
            stats.valid = parsed.items.len();
            stats.skipped = parsed.rejected();
        }

        ctx.clear_collection(Collection::Categories).await?;
        ctx.clear_collection(Collection::CategoryTree).await?;

        ctx.upsert_in_batches(Collection::Categories, &parsed.items, |category| {
            UpsertOp::from_model(&category.id, category)
        })
        .await?;

        let tree = CategoryTree::new(build_category_tree(&parsed.items));
        let node_count = tree.node_count();
        ctx.store()
            .upsert_one(
                Collection::CategoryTree,
                UpsertOp::from_model(CATEGORY_TREE_ID, &tree)?,
                ctx.session(),
            )
            .await?;

        let stats = ctx.stats_mut(Collection::CategoryTree);
        stats.read = node_count;
        stats.valid = node_count;
        stats.inserted += 1;
        info!(
            "Category tree stored: {} roots, {} nodes",
            tree.children.len(),
            node_count
        );
        Ok(())
    }
}
