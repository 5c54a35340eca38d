//! Product migration with embedded vendor and category snapshots.
//!
//! Runs after the vendor and category migrations have committed: the lookup
//! tables are read from the store before any product row is parsed, and a
//! product whose vendor or category is not found there is dropped.

use super::lookup::LookupTables;
use super::{Migration, MigrationContext};
use crate::constants::product_columns;
use crate::dates::parse_date;
use crate::error::Result;
use crate::models::{Collection, Product, ProductRow};
use crate::source::{CsvSource, Parsed, RawRecord, RecordSource};
use crate::store::UpsertOp;
use crate::validation::{boolean_from_string, check_date, is_non_empty, is_valid_boolean_string};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

const COLLECTIONS: [Collection; 1] = [Collection::Products];

pub struct ProductMigration {
    source: Box<dyn RecordSource>,
}

impl ProductMigration {
    pub fn new(source: impl RecordSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(CsvSource::new(path))
    }

    /// Read the source, resolving references against `lookups`
    pub fn parse(&self, lookups: &LookupTables) -> Result<Parsed<Product>> {
        self.source.open()?;
        self.source
            .parse_with(|record| product_from_record(record, lookups))
    }
}

/// Yes/no flag; anything else reads as `false` with a warning
fn flag(sku: &str, field: &str, value: &str) -> bool {
    if !is_valid_boolean_string(value) {
        warn!(
            "Invalid {} value '{}' for product {}, defaulting to false",
            field, value, sku
        );
        return false;
    }
    boolean_from_string(value)
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn product_from_record(record: RawRecord, lookups: &LookupTables) -> Option<Product> {
    let row = ProductRow::from(&record);

    if !is_non_empty(&row.sku) {
        warn!("Skipping product without SKU");
        return None;
    }
    let sku = row.sku.trim();
    if !is_non_empty(&row.name) || !is_non_empty(&row.description) {
        warn!("Skipping product {} with missing name or description", sku);
        return None;
    }

    let Some(vendor) = lookups.vendor(row.vendor.trim()) else {
        warn!("Skipping product {}: vendor '{}' not found", sku, row.vendor);
        return None;
    };
    let Some(category) = lookups.category(row.category_code.trim()) else {
        warn!(
            "Skipping product {}: category '{}' not found",
            sku, row.category_code
        );
        return None;
    };

    for (field, value) in [
        (product_columns::CREATED_DATE, &row.created_date),
        (product_columns::LAST_MODIFIED_DATE, &row.last_modified_date),
    ] {
        if let Err(e) = check_date(field, value) {
            warn!("{} for product {}", e, sku);
        }
    }

    Some(Product {
        sku: sku.to_string(),
        manufacturer_part_number: optional(&row.manufacturer_part_no),
        name: row.name.trim().to_string(),
        description: row.description.trim().to_string(),
        color: optional(&row.color),
        active: flag(sku, "ACTIVE_STATUS", &row.active_status),
        discontinued: flag(sku, "DISCONTINUED", &row.discontinued),
        created_at: parse_date(&row.created_date),
        updated_at: parse_date(&row.last_modified_date),
        vendor: vendor.clone(),
        category: category.clone(),
    })
}

#[async_trait]
impl Migration for ProductMigration {
    fn name(&self) -> &str {
        "products"
    }

    fn collections(&self) -> &[Collection] {
        &COLLECTIONS
    }

    async fn execute(&self, ctx: &mut MigrationContext) -> Result<()> {
        self.source.open()?;
        let lookups = LookupTables::load(ctx.store()).await?;

        info!("Reading products from {}", self.source.describe());
        let parsed = self.parse(&lookups)?;
        {
            let stats = ctx.stats_mut(Collection::Products);
            stats.read = parsed.read;
            stats.valid = parsed.items.len();
            stats.skipped = parsed.rejected();
        }

        ctx.clear_collection(Collection::Products).await?;
        ctx.upsert_in_batches(Collection::Products, &parsed.items, |product| {
            UpsertOp::from_model(&product.sku, product)
        })
        .await?;
        Ok(())
    }
}
