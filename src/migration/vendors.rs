//! Vendor migration

use super::{Migration, MigrationContext};
use crate::constants::vendor_columns;
use crate::dates::parse_date;
use crate::error::Result;
use crate::models::{Collection, Vendor, VendorRow};
use crate::source::{CsvSource, Parsed, RawRecord, RecordSource};
use crate::store::UpsertOp;
use crate::validation::{check_date, is_non_empty};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

const COLLECTIONS: [Collection; 1] = [Collection::Vendors];

pub struct VendorMigration {
    source: Box<dyn RecordSource>,
}

impl VendorMigration {
    pub fn new(source: impl RecordSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(CsvSource::new(path))
    }

    pub fn parse(&self) -> Result<Parsed<Vendor>> {
        self.source.open()?;
        self.source.parse_with(vendor_from_record)
    }
}

fn vendor_from_record(record: RawRecord) -> Option<Vendor> {
    let row = VendorRow::from(&record);
    if !is_non_empty(&row.id) || !is_non_empty(&row.name) {
        warn!(
            "Skipping vendor with missing id or name (id '{}', name '{}')",
            row.id, row.name
        );
        return None;
    }

    for (field, value) in [
        (vendor_columns::CREATE_DATE, &row.create_date),
        (vendor_columns::LAST_MODIFIED_DATE, &row.last_modified_date),
    ] {
        // bad dates fall back to now; the vendor is kept
        if let Err(e) = check_date(field, value) {
            warn!("{} for vendor {}", e, row.id);
        }
    }

    Some(Vendor {
        id: row.id.trim().to_string(),
        name: row.name.trim().to_string(),
        created_at: parse_date(&row.create_date),
        updated_at: parse_date(&row.last_modified_date),
    })
}

#[async_trait]
impl Migration for VendorMigration {
    fn name(&self) -> &str {
        "vendors"
    }

    fn collections(&self) -> &[Collection] {
        &COLLECTIONS
    }

    async fn execute(&self, ctx: &mut MigrationContext) -> Result<()> {
        info!("Reading vendors from {}", self.source.describe());
        let parsed = self.parse()?;
        {
            let stats = ctx.stats_mut(Collection::Vendors);
            stats.read = parsed.read;
            stats.valid = parsed.items.len();
            stats.skipped = parsed.rejected();
        }

        ctx.clear_collection(Collection::Vendors).await?;
        ctx.upsert_in_batches(Collection::Vendors, &parsed.items, |vendor| {
            UpsertOp::from_model(&vendor.id, vendor)
        })
        .await?;
        Ok(())
    }
}
