//! Cross-reference tables for product migration.
//!
//! Built from the committed vendor and category collections, so products
//! can only reference data that an earlier run already stored.

use crate::error::Result;
use crate::models::{CategoryRef, Collection, VendorRef};
use crate::store::{Document, DocumentStore};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    vendors: HashMap<String, VendorRef>,
    categories: HashMap<String, CategoryRef>,
}

impl LookupTables {
    pub fn new(vendors: Vec<VendorRef>, categories: Vec<CategoryRef>) -> Self {
        Self {
            vendors: vendors.into_iter().map(|v| (v.id.clone(), v)).collect(),
            categories: categories.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    /// Read `_id` and `name` of every stored vendor and category
    pub async fn load(store: &dyn DocumentStore) -> Result<Self> {
        let vendors: Vec<VendorRef> =
            decode_refs(Collection::Vendors, store.find(Collection::Vendors, &["name"]).await?);
        let categories: Vec<CategoryRef> = decode_refs(
            Collection::Categories,
            store.find(Collection::Categories, &["name"]).await?,
        );

        let tables = Self::new(vendors, categories);
        info!(
            "Loaded lookup tables: {} vendors, {} categories",
            tables.vendor_count(),
            tables.category_count()
        );
        Ok(tables)
    }

    pub fn vendor(&self, id: &str) -> Option<&VendorRef> {
        self.vendors.get(id)
    }

    pub fn category(&self, id: &str) -> Option<&CategoryRef> {
        self.categories.get(id)
    }

    pub fn vendor_count(&self) -> usize {
        self.vendors.len()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }
}

fn decode_refs<T: DeserializeOwned>(collection: Collection, docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<T>(doc) {
            Ok(reference) => Some(reference),
            Err(e) => {
                warn!("Ignoring malformed {} document in lookup: {}", collection, e);
                None
            }
        })
        .collect()
}
