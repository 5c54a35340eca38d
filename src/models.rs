//! Core data structures for catalog migration.
//!
//! Defines the target collections, the documents stored in them, the raw
//! source rows they are built from, and per-collection run statistics.

use crate::constants::{CATEGORY_TREE_ID, category_columns, product_columns, vendor_columns};
use crate::source::RawRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target collections owned by the document store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    Categories,
    CategoryTree,
    Vendors,
    Products,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Categories,
        Collection::CategoryTree,
        Collection::Vendors,
        Collection::Products,
    ];

    /// Name of the collection inside the store
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Categories => "categories",
            Collection::CategoryTree => "categorytrees",
            Collection::Vendors => "vendors",
            Collection::Products => "products",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flat category document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Node of the category hierarchy; children are owned by their parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including the node itself
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(CategoryNode::subtree_size).sum::<usize>()
    }
}

/// Singleton document holding the full category forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTree {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub children: Vec<CategoryNode>,
}

impl CategoryTree {
    pub fn new(children: Vec<CategoryNode>) -> Self {
        Self {
            id: CATEGORY_TREE_ID.to_string(),
            children,
        }
    }

    pub fn node_count(&self) -> usize {
        self.children.iter().map(CategoryNode::subtree_size).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Vendor snapshot embedded in a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// Category snapshot embedded in a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub sku: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_part_number: Option<String>,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub active: bool,
    pub discontinued: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub vendor: VendorRef,
    pub category: CategoryRef,
}

// =============================================================================
// Source rows
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRow {
    pub code: String,
    pub name: String,
    pub create_date: String,
    pub last_modified_date: String,
}

impl From<&RawRecord> for CategoryRow {
    fn from(record: &RawRecord) -> Self {
        Self {
            code: record.get(category_columns::CODE).to_string(),
            name: record.get(category_columns::NAME).to_string(),
            create_date: record.get(category_columns::CREATE_DATE).to_string(),
            last_modified_date: record.get(category_columns::LAST_MODIFIED_DATE).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorRow {
    pub id: String,
    pub name: String,
    pub create_date: String,
    pub last_modified_date: String,
}

impl From<&RawRecord> for VendorRow {
    fn from(record: &RawRecord) -> Self {
        Self {
            id: record.get(vendor_columns::ID).to_string(),
            name: record.get(vendor_columns::NAME).to_string(),
            create_date: record.get(vendor_columns::CREATE_DATE).to_string(),
            last_modified_date: record.get(vendor_columns::LAST_MODIFIED_DATE).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub sku: String,
    pub manufacturer_part_no: String,
    pub name: String,
    pub vendor: String,
    pub description: String,
    pub active_status: String,
    pub discontinued: String,
    pub created_date: String,
    pub last_modified_date: String,
    pub color: String,
    pub category_code: String,
}

impl From<&RawRecord> for ProductRow {
    fn from(record: &RawRecord) -> Self {
        Self {
            sku: record.get(product_columns::SKU).to_string(),
            manufacturer_part_no: record.get(product_columns::MANUFACTURER_PART_NO).to_string(),
            name: record.get(product_columns::NAME).to_string(),
            vendor: record.get(product_columns::VENDOR).to_string(),
            description: record.get(product_columns::DESCRIPTION).to_string(),
            active_status: record.get(product_columns::ACTIVE_STATUS).to_string(),
            discontinued: record.get(product_columns::DISCONTINUED).to_string(),
            created_date: record.get(product_columns::CREATED_DATE).to_string(),
            last_modified_date: record.get(product_columns::LAST_MODIFIED_DATE).to_string(),
            color: record.get(product_columns::COLOR).to_string(),
            category_code: record.get(product_columns::CATEGORY_CODE).to_string(),
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters for one collection touched by a migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Rows read from the source file
    pub read: usize,
    /// Rows that passed validation
    pub valid: usize,
    /// Rows dropped by validation
    pub skipped: usize,
    /// Documents accepted by the store
    pub inserted: usize,
    /// Documents rejected by the store or lost with a failed batch
    pub rejected: usize,
}

impl CollectionStats {
    pub fn summary_line(&self, collection: Collection) -> String {
        format!(
            "{}: read={} valid={} skipped={} inserted={} rejected={}",
            collection, self.read, self.valid, self.skipped, self.inserted, self.rejected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_name(collection.name()), Some(collection));
        }
        assert_eq!(Collection::from_name("orders"), None);
    }

    #[test]
    fn test_product_document_shape() {
        let ts = Utc.with_ymd_and_hms(2021, 3, 4, 0, 0, 0).unwrap();
        let product = Product {
            sku: "SKU-1".to_string(),
            manufacturer_part_number: None,
            name: "Widget".to_string(),
            description: "A widget".to_string(),
            color: Some("red".to_string()),
            active: true,
            discontinued: false,
            created_at: ts,
            updated_at: ts,
            vendor: VendorRef {
                id: "V1".to_string(),
                name: "Acme".to_string(),
            },
            category: CategoryRef {
                id: "1001".to_string(),
                name: "Tools".to_string(),
            },
        };

        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["_id"], json!("SKU-1"));
        assert_eq!(value["vendor"], json!({"_id": "V1", "name": "Acme"}));
        assert_eq!(value["category"]["_id"], json!("1001"));
        assert!(value.get("manufacturerPartNumber").is_none());
        assert_eq!(value["color"], json!("red"));
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_tree_node_count() {
        let mut root = CategoryNode::new("10", "Hardware");
        let mut child = CategoryNode::new("1001", "Tools");
        child.children.push(CategoryNode::new("100101", "Hammers"));
        root.children.push(child);
        root.children.push(CategoryNode::new("1002", "Fasteners"));

        let tree = CategoryTree::new(vec![root, CategoryNode::new("20", "Garden")]);
        assert_eq!(tree.id, CATEGORY_TREE_ID);
        assert_eq!(tree.node_count(), 5);
    }
}
