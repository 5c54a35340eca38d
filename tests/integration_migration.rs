//! End-to-end migrations from CSV files into a directory-backed store
//!
//! Each test writes small exports to a temporary directory, runs the
//! migrations the way the CLI does, then reopens the store from disk to
//! check what was persisted.

use catalog_migrator::error::MigrationStage;
use catalog_migrator::migration::clear_all_collections;
use catalog_migrator::models::{CategoryTree, Collection, Product};
use catalog_migrator::store::Document;
use catalog_migrator::{
    CategoryMigration, DocumentStore, Migration, MigrationOptions, MigrationRunner, MigratorError,
    ProductMigration, RunOutcome, VendorMigration, open_store,
};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const CATEGORIES_CSV: &str = "\
CATEGORY_CODE,CATEGORY_NAME,CREATE_DATE,LAST_MODIFIED_DATE
10,Hardware,20190101,20200101
1001,Tools,20190101,20200101
100101,Hammers,20190101,20200101
1002,Fasteners,20190101,00000000
20,Garden,20190101,20200101
123,Bad code,20190101,20200101
";

const VENDORS_CSV: &str = "\
VENDOR_ID,VENDOR_NAME,CREATE_DATE,LAST_MODIFIED_DATE
V1,Acme,1/15/2020,20210301
V2,Bolt Supply,20180704,20190101
,Nameless,20180704,20180704
";

const PRODUCTS_CSV: &str = "\
SKU,MANUFACTURER_PART_NO,PRODUCT_NAME,VENDOR,DESCRIPTION,ACTIVE_STATUS,DISCONTINUED,CREATED_DATE,LAST_MODIFIED_DATE,COLOR,CATEGORY_CODE
SKU-1,MPN-1,Claw hammer,V1,Steel claw hammer,Yes,No,3/1/2019,20200610,black,100101
SKU-2,,Deck screws,V2,Box of 200 screws,Yes,Yes,20190301,20200610,,1002
SKU-3,MPN-3,Mystery,V9,Unknown vendor,Yes,No,20190301,20200610,,10
SKU-4,MPN-4,Lost,V1,Unknown category,Yes,No,20190301,20200610,,9999
";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("categories.csv"), CATEGORIES_CSV).unwrap();
        fs::write(dir.path().join("vendors.csv"), VENDORS_CSV).unwrap();
        fs::write(dir.path().join("products.csv"), PRODUCTS_CSV).unwrap();
        Self { dir }
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn store_uri(&self) -> String {
        format!("file://{}", self.dir.path().join("store").display())
    }

    fn store(&self) -> Arc<dyn DocumentStore> {
        open_store(&self.store_uri()).unwrap()
    }
}

fn runner(store: Arc<dyn DocumentStore>, transactions: bool) -> MigrationRunner {
    MigrationRunner::new(
        store,
        MigrationOptions::default()
            .with_batch_size(2)
            .with_transactions(transactions),
    )
}

async fn reopen_and_find(fixture: &Fixture, collection: Collection) -> Vec<Document> {
    let store = fixture.store();
    store.connect().await.unwrap();
    let docs = store.find(collection, &[]).await.unwrap();
    store.disconnect().await.unwrap();
    docs
}

async fn run_everything(fixture: &Fixture, transactions: bool) {
    let categories = CategoryMigration::from_path(fixture.file("categories.csv"));
    let vendors = VendorMigration::from_path(fixture.file("vendors.csv"));
    let products = ProductMigration::from_path(fixture.file("products.csv"));
    let plan: [&dyn Migration; 3] = [&categories, &vendors, &products];

    let reports = runner(fixture.store(), transactions)
        .run_all(&plan)
        .await
        .unwrap();

    assert_eq!(reports.len(), 3);
    let expected = if transactions {
        RunOutcome::Committed
    } else {
        RunOutcome::Completed
    };
    assert!(reports.iter().all(|r| r.outcome == expected));
}

fn ids(docs: &[Document]) -> Vec<&str> {
    docs.iter().filter_map(|d| d["_id"].as_str()).collect()
}

#[tokio::test]
async fn test_full_migration_is_persisted() {
    let fixture = Fixture::new();
    run_everything(&fixture, true).await;

    let categories = reopen_and_find(&fixture, Collection::Categories).await;
    assert_eq!(ids(&categories), vec!["10", "1001", "100101", "1002", "20"]);

    let vendors = reopen_and_find(&fixture, Collection::Vendors).await;
    assert_eq!(ids(&vendors), vec!["V1", "V2"]);
    assert_eq!(vendors[0]["createdAt"], json!("2020-01-15T00:00:00Z"));

    let products = reopen_and_find(&fixture, Collection::Products).await;
    assert_eq!(ids(&products), vec!["SKU-1", "SKU-2"]);
    let hammer: Product = serde_json::from_value(products[0].clone()).unwrap();
    assert_eq!(hammer.vendor.name, "Acme");
    assert_eq!(hammer.category.id, "100101");
    assert_eq!(hammer.category.name, "Hammers");
    assert_eq!(hammer.color.as_deref(), Some("black"));
    let screws: Product = serde_json::from_value(products[1].clone()).unwrap();
    assert!(screws.discontinued);
    assert_eq!(screws.manufacturer_part_number, None);

    let trees = reopen_and_find(&fixture, Collection::CategoryTree).await;
    assert_eq!(trees.len(), 1);
    let tree: CategoryTree = serde_json::from_value(trees[0].clone()).unwrap();
    assert_eq!(tree.node_count(), 5);
    let roots: Vec<&str> = tree.children.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(roots, vec!["10", "20"]);
}

#[tokio::test]
async fn test_direct_writes_match_transactional_run() {
    let with_tx = Fixture::new();
    let without_tx = Fixture::new();
    run_everything(&with_tx, true).await;
    run_everything(&without_tx, false).await;

    for collection in Collection::ALL {
        assert_eq!(
            reopen_and_find(&with_tx, collection).await,
            reopen_and_find(&without_tx, collection).await,
            "{collection} differs"
        );
    }
}

#[tokio::test]
async fn test_clear_removes_every_collection() {
    let fixture = Fixture::new();
    run_everything(&fixture, false).await;

    let store = fixture.store();
    store.connect().await.unwrap();
    let cleared = clear_all_collections(store.as_ref()).await.unwrap();
    store.disconnect().await.unwrap();

    assert!(cleared.contains(&(Collection::Categories, 5)));
    assert!(cleared.contains(&(Collection::Products, 2)));
    for collection in Collection::ALL {
        assert!(reopen_and_find(&fixture, collection).await.is_empty());
    }
}

#[tokio::test]
async fn test_missing_export_fails_without_touching_earlier_collections() {
    let fixture = Fixture::new();
    run_everything(&fixture, true).await;
    fs::remove_file(fixture.file("products.csv")).unwrap();

    let products = ProductMigration::from_path(fixture.file("products.csv"));
    let err = runner(fixture.store(), true)
        .run(&products)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(MigrationStage::Execute));
    assert!(matches!(
        &err,
        MigratorError::Migration { source, .. } if matches!(**source, MigratorError::FileNotFound { .. })
    ));
    assert_eq!(reopen_and_find(&fixture, Collection::Products).await.len(), 2);
    assert_eq!(reopen_and_find(&fixture, Collection::Vendors).await.len(), 2);
}

#[tokio::test]
async fn test_unsupported_store_scheme_is_rejected() {
    let result = open_store("mongodb://localhost:27017/catalog");
    assert!(matches!(result, Err(MigratorError::Configuration { .. })));
}
