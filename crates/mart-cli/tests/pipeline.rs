//! Whole-pipeline behaviour: accounting, ordering, re-runs and failures.

use std::fs;
use std::path::PathBuf;

use mart_cli::{CancelToken, Pipeline, PipelineError, Source, Sources};
use mart_ingest::{IngestError, discover_sources};
use mart_load::{InMemoryStore, InsertOutcome, Storage};
use mart_model::{
    CanonicalEntity, EntityType, IssueKind, PipelineConfig, RawRecord, SourceKind, SurrogateKey,
};
use proptest::prelude::*;
use tempfile::TempDir;

const CUSTOMER_COLUMNS: [&str; 7] = [
    "customer_id",
    "first_name",
    "last_name",
    "email",
    "phone",
    "city",
    "registration_date",
];
const PRODUCT_COLUMNS: [&str; 5] = ["product_id", "product_name", "category", "price", "stock_quantity"];
const SALES_COLUMNS: [&str; 7] = [
    "transaction_id",
    "customer_id",
    "product_id",
    "quantity",
    "unit_price",
    "transaction_date",
    "status",
];

fn rows(kind: SourceKind, columns: &[&str], data: &[&[&str]]) -> Vec<RawRecord> {
    data.iter()
        .enumerate()
        .map(|(index, values)| {
            RawRecord::new(kind, index + 1, columns.iter().copied().zip(values.iter().copied()))
        })
        .collect()
}

fn sources(customers: &[&[&str]], products: &[&[&str]], sales: &[&[&str]]) -> Sources {
    Sources {
        customers: Source::from_records(
            "customers_raw.csv",
            rows(SourceKind::Customers, &CUSTOMER_COLUMNS, customers),
        ),
        products: Source::from_records(
            "products_raw.csv",
            rows(SourceKind::Products, &PRODUCT_COLUMNS, products),
        ),
        sales: Source::from_records("sales_raw.csv", rows(SourceKind::Sales, &SALES_COLUMNS, sales)),
    }
}

const CUSTOMERS: &[&[&str]] = &[
    &["C001", "Rahul", "Sharma", "rahul@example.com", "9876543210", "bangalore", "15/01/2023"],
    &["C002", "Priya", "Patel", "", "+91 98765 43211", "", "2023-02-20"],
    &["C001", "Rahul", "Sharma", "rahul@example.com", "9876543210", "Bangalore", "15/01/2023"],
    &["C003", "", "Kumar", "amit@example.com", "", "Delhi", ""],
    &["C004", "Sneha", "Reddy", "sneha@example.com", "123", "hyderabad", "not a date"],
];

const PRODUCTS: &[&[&str]] = &[
    &["P001", "Laptop", "ELECTRONICS", "45000", "10"],
    &["P002", "T-Shirt", "fashion", "", "50"],
    &["P003", "Rice 5kg", "Grocery", "350", ""],
    &["P001", "Laptop", "Electronics", "45000", "10"],
];

const SALES: &[&[&str]] = &[
    &["T001", "C001", "P001", "1", "45000", "2024-01-16", "Completed"],
    &["T001", "C001", "P002", "2", "799", "2024-01-16", "Completed"],
    &["T002", "C002", "P999", "1", "100", "16/01/2024", ""],
    &["T003", "C404", "P003", "3", "350", "2024-01-18", "Completed"],
    &["T004", "C001", "P003", "0", "350", "2024-01-18", "Completed"],
    &["T001", "C001", "P001", "1", "45000", "2024-01-16", "Completed"],
];

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig::default()).unwrap()
}

#[test]
fn messy_feeds_balance_per_file() {
    let outcome = pipeline()
        .run(sources(CUSTOMERS, PRODUCTS, SALES), InMemoryStore::new())
        .unwrap();
    let report = &outcome.report;
    assert!(report.is_conserved());

    let customers = report.file(SourceKind::Customers).unwrap();
    assert_eq!(customers.processed, 5);
    assert_eq!(customers.duplicates_removed, 1);
    assert_eq!(customers.quarantined, 1);
    assert_eq!(customers.loaded, 2);

    let products = report.file(SourceKind::Products).unwrap();
    assert_eq!(products.processed, 4);
    assert_eq!(products.duplicates_removed, 1);
    assert_eq!(products.loaded, 3);
    assert_eq!(products.missing_handled, 2);

    let sales = report.file(SourceKind::Sales).unwrap();
    assert_eq!(sales.processed, 6);
    assert_eq!(sales.duplicates_removed, 1);
    // P999, unknown customer C404, and quantity 0.
    assert_eq!(sales.quarantined, 3);
    assert_eq!(sales.loaded, 2);

    assert!(outcome.store.is_referentially_sound());
    assert_eq!(outcome.store.row_count(EntityType::Order), 2);
    assert_eq!(outcome.store.row_count(EntityType::OrderItem), 2);
}

#[test]
fn duplicate_customer_keeps_first_row_and_fills_city() {
    let customers: &[&[&str]] = &[
        &["C005", "Anita", "Rao", "anita@example.com", "", "", ""],
        &["C005", "Anita", "Rao", "anita@example.com", "", "Chennai", ""],
    ];
    let outcome = pipeline()
        .run(sources(customers, &[], &[]), InMemoryStore::new())
        .unwrap();

    let customer = outcome.store.customers().next().unwrap();
    assert_eq!(customer.city.as_deref(), Some("Unknown"));
    let quality = outcome.report.file(SourceKind::Customers).unwrap();
    assert_eq!(quality.duplicates_removed, 1);
    assert_eq!(quality.missing_handled, 1);
    assert_eq!(quality.loaded, 1);
}

#[test]
fn unknown_product_is_quarantined_without_insert() {
    let outcome = pipeline()
        .run(
            sources(
                &[CUSTOMERS[0]],
                &[PRODUCTS[0]],
                &[&["T010", "C001", "P999", "1", "10", "2024-01-16", "Completed"]],
            ),
            InMemoryStore::new(),
        )
        .unwrap();

    let sales = outcome.report.file(SourceKind::Sales).unwrap();
    assert_eq!(sales.quarantined, 1);
    assert_eq!(sales.loaded, 0);
    assert_eq!(outcome.store.row_count(EntityType::OrderItem), 0);
    assert!(!outcome.keys.contains(EntityType::OrderItem, "T010|P999"));
    assert!(outcome.issues.iter().any(|issue| {
        issue.kind == IssueKind::Quarantined && issue.detail == "missing parent product 'P999'"
    }));
}

#[test]
fn identical_runs_agree() {
    let first = pipeline()
        .run(sources(CUSTOMERS, PRODUCTS, SALES), InMemoryStore::new())
        .unwrap();
    let second = pipeline()
        .run(sources(CUSTOMERS, PRODUCTS, SALES), InMemoryStore::new())
        .unwrap();
    assert_eq!(first.keys, second.keys);
    assert_eq!(first.report, second.report);
}

#[test]
fn rerun_against_loaded_store_is_idempotent() {
    let first = pipeline()
        .run(sources(CUSTOMERS, PRODUCTS, SALES), InMemoryStore::new())
        .unwrap();
    let second = pipeline()
        .run(sources(CUSTOMERS, PRODUCTS, SALES), first.store.clone())
        .unwrap();
    assert_eq!(second.store, first.store);
    assert_eq!(second.keys, first.keys);
}

#[test]
fn cancelled_run_returns_partial_report() {
    let cancel = CancelToken::new();
    let pipeline = pipeline().with_cancel_token(cancel.clone());
    cancel.cancel();
    let failure = pipeline
        .run(sources(CUSTOMERS, PRODUCTS, SALES), InMemoryStore::new())
        .unwrap_err();
    assert!(matches!(failure.error, PipelineError::Cancelled { .. }));
    assert_eq!(failure.report.files.len(), 3);
    assert_eq!(failure.report.total_loaded(), 0);
}

/// Cancels the run as soon as the first product reaches the store.
#[derive(Debug)]
struct CancelOnProduct {
    inner: InMemoryStore,
    cancel: CancelToken,
}

impl Storage for CancelOnProduct {
    fn insert_or_reject(&mut self, entity: &CanonicalEntity) -> InsertOutcome {
        if matches!(entity, CanonicalEntity::Product(_)) {
            self.cancel.cancel();
        }
        self.inner.insert_or_reject(entity)
    }

    fn existing_keys(&self, entity: EntityType) -> Vec<(String, SurrogateKey)> {
        self.inner.existing_keys(entity)
    }
}

#[test]
fn cancellation_during_product_load_keeps_loaded_parents() {
    let cancel = CancelToken::new();
    let mut store = CancelOnProduct {
        inner: InMemoryStore::new(),
        cancel: cancel.clone(),
    };
    let failure = pipeline()
        .with_cancel_token(cancel)
        .run(sources(CUSTOMERS, PRODUCTS, SALES), &mut store)
        .unwrap_err();

    assert!(matches!(failure.error, PipelineError::Cancelled { .. }));
    // The product batch in flight finishes; nothing after it starts.
    assert_eq!(failure.report.file(SourceKind::Customers).unwrap().loaded, 2);
    assert_eq!(failure.report.file(SourceKind::Products).unwrap().loaded, 3);
    assert_eq!(failure.report.file(SourceKind::Sales).unwrap().loaded, 0);
    assert_eq!(store.inner.row_count(EntityType::Order), 0);

    assert_eq!(failure.keys.len(), 5);
    assert!(
        failure
            .keys
            .iter()
            .all(|(entity, _, key)| store.inner.contains(entity, key))
    );
    assert!(store.inner.is_referentially_sound());
}

#[test]
fn unreadable_source_is_fatal() {
    let broken = Source::new(
        "sales_raw.csv",
        vec![Err(IngestError::FileNotFound {
            path: PathBuf::from("sales_raw.csv"),
        })]
        .into_iter(),
    );
    let mut sources = sources(CUSTOMERS, PRODUCTS, &[]);
    sources.sales = broken;
    let failure = pipeline().run(sources, InMemoryStore::new()).unwrap_err();
    assert!(matches!(failure.error, PipelineError::Ingest(_)));
    // Customers and products were loaded before the sales feed was read.
    assert_eq!(failure.report.file(SourceKind::Customers).unwrap().loaded, 2);
}

/// Store whose order inserts always fail transiently.
#[derive(Debug)]
struct FlakyOrders(InMemoryStore);

impl Storage for FlakyOrders {
    fn insert_or_reject(&mut self, entity: &CanonicalEntity) -> InsertOutcome {
        match entity {
            CanonicalEntity::Order(_) => InsertOutcome::Transient("lock timeout".to_string()),
            _ => self.0.insert_or_reject(entity),
        }
    }

    fn existing_keys(&self, entity: EntityType) -> Vec<(String, SurrogateKey)> {
        self.0.existing_keys(entity)
    }
}

#[test]
fn exhausted_retries_abort_the_run() {
    let mut config = PipelineConfig::default();
    config.retry.backoff_ms = 1;
    let failure = Pipeline::new(config)
        .unwrap()
        .run(sources(CUSTOMERS, PRODUCTS, SALES), FlakyOrders(InMemoryStore::new()))
        .unwrap_err();
    assert!(matches!(failure.error, PipelineError::Load(_)));
    assert_eq!(failure.report.file(SourceKind::Products).unwrap().loaded, 3);
}

/// Stores the first customer; every later customer insert fails transiently.
#[derive(Debug, Default)]
struct FirstCustomerOnly {
    inner: InMemoryStore,
    customers: usize,
}

impl Storage for FirstCustomerOnly {
    fn insert_or_reject(&mut self, entity: &CanonicalEntity) -> InsertOutcome {
        if let CanonicalEntity::Customer(_) = entity {
            if self.customers > 0 {
                return InsertOutcome::Transient("connection reset".to_string());
            }
            self.customers += 1;
        }
        self.inner.insert_or_reject(entity)
    }

    fn existing_keys(&self, entity: EntityType) -> Vec<(String, SurrogateKey)> {
        self.inner.existing_keys(entity)
    }
}

#[test]
fn exhaustion_mid_batch_reports_rows_already_stored() {
    let mut config = PipelineConfig::default();
    config.retry.backoff_ms = 1;
    let mut store = FirstCustomerOnly::default();
    let failure = Pipeline::new(config)
        .unwrap()
        .run(sources(CUSTOMERS, PRODUCTS, SALES), &mut store)
        .unwrap_err();

    assert!(matches!(failure.error, PipelineError::Load(_)));
    let customers = failure.report.file(SourceKind::Customers).unwrap();
    assert_eq!(store.inner.row_count(EntityType::Customer), 1);
    assert_eq!(customers.loaded, 1);
    assert_eq!(customers.quarantined, 1);
    // C002 never reached a terminal state.
    assert_eq!(customers.in_flight(), 1);

    assert_eq!(failure.keys.len(), 1);
    assert!(failure.keys.contains(EntityType::Customer, "C001"));
    assert!(failure.issues.iter().any(|issue| issue.kind == IssueKind::Duplicate));
}

#[test]
fn csv_feeds_load_end_to_end() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("customers_raw.csv"),
        "customer_id,first_name,last_name,email,phone,city,registration_date\n\
         C001,Rahul,Sharma,rahul@example.com,9876543210,bangalore,16/01/2024\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("products_raw.csv"),
        "product_id,product_name,category,price,stock_quantity\nP001,Laptop,ELECTRONICS,\"45,000\",10\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("sales_raw.csv"),
        "transaction_id,customer_id,product_id,quantity,unit_price,transaction_date,status\n\
         T001,C001,P001,2,45000,2024-01-16,Completed\n",
    )
    .unwrap();

    let paths = discover_sources(dir.path()).unwrap();
    let outcome = pipeline()
        .run(Sources::open(&paths).unwrap(), InMemoryStore::new())
        .unwrap();

    let customer = outcome.store.customers().next().unwrap();
    assert_eq!(customer.phone.as_deref(), Some("+91-9876543210"));
    assert_eq!(customer.registration_date.map(|d| d.to_string()).as_deref(), Some("2024-01-16"));
    let product = outcome.store.products().next().unwrap();
    assert_eq!(product.category, "Electronics");
    let order = outcome.store.orders().next().unwrap();
    assert_eq!(order.total_amount.to_string(), "90000");
    assert_eq!(outcome.report.total_loaded(), 3);
}

fn sales_row() -> impl Strategy<Value = Vec<String>> {
    (
        "T0[0-4]",
        "C00[0-3]",
        "P00[0-3]",
        prop_oneof![Just("1".to_string()), Just("0".to_string()), Just("x".to_string()), Just("".to_string())],
        prop_oneof![Just("2024-01-16".to_string()), Just("16/01/2024".to_string()), Just("bad".to_string())],
    )
        .prop_map(|(transaction, customer, product, quantity, date)| {
            vec![transaction, customer, product, quantity, "10".to_string(), date, "".to_string()]
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn accounting_is_conserved(sales in prop::collection::vec(sales_row(), 0..20)) {
        let sales: Vec<Vec<&str>> = sales
            .iter()
            .map(|row| row.iter().map(String::as_str).collect())
            .collect();
        let sales: Vec<&[&str]> = sales.iter().map(Vec::as_slice).collect();
        let outcome = pipeline()
            .run(sources(CUSTOMERS, PRODUCTS, &sales), InMemoryStore::new())
            .unwrap();
        prop_assert!(outcome.report.is_conserved());
        prop_assert!(outcome.store.is_referentially_sound());
    }
}
