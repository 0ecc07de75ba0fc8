//! Loader behaviour against the in-memory store and a flaky wrapper.

use std::fs;
use std::time::Duration;

use chrono::NaiveDate;
use mart_load::{
    InMemoryStore, InsertOutcome, LoadError, ReferentialLoader, RetryPolicy, Storage,
    export_tables,
};
use mart_model::{
    CanonicalEntity, CustomerDraft, EntityType, IssueKind, OrderDraft, OrderItemDraft,
    ProductDraft, RecordRef, SourceKind, StageOutput, SurrogateKey, TerminalState,
};
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Fails the first `failures` inserts transiently.
struct FlakyStore {
    inner: InMemoryStore,
    failures: u32,
    attempts: u32,
}

impl FlakyStore {
    fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryStore::new(),
            failures,
            attempts: 0,
        }
    }
}

impl Storage for FlakyStore {
    fn insert_or_reject(&mut self, entity: &CanonicalEntity) -> InsertOutcome {
        self.attempts += 1;
        if self.failures > 0 {
            self.failures -= 1;
            return InsertOutcome::Transient("connection reset".to_string());
        }
        self.inner.insert_or_reject(entity)
    }

    fn existing_keys(&self, entity: EntityType) -> Vec<(String, SurrogateKey)> {
        self.inner.existing_keys(entity)
    }
}

/// Fails every insert of one customer transiently.
struct UnreachableCustomer {
    inner: InMemoryStore,
    customer_id: &'static str,
}

impl Storage for UnreachableCustomer {
    fn insert_or_reject(&mut self, entity: &CanonicalEntity) -> InsertOutcome {
        match entity {
            CanonicalEntity::Customer(customer) if customer.customer_id == self.customer_id => {
                InsertOutcome::Transient("connection reset".to_string())
            }
            _ => self.inner.insert_or_reject(entity),
        }
    }

    fn existing_keys(&self, entity: EntityType) -> Vec<(String, SurrogateKey)> {
        self.inner.existing_keys(entity)
    }
}

fn retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        backoff: Duration::from_millis(1),
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
}

fn customer(row: usize, id: &str) -> CustomerDraft {
    CustomerDraft {
        origin: RecordRef::new(SourceKind::Customers, row).with_natural_key(id),
        customer_id: id.to_string(),
        first_name: "Rahul".to_string(),
        last_name: "Sharma".to_string(),
        email: "rahul@example.com".to_string(),
        phone: Some("+91-9876543210".to_string()),
        city: Some("Bangalore".to_string()),
        registration_date: Some(date()),
    }
}

fn product(row: usize, id: &str) -> ProductDraft {
    ProductDraft {
        origin: RecordRef::new(SourceKind::Products, row).with_natural_key(id),
        product_id: id.to_string(),
        product_name: "Laptop".to_string(),
        category: "Electronics".to_string(),
        price: Decimal::from(45000),
        stock_quantity: 10,
    }
}

fn order(row: usize, transaction: &str, customer: &str) -> OrderDraft {
    OrderDraft {
        origin: RecordRef::new(SourceKind::Sales, row).with_natural_key(transaction),
        transaction_id: transaction.to_string(),
        customer_id: customer.to_string(),
        order_date: date(),
        total_amount: Decimal::from(45000),
        status: "Completed".to_string(),
    }
}

fn item(row: usize, transaction: &str, product: &str) -> OrderItemDraft {
    OrderItemDraft {
        origin: RecordRef::new(SourceKind::Sales, row),
        line_id: format!("{transaction}|{product}"),
        transaction_id: transaction.to_string(),
        product_id: product.to_string(),
        quantity: 1,
        unit_price: Decimal::from(45000),
        subtotal: Decimal::from(45000),
    }
}

fn load_parents<S: Storage>(loader: &mut ReferentialLoader<S>) {
    loader.load_batch(vec![customer(1, "C001")]).unwrap();
    loader.load_batch(vec![product(1, "P001")]).unwrap();
}

#[test]
fn unknown_product_is_quarantined_without_insert() {
    let mut loader = ReferentialLoader::new(InMemoryStore::new(), RetryPolicy::none());
    load_parents(&mut loader);
    loader.load_batch(vec![order(1, "T001", "C001")]).unwrap();

    let output = loader
        .load_batch(vec![item(1, "T001", "P001"), item(2, "T001", "P999")])
        .unwrap();

    assert_eq!(output.count(TerminalState::Loaded), 1);
    assert_eq!(output.count(TerminalState::Quarantined), 1);
    let issue = &output.issues[0];
    assert_eq!(issue.kind, IssueKind::Quarantined);
    assert_eq!(issue.detail, "missing parent product 'P999'");
    assert_eq!(loader.store().row_count(EntityType::OrderItem), 1);
    assert!(!loader.keys().contains(EntityType::OrderItem, "T001|P999"));
    assert!(loader.store().is_referentially_sound());
}

#[test]
fn order_for_unknown_customer_orphans_its_items() {
    let mut loader = ReferentialLoader::new(InMemoryStore::new(), RetryPolicy::none());
    load_parents(&mut loader);
    let orders = loader.load_batch(vec![order(1, "T009", "C404")]).unwrap();
    assert_eq!(orders.count(TerminalState::Quarantined), 1);

    let items = loader.load_batch(vec![item(1, "T009", "P001")]).unwrap();
    assert_eq!(items.count(TerminalState::Quarantined), 1);
    assert_eq!(items.issues[0].detail, "missing parent order 'T009'");
}

#[test]
fn transient_failures_are_retried() {
    let mut loader = ReferentialLoader::new(FlakyStore::new(2), retry(3));
    let output = loader.load_batch(vec![customer(1, "C001")]).unwrap();
    assert_eq!(output.records[0].key, SurrogateKey(1));
    assert_eq!(loader.store().attempts, 3);
}

#[test]
fn exhausted_retries_are_fatal_and_leave_no_key() {
    let mut loader = ReferentialLoader::new(FlakyStore::new(5), retry(2));
    let err = loader.load_batch(vec![customer(1, "C001")]).unwrap_err();
    assert!(matches!(
        err,
        LoadError::RetriesExhausted { attempts: 2, .. }
    ));
    assert!(loader.keys().is_empty());
}

#[test]
fn records_before_a_fatal_insert_stay_in_the_output() {
    let store = UnreachableCustomer {
        inner: InMemoryStore::new(),
        customer_id: "C002",
    };
    let mut loader = ReferentialLoader::new(store, retry(2));
    let mut output = StageOutput::new();
    let err = loader
        .load_into(
            vec![customer(1, "C001"), customer(2, "C002"), customer(3, "C003")],
            &mut output,
        )
        .unwrap_err();

    assert!(matches!(err, LoadError::RetriesExhausted { ref natural_key, .. } if natural_key == "C002"));
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].key, SurrogateKey(1));
    assert_eq!(output.count(TerminalState::Loaded), 1);
    assert_eq!(loader.store().inner.row_count(EntityType::Customer), 1);
    assert_eq!(loader.keys().len(), 1);
}

#[test]
fn rerun_reuses_stored_keys() {
    let mut loader = ReferentialLoader::new(InMemoryStore::new(), RetryPolicy::none());
    loader
        .load_batch(vec![customer(1, "C001"), customer(2, "C002")])
        .unwrap();
    let (store, _) = loader.into_parts();

    let mut rerun = ReferentialLoader::new(store, RetryPolicy::none());
    let output = rerun
        .load_batch(vec![customer(1, "c002"), customer(2, "C003")])
        .unwrap();
    let keys: Vec<_> = output.records.iter().map(|loaded| loaded.key).collect();
    assert_eq!(keys, vec![SurrogateKey(2), SurrogateKey(3)]);
    assert_eq!(rerun.store().row_count(EntityType::Customer), 3);
}

#[test]
fn exports_every_table() {
    let mut loader = ReferentialLoader::new(InMemoryStore::new(), RetryPolicy::none());
    load_parents(&mut loader);
    loader.load_batch(vec![order(1, "T001", "C001")]).unwrap();
    loader.load_batch(vec![item(1, "T001", "P001")]).unwrap();

    let dir = TempDir::new().unwrap();
    let paths = export_tables(loader.store(), &dir.path().join("out")).unwrap();
    assert_eq!(paths.len(), 4);

    let customers = fs::read_to_string(dir.path().join("out/customers.csv")).unwrap();
    let mut lines = customers.lines();
    assert_eq!(
        lines.next(),
        Some("customer_key,customer_id,first_name,last_name,email,phone,city,registration_date")
    );
    assert_eq!(
        lines.next(),
        Some("1,C001,Rahul,Sharma,rahul@example.com,+91-9876543210,Bangalore,2024-01-16")
    );

    let items = fs::read_to_string(dir.path().join("out/order_items.csv")).unwrap();
    assert!(items.lines().nth(1).unwrap().starts_with("1,T001|P001,1,1,1,45000,45000"));
}
