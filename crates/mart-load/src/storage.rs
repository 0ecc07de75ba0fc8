//! The storage capability the loader writes through, and an in-memory store.

use std::collections::BTreeMap;

use tracing::trace;

use mart_model::{CanonicalEntity, Customer, EntityType, Order, OrderItem, Product, SurrogateKey};

/// Result of a single insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A referenced row does not exist; retrying cannot help.
    FkViolation(String),
    /// The attempt failed for a reason that may clear up.
    Transient(String),
}

/// Insert-or-reject access to the destination tables.
pub trait Storage {
    /// Insert `entity`, replacing any row with the same surrogate key.
    fn insert_or_reject(&mut self, entity: &CanonicalEntity) -> InsertOutcome;

    /// `(natural key, surrogate key)` pairs already stored for `entity`.
    fn existing_keys(&self, entity: EntityType) -> Vec<(String, SurrogateKey)>;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn insert_or_reject(&mut self, entity: &CanonicalEntity) -> InsertOutcome {
        (**self).insert_or_reject(entity)
    }

    fn existing_keys(&self, entity: EntityType) -> Vec<(String, SurrogateKey)> {
        (**self).existing_keys(entity)
    }
}

/// FK-enforcing tables held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryStore {
    customers: BTreeMap<SurrogateKey, Customer>,
    products: BTreeMap<SurrogateKey, Product>,
    orders: BTreeMap<SurrogateKey, Order>,
    order_items: BTreeMap<SurrogateKey, OrderItem>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, entity: EntityType, key: SurrogateKey) -> bool {
        match entity {
            EntityType::Customer => self.customers.contains_key(&key),
            EntityType::Product => self.products.contains_key(&key),
            EntityType::Order => self.orders.contains_key(&key),
            EntityType::OrderItem => self.order_items.contains_key(&key),
        }
    }

    pub fn row_count(&self, entity: EntityType) -> usize {
        match entity {
            EntityType::Customer => self.customers.len(),
            EntityType::Product => self.products.len(),
            EntityType::Order => self.orders.len(),
            EntityType::OrderItem => self.order_items.len(),
        }
    }

    pub fn customers(&self) -> impl Iterator<Item = &Customer> {
        self.customers.values()
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn order_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.order_items.values()
    }

    /// Every foreign key of every stored row resolves.
    pub fn is_referentially_sound(&self) -> bool {
        self.orders
            .values()
            .all(|order| self.customers.contains_key(&order.customer_key))
            && self.order_items.values().all(|item| {
                self.orders.contains_key(&item.order_key)
                    && self.products.contains_key(&item.product_key)
            })
    }
}

impl Storage for InMemoryStore {
    fn insert_or_reject(&mut self, entity: &CanonicalEntity) -> InsertOutcome {
        for (parent, key) in entity.references() {
            if !self.contains(parent, key) {
                return InsertOutcome::FkViolation(format!("no {parent} with key {key}"));
            }
        }
        trace!(entity = %entity.entity_type(), key = %entity.key(), "stored row");
        match entity {
            CanonicalEntity::Customer(customer) => {
                self.customers.insert(customer.customer_key, customer.clone());
            }
            CanonicalEntity::Product(product) => {
                self.products.insert(product.product_key, product.clone());
            }
            CanonicalEntity::Order(order) => {
                self.orders.insert(order.order_key, order.clone());
            }
            CanonicalEntity::OrderItem(item) => {
                self.order_items.insert(item.order_item_key, item.clone());
            }
        }
        InsertOutcome::Inserted
    }

    fn existing_keys(&self, entity: EntityType) -> Vec<(String, SurrogateKey)> {
        match entity {
            EntityType::Customer => self
                .customers
                .values()
                .map(|c| (c.customer_id.clone(), c.customer_key))
                .collect(),
            EntityType::Product => self
                .products
                .values()
                .map(|p| (p.product_id.clone(), p.product_key))
                .collect(),
            EntityType::Order => self
                .orders
                .values()
                .map(|o| (o.transaction_id.clone(), o.order_key))
                .collect(),
            EntityType::OrderItem => self
                .order_items
                .values()
                .map(|i| (i.line_id.clone(), i.order_item_key))
                .collect(),
        }
    }
}
