//! Canonical entities and the typed drafts they are built from.
//!
//! A draft holds validated, typed values but still references its parents by
//! natural key. The loader turns a draft into a [`CanonicalEntity`] only once
//! every parent has a surrogate key.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::source::RecordRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Customer,
    Product,
    Order,
    OrderItem,
}

impl EntityType {
    /// Dependency order: parents always precede children.
    pub const LOAD_ORDER: [EntityType; 4] =
        [Self::Customer, Self::Product, Self::Order, Self::OrderItem];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Product => "product",
            Self::Order => "order",
            Self::OrderItem => "order_item",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            Self::Customer => "customers",
            Self::Product => "products",
            Self::Order => "orders",
            Self::OrderItem => "order_items",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-internal integer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurrogateKey(pub u64);

impl SurrogateKey {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurrogateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_key: SurrogateKey,
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub registration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_key: SurrogateKey,
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub price: Decimal,
    pub stock_quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_key: SurrogateKey,
    pub transaction_id: String,
    pub customer_key: SurrogateKey,
    pub order_date: NaiveDate,
    pub total_amount: Decimal,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_item_key: SurrogateKey,
    pub line_id: String,
    pub order_key: SurrogateKey,
    pub product_key: SurrogateKey,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// A fully validated record ready for the store. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum CanonicalEntity {
    Customer(Customer),
    Product(Product),
    Order(Order),
    OrderItem(OrderItem),
}

impl CanonicalEntity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Customer(_) => EntityType::Customer,
            Self::Product(_) => EntityType::Product,
            Self::Order(_) => EntityType::Order,
            Self::OrderItem(_) => EntityType::OrderItem,
        }
    }

    pub fn key(&self) -> SurrogateKey {
        match self {
            Self::Customer(customer) => customer.customer_key,
            Self::Product(product) => product.product_key,
            Self::Order(order) => order.order_key,
            Self::OrderItem(item) => item.order_item_key,
        }
    }

    pub fn natural_key(&self) -> &str {
        match self {
            Self::Customer(customer) => &customer.customer_id,
            Self::Product(product) => &product.product_id,
            Self::Order(order) => &order.transaction_id,
            Self::OrderItem(item) => &item.line_id,
        }
    }

    /// Surrogate keys this entity points at, with the parent type.
    pub fn references(&self) -> Vec<(EntityType, SurrogateKey)> {
        match self {
            Self::Customer(_) | Self::Product(_) => Vec::new(),
            Self::Order(order) => vec![(EntityType::Customer, order.customer_key)],
            Self::OrderItem(item) => vec![
                (EntityType::Order, item.order_key),
                (EntityType::Product, item.product_key),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerDraft {
    pub origin: RecordRef,
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub registration_date: Option<NaiveDate>,
}

impl CustomerDraft {
    pub fn into_entity(self, customer_key: SurrogateKey) -> Customer {
        Customer {
            customer_key,
            customer_id: self.customer_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            city: self.city,
            registration_date: self.registration_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub origin: RecordRef,
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub price: Decimal,
    pub stock_quantity: u32,
}

impl ProductDraft {
    pub fn into_entity(self, product_key: SurrogateKey) -> Product {
        Product {
            product_key,
            product_id: self.product_id,
            product_name: self.product_name,
            category: self.category,
            price: self.price,
            stock_quantity: self.stock_quantity,
        }
    }
}

/// One cleaned sales row: a single product line of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesLine {
    pub origin: RecordRef,
    pub transaction_id: String,
    pub customer_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub transaction_date: NaiveDate,
    pub status: String,
}

impl SalesLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    /// First sales line of the transaction.
    pub origin: RecordRef,
    pub transaction_id: String,
    pub customer_id: String,
    pub order_date: NaiveDate,
    pub total_amount: Decimal,
    pub status: String,
}

impl OrderDraft {
    pub fn into_entity(self, order_key: SurrogateKey, customer_key: SurrogateKey) -> Order {
        Order {
            order_key,
            transaction_id: self.transaction_id,
            customer_key,
            order_date: self.order_date,
            total_amount: self.total_amount,
            status: self.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemDraft {
    pub origin: RecordRef,
    /// `<transaction_id>|<product_id>`.
    pub line_id: String,
    pub transaction_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl OrderItemDraft {
    pub fn into_entity(
        self,
        order_item_key: SurrogateKey,
        order_key: SurrogateKey,
        product_key: SurrogateKey,
    ) -> OrderItem {
        OrderItem {
            order_item_key,
            line_id: self.line_id,
            order_key,
            product_key,
            quantity: self.quantity,
            unit_price: self.unit_price,
            subtotal: self.subtotal,
        }
    }
}
