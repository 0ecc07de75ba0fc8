//! Splitting cleaned sales lines into order headers and order items.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::warn;

use mart_model::{OrderDraft, OrderItemDraft, SalesLine, normalize_natural_key};

/// Orders in first-appearance order, and one item per sales line.
#[derive(Debug, Clone, Default)]
pub struct SalesSplit {
    pub orders: Vec<OrderDraft>,
    pub items: Vec<OrderItemDraft>,
}

/// Natural key of an order item: `<transaction_id>|<product_id>`.
pub fn line_id(transaction_id: &str, product_id: &str) -> String {
    format!("{transaction_id}|{product_id}")
}

/// Group sales lines by transaction.
///
/// The first line of a transaction supplies the customer, date and status;
/// the order total is the sum of line subtotals. Later lines that disagree on
/// the customer are logged, not rejected.
pub fn split_sales(lines: Vec<SalesLine>) -> SalesSplit {
    let mut split = SalesSplit::default();
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();

    for line in lines {
        let subtotal = line.subtotal();
        let key = normalize_natural_key(&line.transaction_id);
        match positions.get(&key) {
            Some(&position) => {
                let order = &mut split.orders[position];
                if normalize_natural_key(&order.customer_id) != normalize_natural_key(&line.customer_id) {
                    warn!(
                        transaction_id = %order.transaction_id,
                        order_customer = %order.customer_id,
                        line_customer = %line.customer_id,
                        "sales line disagrees on customer; keeping first"
                    );
                }
                order.total_amount += subtotal;
            }
            None => {
                positions.insert(key, split.orders.len());
                split.orders.push(OrderDraft {
                    origin: line
                        .origin
                        .clone()
                        .with_natural_key(line.transaction_id.clone()),
                    transaction_id: line.transaction_id.clone(),
                    customer_id: line.customer_id.clone(),
                    order_date: line.transaction_date,
                    total_amount: subtotal,
                    status: line.status.clone(),
                });
            }
        }
        split.items.push(OrderItemDraft {
            line_id: line_id(&line.transaction_id, &line.product_id),
            origin: line.origin,
            transaction_id: line.transaction_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal,
        });
    }
    split
}
