//! Order tables shared by the store implementations
//!
//! A put is split in two steps so that a store can make the change durable
//! between them:
//!
//! 1. [`Tables::plan_put`] computes the [`Mutation`] a put would cause
//! 2. [`Tables::apply`] applies it
//!
//! A mutation records rows, not the incoming order, so replaying a log of
//! mutations rebuilds the tables regardless of the item policy in effect.

use super::{ItemPolicy, PutOutcome};
use crate::error::{Error, Result};
use crate::model::{Delivery, Item, Order, OrderHeader, Payment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rows added by one put
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub order_uid: String,
    pub header: Option<OrderHeader>,
    pub delivery: Option<Delivery>,
    pub payment: Option<Payment>,
    pub items: Vec<Item>,
}

impl Mutation {
    pub fn is_empty(&self) -> bool {
        self.header.is_none()
            && self.delivery.is_none()
            && self.payment.is_none()
            && self.items.is_empty()
    }

    pub fn outcome(&self) -> PutOutcome {
        PutOutcome {
            header_inserted: self.header.is_some(),
            delivery_inserted: self.delivery.is_some(),
            payment_inserted: self.payment.is_some(),
            items_written: self.items.len(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    orders: HashMap<String, OrderHeader>,
    delivery: HashMap<String, Delivery>,
    payment: HashMap<String, Payment>,
    items: HashMap<String, Vec<Item>>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the rows a put of `order` would add
    pub fn plan_put(&self, order: &Order, policy: ItemPolicy) -> Mutation {
        let key = order.key();

        let header = (!self.orders.contains_key(key)).then(|| order.header());
        let delivery = (!self.delivery.contains_key(key)).then(|| order.delivery.clone());
        let payment = (!self.payment.contains_key(key)).then(|| order.payment.clone());
        let items = match policy {
            ItemPolicy::Append => order.items.clone(),
            ItemPolicy::InsertIfAbsent if self.items.contains_key(key) => Vec::new(),
            ItemPolicy::InsertIfAbsent => order.items.clone(),
        };

        Mutation {
            order_uid: key.to_string(),
            header,
            delivery,
            payment,
            items,
        }
    }

    /// Apply a planned mutation
    pub fn apply(&mut self, mutation: Mutation) -> PutOutcome {
        let outcome = mutation.outcome();
        let Mutation {
            order_uid,
            header,
            delivery,
            payment,
            items,
        } = mutation;

        if let Some(header) = header {
            self.orders.entry(order_uid.clone()).or_insert(header);
        }
        if let Some(delivery) = delivery {
            self.delivery.entry(order_uid.clone()).or_insert(delivery);
        }
        if let Some(payment) = payment {
            self.payment.entry(order_uid.clone()).or_insert(payment);
        }
        self.items.entry(order_uid).or_default().extend(items);

        outcome
    }

    /// Assemble a stored order
    pub fn get(&self, key: &str) -> Result<Option<Order>> {
        let header = match self.orders.get(key) {
            Some(h) => h.clone(),
            None => return Ok(None),
        };
        let delivery = self
            .delivery
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("order {} has no delivery row", key)))?;
        let payment = self
            .payment
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("order {} has no payment row", key)))?;
        let items = self.items.get(key).cloned().unwrap_or_default();

        Ok(Some(Order::assemble(header, delivery, payment, items)))
    }

    /// Keys ordered by creation time, newest first; ties by key
    pub fn recent_keys(&self, limit: usize) -> Vec<String> {
        let mut headers: Vec<&OrderHeader> = self.orders.values().collect();
        headers.sort_by(|a, b| {
            b.date_created
                .cmp(&a.date_created)
                .then_with(|| a.order_uid.cmp(&b.order_uid))
        });
        headers
            .into_iter()
            .take(limit)
            .map(|h| h.order_uid.clone())
            .collect()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn delivery_count(&self) -> usize {
        self.delivery.len()
    }

    pub fn payment_count(&self) -> usize {
        self.payment.len()
    }

    /// Item rows stored for one key
    pub fn item_count(&self, key: &str) -> usize {
        self.items.get(key).map_or(0, Vec::len)
    }

    pub fn total_item_count(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::order::sample_order;
    use chrono::Duration;

    #[test]
    fn test_first_put_inserts_everything() {
        let mut tables = Tables::new();
        let order = sample_order("t-1");

        let outcome = tables.apply(tables.plan_put(&order, ItemPolicy::InsertIfAbsent));
        assert!(outcome.header_inserted);
        assert!(outcome.delivery_inserted);
        assert!(outcome.payment_inserted);
        assert_eq!(outcome.items_written, 1);
        assert_eq!(tables.get("t-1").unwrap(), Some(order));
    }

    #[test]
    fn test_redelivery_insert_if_absent() {
        let mut tables = Tables::new();
        let order = sample_order("t-2");

        tables.apply(tables.plan_put(&order, ItemPolicy::InsertIfAbsent));
        let mutation = tables.plan_put(&order, ItemPolicy::InsertIfAbsent);
        assert!(mutation.is_empty());

        let outcome = tables.apply(mutation);
        assert!(outcome.is_duplicate());
        assert_eq!(tables.item_count("t-2"), 1);
        assert_eq!(tables.order_count(), 1);
    }

    #[test]
    fn test_redelivery_append_duplicates_items() {
        let mut tables = Tables::new();
        let order = sample_order("t-3");

        tables.apply(tables.plan_put(&order, ItemPolicy::Append));
        let outcome = tables.apply(tables.plan_put(&order, ItemPolicy::Append));

        assert!(!outcome.header_inserted);
        assert_eq!(outcome.items_written, 1);
        assert_eq!(tables.item_count("t-3"), 2);
        assert_eq!(tables.order_count(), 1);
        assert_eq!(tables.delivery_count(), 1);
        assert_eq!(tables.payment_count(), 1);
    }

    #[test]
    fn test_redelivery_keeps_first_header() {
        let mut tables = Tables::new();
        let first = sample_order("t-4");
        let mut second = first.clone();
        second.track_number = "SECOND".to_string();

        tables.apply(tables.plan_put(&first, ItemPolicy::InsertIfAbsent));
        tables.apply(tables.plan_put(&second, ItemPolicy::InsertIfAbsent));

        let stored = tables.get("t-4").unwrap().unwrap();
        assert_eq!(stored.track_number, first.track_number);
    }

    #[test]
    fn test_missing_sub_record_is_an_error() {
        let mut tables = Tables::new();
        let order = sample_order("t-5");
        let mut mutation = tables.plan_put(&order, ItemPolicy::InsertIfAbsent);
        mutation.payment = None;
        tables.apply(mutation);

        assert!(tables.get("t-5").is_err());
        assert!(tables.get("absent").unwrap().is_none());
    }

    #[test]
    fn test_recent_keys_newest_first() {
        let mut tables = Tables::new();
        let base = sample_order("base");

        for (i, uid) in ["old", "mid", "new"].iter().enumerate() {
            let mut order = sample_order(uid);
            order.date_created = base.date_created + Duration::hours(i as i64);
            tables.apply(tables.plan_put(&order, ItemPolicy::InsertIfAbsent));
        }

        assert_eq!(tables.recent_keys(10), vec!["new", "mid", "old"]);
        assert_eq!(tables.recent_keys(2), vec!["new", "mid"]);
        assert!(tables.recent_keys(0).is_empty());
    }

    #[test]
    fn test_recent_keys_ties_by_key() {
        let mut tables = Tables::new();
        for uid in ["b", "a", "c"] {
            tables.apply(tables.plan_put(&sample_order(uid), ItemPolicy::InsertIfAbsent));
        }
        assert_eq!(tables.recent_keys(3), vec!["a", "b", "c"]);
    }
}
