//! Order validation
//!
//! Every rule is checked and all violations are reported together, each one
//! naming the offending field by its dotted path (`delivery.phone`,
//! `items[2].price`). A decoded order must pass [`validate`] before it is
//! persisted.

use super::order::{Delivery, Item, Order, Payment};
use std::fmt;

/// A single violated rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: &'static str,
}

/// All violations found in one order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Field paths that failed validation, in check order
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    fn push(&mut self, field: impl Into<String>, reason: &'static str) {
        self.violations.push(FieldViolation {
            field: field.into(),
            reason,
        });
    }

    fn require(&mut self, field: impl Into<String>, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "is required");
        }
    }

    fn non_negative(&mut self, field: impl Into<String>, value: i64) {
        if value < 0 {
            self.push(field, "must not be negative");
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} {}", v.field, v.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Check every field rule of an order
pub fn validate(order: &Order) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    errors.require("order_uid", &order.order_uid);
    errors.require("track_number", &order.track_number);
    errors.require("entry", &order.entry);
    errors.require("customer_id", &order.customer_id);
    errors.require("delivery_service", &order.delivery_service);
    errors.non_negative("sm_id", order.sm_id);

    validate_delivery(&order.delivery, &mut errors);
    validate_payment(&order.payment, &mut errors);
    for (i, item) in order.items.iter().enumerate() {
        validate_item(i, item, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_delivery(delivery: &Delivery, errors: &mut ValidationErrors) {
    errors.require("delivery.name", &delivery.name);
    errors.require("delivery.phone", &delivery.phone);
    errors.require("delivery.city", &delivery.city);
    errors.require("delivery.address", &delivery.address);

    if !delivery.email.is_empty() && !is_plausible_email(&delivery.email) {
        errors.push("delivery.email", "is not a valid email address");
    }
}

fn validate_payment(payment: &Payment, errors: &mut ValidationErrors) {
    errors.require("payment.transaction", &payment.transaction);
    errors.require("payment.provider", &payment.provider);

    if payment.currency.trim().is_empty() {
        errors.push("payment.currency", "is required");
    } else if payment.currency.len() != 3
        || !payment.currency.chars().all(|c| c.is_ascii_alphabetic())
    {
        errors.push("payment.currency", "must be a three-letter code");
    }

    errors.non_negative("payment.amount", payment.amount);
    errors.non_negative("payment.payment_dt", payment.payment_dt);
    errors.non_negative("payment.delivery_cost", payment.delivery_cost);
    errors.non_negative("payment.goods_total", payment.goods_total);
    errors.non_negative("payment.custom_fee", payment.custom_fee);
}

fn validate_item(index: usize, item: &Item, errors: &mut ValidationErrors) {
    let field = |name: &str| format!("items[{}].{}", index, name);

    errors.require(field("track_number"), &item.track_number);
    errors.require(field("rid"), &item.rid);
    errors.require(field("name"), &item.name);
    errors.non_negative(field("chrt_id"), item.chrt_id);
    errors.non_negative(field("price"), item.price);
    errors.non_negative(field("total_price"), item.total_price);
    errors.non_negative(field("nm_id"), item.nm_id);

    if !(0..=100).contains(&item.sale) {
        errors.push(field("sale"), "must be between 0 and 100");
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
