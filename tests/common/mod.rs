//! Shared fixtures for integration tests

#![allow(dead_code)]

use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ordercache::model::{Item, Order};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap()
}

/// Producer-style order payload as raw JSON
pub fn order_json(uid: &str) -> serde_json::Value {
    serde_json::json!({
        "order_uid": uid,
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": uid,
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [{
            "chrt_id": 9934930,
            "track_number": "WBILMTESTTRACK",
            "price": 453,
            "rid": "ab4219087a764ae0btest",
            "name": "Mascaras",
            "sale": 30,
            "size": "0",
            "total_price": 317,
            "nm_id": 2389212,
            "brand": "Vivienne Sabo",
            "status": 202
        }],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    })
}

pub fn order(uid: &str) -> Order {
    serde_json::from_value(order_json(uid)).expect("fixture decodes")
}

/// Order created `minutes` after the base time
pub fn order_at(uid: &str, minutes: i64) -> Order {
    let mut order = order(uid);
    order.date_created = base_time() + Duration::minutes(minutes);
    order
}

pub fn payload(order: &Order) -> Bytes {
    Bytes::from(serde_json::to_vec(order).expect("order encodes"))
}

/// Order with `count` distinct items
pub fn order_with_items(uid: &str, count: usize) -> Order {
    let mut order = order(uid);
    let template = order.items[0].clone();
    order.items = (0..count)
        .map(|i| Item {
            chrt_id: template.chrt_id + i as i64,
            rid: format!("{}-rid-{}", uid, i),
            ..template.clone()
        })
        .collect();
    order
}
