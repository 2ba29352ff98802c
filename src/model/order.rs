//! Order aggregate and its sub-records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A complete order as received from the ingest stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    #[serde(default)]
    pub shardkey: String,
    #[serde(default)]
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub oof_shard: String,
}

/// Order tracking metadata without the sub-records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub zip: String,
    pub city: String,
    pub address: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Payment {
    pub transaction: String,
    #[serde(default)]
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: i64,
    #[serde(default)]
    pub bank: String,
    #[serde(default)]
    pub delivery_cost: i64,
    #[serde(default)]
    pub goods_total: i64,
    #[serde(default)]
    pub custom_fee: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    #[serde(default)]
    pub sale: i64,
    #[serde(default)]
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub status: i32,
}

impl Order {
    /// The cache and store key of this order
    pub fn key(&self) -> &str {
        &self.order_uid
    }

    /// Decode an order from a raw JSON payload
    pub fn from_json(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    /// Split off the header row
    pub fn header(&self) -> OrderHeader {
        OrderHeader {
            order_uid: self.order_uid.clone(),
            track_number: self.track_number.clone(),
            entry: self.entry.clone(),
            locale: self.locale.clone(),
            internal_signature: self.internal_signature.clone(),
            customer_id: self.customer_id.clone(),
            delivery_service: self.delivery_service.clone(),
            shardkey: self.shardkey.clone(),
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard.clone(),
        }
    }

    /// Rebuild a full order from its stored parts
    pub fn assemble(
        header: OrderHeader,
        delivery: Delivery,
        payment: Payment,
        items: Vec<Item>,
    ) -> Self {
        Self {
            order_uid: header.order_uid,
            track_number: header.track_number,
            entry: header.entry,
            delivery,
            payment,
            items,
            locale: header.locale,
            internal_signature: header.internal_signature,
            customer_id: header.customer_id,
            delivery_service: header.delivery_service,
            shardkey: header.shardkey,
            sm_id: header.sm_id,
            date_created: header.date_created,
            oof_shard: header.oof_shard,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_order(uid: &str) -> Order {
    use chrono::TimeZone;

    Order {
        order_uid: uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: 9934930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2389212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
        oof_shard: "1".to_string(),
    }
}
