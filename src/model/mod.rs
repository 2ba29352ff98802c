//! Order data model.
//!
//! An [`Order`] is the aggregate the whole service moves around: a header with
//! tracking metadata, exactly one [`Delivery`], exactly one [`Payment`] and an
//! ordered list of [`Item`]s. The durable store keeps the header and each
//! sub-record in its own table, keyed by `order_uid`:
//!
//! ```text
//! orders   (order_uid → OrderHeader)
//! delivery (order_uid → Delivery)
//! payment  (order_uid → Payment)
//! items    (order_uid → [Item])
//! ```
//!
//! Messages on the ingest stream and responses of the lookup API use the
//! same JSON shape (snake_case field names).

pub mod order;
pub mod validation;

pub use order::{Delivery, Item, Order, OrderHeader, Payment};
pub use validation::{validate, FieldViolation, ValidationErrors};
