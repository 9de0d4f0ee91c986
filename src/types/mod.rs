pub mod order;

pub use order::{DedupKey, Order, OrderId, OrderStatus, Params, Pincode, PARAM_KEYS};
