pub mod models;
pub mod money;
pub mod pii;

pub use models::{DispatchStatus, LineItem, Network, Order, OrderStatus};
pub use pii::Masked;
