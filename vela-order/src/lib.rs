pub mod dispatch;
pub mod fallback;
pub mod notification;
pub mod reconcile;

pub use dispatch::{DispatchCoordinator, DispatchError, Disposition};
pub use fallback::{FallbackPolicy, FallbackReport, StaleOrderFallback};
pub use reconcile::{ReconcileReport, ReconciliationService};
