use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use vela_shared::{DispatchStatus, Network, Order, OrderStatus};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Order data access.
///
/// `transition_status` is the serialization point of the whole system: it is
/// a single conditional update keyed by order id, so a late-arriving poll
/// result against an order that already reached a terminal state is a safe
/// no-op rather than an error. No other locking is required across the
/// dispatch path and the two schedulers.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;

    /// Persist the outcome of a dispatch attempt. The provider reference is
    /// written only when the attempt produced one.
    async fn record_dispatch(
        &self,
        id: Uuid,
        dispatch_status: DispatchStatus,
        provider_reference: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Conditionally move the order to `to` if its current status is one of
    /// `from`. Returns whether the update applied.
    async fn transition_status(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool, RepositoryError>;

    /// Orders eligible for reconciliation polling: still pending/processing,
    /// dispatched successfully, carrying a provider reference, on one of the
    /// given networks.
    async fn list_awaiting_confirmation(
        &self,
        networks: &[Network],
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Orders eligible for fallback completion: still pending/processing on
    /// one of the given networks, created at or before the cutoff.
    async fn list_stale(
        &self,
        networks: &[Network],
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError>;
}
