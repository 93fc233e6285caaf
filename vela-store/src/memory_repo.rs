use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use vela_core::repository::{OrderRepository, RepositoryError};
use vela_shared::{DispatchStatus, Network, Order, OrderStatus};

/// In-memory order store. The default runtime store when no database is
/// configured, and the store every test runs against.
pub struct MemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

impl Default for MemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn record_dispatch(
        &self,
        id: Uuid,
        dispatch_status: DispatchStatus,
        provider_reference: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        order.dispatch_status = dispatch_status;
        if let Some(reference) = provider_reference {
            order.provider_reference = Some(reference.to_string());
        }
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        if !from.contains(&order.status) {
            return Ok(false);
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_awaiting_confirmation(
        &self,
        networks: &[Network],
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| {
                OrderStatus::ACTIVE.contains(&o.status)
                    && o.dispatch_status == DispatchStatus::Success
                    && o.provider_reference.is_some()
                    && networks.contains(&o.network)
            })
            .cloned()
            .collect())
    }

    async fn list_stale(
        &self,
        networks: &[Network],
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| {
                OrderStatus::ACTIVE.contains(&o.status)
                    && networks.contains(&o.network)
                    && o.created_at <= created_before
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vela_shared::LineItem;

    fn order(network: Network) -> Order {
        let mut order = Order::new(Uuid::new_v4(), Some("0551234567".to_string()), network);
        order.add_item(LineItem::new(
            order.id,
            "Data".to_string(),
            "5GB".to_string(),
            1,
            2500,
            Some("0241234567".to_string()),
        ));
        order
    }

    #[tokio::test]
    async fn test_conditional_transition_applies_once() {
        let repo = MemoryOrderRepository::new();
        let order = order(Network::Mtn);
        repo.insert_order(&order).await.unwrap();

        let applied = repo
            .transition_status(order.id, &OrderStatus::ACTIVE, OrderStatus::Completed)
            .await
            .unwrap();
        assert!(applied);

        // a second, late-arriving transition is a no-op, not an error
        let applied = repo
            .transition_status(order.id, &OrderStatus::ACTIVE, OrderStatus::Completed)
            .await
            .unwrap();
        assert!(!applied);

        let stored = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_terminal_states_are_absorbing() {
        let repo = MemoryOrderRepository::new();
        let order = order(Network::Mtn);
        repo.insert_order(&order).await.unwrap();

        repo.transition_status(order.id, &OrderStatus::ACTIVE, OrderStatus::Cancelled)
            .await
            .unwrap();

        for target in [OrderStatus::Processing, OrderStatus::Completed] {
            let applied = repo
                .transition_status(order.id, &OrderStatus::ACTIVE, target)
                .await
                .unwrap();
            assert!(!applied, "cancelled order must not move to {target}");
        }
    }

    #[tokio::test]
    async fn test_awaiting_confirmation_selection() {
        let repo = MemoryOrderRepository::new();

        let mut confirmed = order(Network::Mtn);
        confirmed.dispatch_status = DispatchStatus::Success;
        confirmed.provider_reference = Some("TX-1".to_string());
        repo.insert_order(&confirmed).await.unwrap();

        // disabled dispatch is never polled
        let mut disabled = order(Network::Mtn);
        disabled.dispatch_status = DispatchStatus::Disabled;
        repo.insert_order(&disabled).await.unwrap();

        // no reference, nothing to poll by
        let mut no_reference = order(Network::Mtn);
        no_reference.dispatch_status = DispatchStatus::Success;
        repo.insert_order(&no_reference).await.unwrap();

        // terminal orders are out
        let mut done = order(Network::Mtn);
        done.dispatch_status = DispatchStatus::Success;
        done.provider_reference = Some("TX-2".to_string());
        done.status = OrderStatus::Completed;
        repo.insert_order(&done).await.unwrap();

        let selected = repo
            .list_awaiting_confirmation(&[Network::Mtn])
            .await
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, confirmed.id);

        let selected = repo
            .list_awaiting_confirmation(&[Network::Telecel])
            .await
            .unwrap();
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn test_stale_selection_by_age_and_network() {
        let repo = MemoryOrderRepository::new();

        let mut old_bigtime = order(Network::Bigtime);
        old_bigtime.created_at = Utc::now() - Duration::minutes(31);
        repo.insert_order(&old_bigtime).await.unwrap();

        let mut fresh_bigtime = order(Network::Bigtime);
        fresh_bigtime.created_at = Utc::now() - Duration::minutes(5);
        repo.insert_order(&fresh_bigtime).await.unwrap();

        let mut old_mtn = order(Network::Mtn);
        old_mtn.created_at = Utc::now() - Duration::minutes(90);
        repo.insert_order(&old_mtn).await.unwrap();

        let cutoff = Utc::now() - Duration::minutes(30);
        let stale = repo
            .list_stale(&[Network::Telecel, Network::Bigtime], cutoff)
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old_bigtime.id);
    }
}
