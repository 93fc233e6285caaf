use std::sync::Arc;
use uuid::Uuid;
use vela_core::notify::SmsSender;
use vela_core::provider::DispatchOutcome;
use vela_core::registry::ProviderRegistry;
use vela_core::repository::{OrderRepository, RepositoryError};
use vela_shared::{DispatchStatus, Order};

use crate::notification::complete_and_notify;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What happened to an order on its way to a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Pushed; the reconciliation poller will converge the status
    AwaitingConfirmation,
    /// Pushed to a provider that confirms at push time; already completed
    CompletedAtPush,
    /// Provider toggle is off; order parked as not_dispatched
    ProviderDisabled,
    /// No registered adapter serves this network
    NoAdapter,
    /// Provider contacted and the push failed; parked for manual retry
    Failed,
    /// No line item could be mapped; order excluded from polling
    NothingMappable,
    /// Redispatch requested for an order already in a terminal state
    AlreadyFinal,
}

/// Hands newly paid orders to their network's provider and persists the
/// outcome. Push failures park the order; the captured payment is never
/// reversed from here (refunds are an operator decision, not an automated
/// side effect of a flaky aggregator).
pub struct DispatchCoordinator {
    registry: Arc<ProviderRegistry>,
    repo: Arc<dyn OrderRepository>,
    sms: Arc<dyn SmsSender>,
}

impl DispatchCoordinator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        repo: Arc<dyn OrderRepository>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        Self {
            registry,
            repo,
            sms,
        }
    }

    /// Persist a new order, then dispatch it. Returns the stored order as
    /// mutated by the dispatch attempt.
    pub async fn create_and_dispatch(&self, order: Order) -> Result<Order, DispatchError> {
        let order_id = order.id;
        self.repo.insert_order(&order).await?;

        let disposition = self.dispatch(&order).await?;
        tracing::info!(order_id = %order_id, ?disposition, "order dispatch finished");

        self.repo
            .get_order(order_id)
            .await?
            .ok_or_else(|| DispatchError::Repository(RepositoryError::NotFound(order_id)))
    }

    /// Manual retry path for parked orders
    pub async fn redispatch(&self, order_id: Uuid) -> Result<Disposition, DispatchError> {
        let order = self
            .repo
            .get_order(order_id)
            .await?
            .ok_or(RepositoryError::NotFound(order_id))?;

        if order.status.is_terminal() {
            return Ok(Disposition::AlreadyFinal);
        }
        self.dispatch(&order).await
    }

    pub async fn dispatch(&self, order: &Order) -> Result<Disposition, DispatchError> {
        let Some(adapter) = self.registry.adapter_for(order.network) else {
            tracing::warn!(order_id = %order.id, network = %order.network, "no adapter for network");
            return Ok(Disposition::NoAdapter);
        };

        // Flag is read here, at dispatch time, so an admin toggle applies
        // to the very next order
        if self.registry.is_enabled(adapter.name()) != Some(true) {
            tracing::info!(
                order_id = %order.id,
                provider = adapter.name(),
                "provider toggled off, order parked"
            );
            return Ok(Disposition::ProviderDisabled);
        }

        match adapter.push(order).await {
            DispatchOutcome::Success { provider_reference } => {
                self.repo
                    .record_dispatch(order.id, DispatchStatus::Success, Some(&provider_reference))
                    .await?;

                if adapter.confirms_on_push() {
                    // No status channel to poll; the push response is final
                    complete_and_notify(self.repo.as_ref(), self.sms.as_ref(), order).await?;
                    Ok(Disposition::CompletedAtPush)
                } else {
                    Ok(Disposition::AwaitingConfirmation)
                }
            }
            DispatchOutcome::Failed { reason } => {
                tracing::error!(
                    order_id = %order.id,
                    provider = adapter.name(),
                    reason,
                    "push failed, order parked for retry"
                );
                self.repo
                    .record_dispatch(order.id, DispatchStatus::Failed, None)
                    .await?;
                Ok(Disposition::Failed)
            }
            DispatchOutcome::Disabled => {
                self.repo
                    .record_dispatch(order.id, DispatchStatus::Disabled, None)
                    .await?;
                Ok(Disposition::NothingMappable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{order_on, RecordingSms, StubAdapter};
    use vela_core::provider::StatusProbe;
    use vela_shared::{Network, OrderStatus};
    use vela_store::MemoryOrderRepository;

    struct Fixture {
        registry: Arc<ProviderRegistry>,
        repo: Arc<MemoryOrderRepository>,
        sms: Arc<RecordingSms>,
        adapter: Arc<StubAdapter>,
    }

    fn fixture(adapter: StubAdapter, enabled: bool) -> (Fixture, DispatchCoordinator) {
        let adapter = Arc::new(adapter);
        let mut registry = ProviderRegistry::new();
        registry.register(adapter.clone(), enabled);
        let registry = Arc::new(registry);
        let repo = Arc::new(MemoryOrderRepository::new());
        let sms = Arc::new(RecordingSms::default());
        let coordinator =
            DispatchCoordinator::new(registry.clone(), repo.clone(), sms.clone());
        (
            Fixture {
                registry,
                repo,
                sms,
                adapter,
            },
            coordinator,
        )
    }

    #[tokio::test]
    async fn test_successful_push_awaits_confirmation() {
        let (fx, coordinator) = fixture(
            StubAdapter::new(
                Network::Mtn,
                DispatchOutcome::Success {
                    provider_reference: "TX-99".to_string(),
                },
            ),
            true,
        );

        let stored = coordinator
            .create_and_dispatch(order_on(Network::Mtn))
            .await
            .unwrap();

        assert_eq!(stored.dispatch_status, DispatchStatus::Success);
        assert_eq!(stored.provider_reference.as_deref(), Some("TX-99"));
        assert_eq!(stored.status, OrderStatus::Processing);
        assert_eq!(fx.sms.count(), 0);
    }

    #[tokio::test]
    async fn test_push_confirming_provider_completes_immediately() {
        let mut adapter = StubAdapter::new(
            Network::Bigtime,
            DispatchOutcome::Success {
                provider_reference: "REF-1".to_string(),
            },
        );
        adapter.confirms_on_push = true;
        let (fx, coordinator) = fixture(adapter, true);

        let stored = coordinator
            .create_and_dispatch(order_on(Network::Bigtime))
            .await
            .unwrap();

        assert_eq!(stored.status, OrderStatus::Completed);
        assert_eq!(fx.sms.count(), 1);
    }

    #[tokio::test]
    async fn test_toggled_off_provider_parks_order_without_pushing() {
        let (fx, coordinator) = fixture(
            StubAdapter::new(
                Network::Mtn,
                DispatchOutcome::Success {
                    provider_reference: "TX-1".to_string(),
                },
            ),
            false,
        );

        let stored = coordinator
            .create_and_dispatch(order_on(Network::Mtn))
            .await
            .unwrap();

        assert_eq!(stored.dispatch_status, DispatchStatus::NotDispatched);
        assert_eq!(
            fx.adapter
                .push_calls
                .load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn test_failed_push_parks_order_in_pre_dispatch_status() {
        let (fx, coordinator) = fixture(
            StubAdapter::new(
                Network::Mtn,
                DispatchOutcome::Failed {
                    reason: "HTTP 500".to_string(),
                },
            ),
            true,
        );

        let stored = coordinator
            .create_and_dispatch(order_on(Network::Mtn))
            .await
            .unwrap();

        // payment already captured: order stays processing, never cancelled
        assert_eq!(stored.dispatch_status, DispatchStatus::Failed);
        assert_eq!(stored.status, OrderStatus::Processing);
        assert!(stored.provider_reference.is_none());
        assert_eq!(fx.sms.count(), 0);
    }

    #[tokio::test]
    async fn test_nothing_mappable_is_disabled_and_never_polled() {
        let (fx, coordinator) = fixture(
            StubAdapter::new(Network::Mtn, DispatchOutcome::Disabled),
            true,
        );

        let stored = coordinator
            .create_and_dispatch(order_on(Network::Mtn))
            .await
            .unwrap();

        assert_eq!(stored.dispatch_status, DispatchStatus::Disabled);
        assert_eq!(stored.status, OrderStatus::Processing);
        assert_eq!(fx.sms.count(), 0);

        // the reconciliation selection must never see this order
        let awaiting = fx
            .repo
            .list_awaiting_confirmation(&[Network::Mtn])
            .await
            .unwrap();
        assert!(awaiting.is_empty());
    }

    #[tokio::test]
    async fn test_redispatch_of_parked_order() {
        let (fx, coordinator) = fixture(
            StubAdapter::new(
                Network::Mtn,
                DispatchOutcome::Success {
                    provider_reference: "TX-2".to_string(),
                },
            ),
            false,
        );

        let stored = coordinator
            .create_and_dispatch(order_on(Network::Mtn))
            .await
            .unwrap();
        assert_eq!(stored.dispatch_status, DispatchStatus::NotDispatched);

        // operator re-enables the provider, then retries the parked order
        fx.registry.set_enabled("stub", true);
        let disposition = coordinator.redispatch(stored.id).await.unwrap();
        assert_eq!(disposition, Disposition::AwaitingConfirmation);

        let stored = fx.repo.get_order(stored.id).await.unwrap().unwrap();
        assert_eq!(stored.dispatch_status, DispatchStatus::Success);
    }

    #[tokio::test]
    async fn test_redispatch_of_completed_order_is_refused() {
        let (fx, coordinator) = fixture(
            StubAdapter::new(
                Network::Mtn,
                DispatchOutcome::Success {
                    provider_reference: "TX-3".to_string(),
                },
            ),
            true,
        );

        let stored = coordinator
            .create_and_dispatch(order_on(Network::Mtn))
            .await
            .unwrap();
        fx.repo
            .transition_status(stored.id, &OrderStatus::ACTIVE, OrderStatus::Completed)
            .await
            .unwrap();

        let disposition = coordinator.redispatch(stored.id).await.unwrap();
        assert_eq!(disposition, Disposition::AlreadyFinal);
        assert_eq!(
            fx.adapter
                .push_calls
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_no_adapter_for_network_parks_order() {
        let (_fx, coordinator) = fixture(
            StubAdapter::new(Network::Mtn, DispatchOutcome::Disabled),
            true,
        );

        // stub only serves MTN; a Telecel order has nowhere to go
        let stored = coordinator
            .create_and_dispatch(order_on(Network::Telecel))
            .await
            .unwrap();
        assert_eq!(stored.dispatch_status, DispatchStatus::NotDispatched);
    }

    #[tokio::test]
    async fn test_dispatched_order_is_pollable() {
        let (fx, coordinator) = fixture(
            StubAdapter::new(
                Network::Mtn,
                DispatchOutcome::Success {
                    provider_reference: "TX-4".to_string(),
                },
            ),
            true,
        );
        fx.adapter.queue_probe(StatusProbe::Reported("processing".to_string()));

        let stored = coordinator
            .create_and_dispatch(order_on(Network::Mtn))
            .await
            .unwrap();

        let awaiting = fx
            .repo
            .list_awaiting_confirmation(&[Network::Mtn])
            .await
            .unwrap();
        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0].id, stored.id);
    }
}
