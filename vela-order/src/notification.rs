use vela_core::notify::SmsSender;
use vela_core::repository::{OrderRepository, RepositoryError};
use vela_shared::money::format_ghs;
use vela_shared::{Order, OrderStatus};

/// The customer-facing completion message
pub fn completion_message(order: &Order) -> String {
    format!(
        "Your order #{} for {} to {} ({}) has been completed. Total: GHS {}",
        order.id,
        order.headline_description(),
        order.headline_beneficiary(),
        order.network,
        format_ghs(order.total_pesewas)
    )
}

/// Conditionally complete an order and notify the buyer.
///
/// The SMS fires only when this call is the one that moved the order into
/// completed; re-observations of an already-completed order never notify.
/// That single guard is what makes completion notification at-most-once
/// across the dispatch path, the reconciliation poller and the stale
/// fallback, however their runs interleave.
pub async fn complete_and_notify(
    repo: &dyn OrderRepository,
    sms: &dyn SmsSender,
    order: &Order,
) -> Result<bool, RepositoryError> {
    let applied = repo
        .transition_status(order.id, &OrderStatus::ACTIVE, OrderStatus::Completed)
        .await?;

    if applied {
        tracing::info!(order_id = %order.id, network = %order.network, "order completed");
        match order.user_phone.as_deref() {
            Some(phone) => sms.send(phone, &completion_message(order)).await,
            None => tracing::debug!(order_id = %order.id, "buyer has no phone on file, skipping SMS"),
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{order_on, RecordingSms};
    use vela_shared::Network;
    use vela_store::MemoryOrderRepository;

    #[test]
    fn test_completion_message_format() {
        let order = order_on(Network::Mtn);
        let message = completion_message(&order);
        assert_eq!(
            message,
            format!(
                "Your order #{} for 5GB MTN Data to 0241234567 (MTN) has been completed. Total: GHS 25.00",
                order.id
            )
        );
    }

    #[tokio::test]
    async fn test_notification_fires_only_on_first_completion() {
        let repo = MemoryOrderRepository::new();
        let sms = RecordingSms::default();
        let order = order_on(Network::Telecel);
        repo.insert_order(&order).await.unwrap();

        assert!(complete_and_notify(&repo, &sms, &order).await.unwrap());
        assert!(!complete_and_notify(&repo, &sms, &order).await.unwrap());
        assert_eq!(sms.count(), 1);

        let (phone, _) = sms.sent.lock().unwrap()[0].clone();
        assert_eq!(phone, "0551112222");
    }

    #[tokio::test]
    async fn test_no_phone_no_sms_but_order_completes() {
        let repo = MemoryOrderRepository::new();
        let sms = RecordingSms::default();
        let mut order = order_on(Network::Mtn);
        order.user_phone = None;
        repo.insert_order(&order).await.unwrap();

        assert!(complete_and_notify(&repo, &sms, &order).await.unwrap());
        assert_eq!(sms.count(), 0);
        let stored = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, vela_shared::OrderStatus::Completed);
    }
}
