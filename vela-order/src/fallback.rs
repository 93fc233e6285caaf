use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use vela_core::notify::SmsSender;
use vela_core::repository::{OrderRepository, RepositoryError};
use vela_shared::Network;

use crate::notification::complete_and_notify;

/// Which networks are force-completed, and after how long.
///
/// This exists for providers whose status channel cannot be relied on: past
/// the age threshold the system assumes the bundle was delivered rather than
/// leaving the order stuck. Networks with a working status channel must stay
/// out of this set; they converge through reconciliation.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    pub networks: Vec<Network>,
    pub max_age: Duration,
}

impl FallbackPolicy {
    /// Telecel and BigTime after 30 minutes, the shipped policy
    pub fn standard() -> Self {
        Self {
            networks: vec![Network::Telecel, Network::Bigtime],
            max_age: Duration::minutes(30),
        }
    }
}

/// Counters for one fallback sweep
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackReport {
    pub examined: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Force-completes orders that out-waited their provider.
pub struct StaleOrderFallback {
    repo: Arc<dyn OrderRepository>,
    sms: Arc<dyn SmsSender>,
    policy: FallbackPolicy,
    running: Mutex<()>,
}

impl StaleOrderFallback {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        sms: Arc<dyn SmsSender>,
        policy: FallbackPolicy,
    ) -> Self {
        Self {
            repo,
            sms,
            policy,
            running: Mutex::new(()),
        }
    }

    /// One sweep. Returns None when a previous run is still in flight.
    pub async fn run_once(&self) -> Result<Option<FallbackReport>, RepositoryError> {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::warn!("fallback run still in progress, skipping this tick");
            return Ok(None);
        };

        let mut report = FallbackReport::default();
        if self.policy.networks.is_empty() {
            return Ok(Some(report));
        }

        let cutoff = Utc::now() - self.policy.max_age;
        let orders = self.repo.list_stale(&self.policy.networks, cutoff).await?;

        for order in orders {
            report.examined += 1;
            match complete_and_notify(self.repo.as_ref(), self.sms.as_ref(), &order).await {
                Ok(true) => {
                    tracing::info!(
                        order_id = %order.id,
                        network = %order.network,
                        age_mins = (Utc::now() - order.created_at).num_minutes(),
                        "auto-completed stale order"
                    );
                    report.completed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(order_id = %order.id, error = %e, "failed to complete stale order");
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            completed = report.completed,
            "fallback run finished"
        );
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{order_on, RecordingSms};
    use vela_shared::{DispatchStatus, OrderStatus};
    use vela_store::MemoryOrderRepository;

    fn service(policy: FallbackPolicy) -> (Arc<MemoryOrderRepository>, Arc<RecordingSms>, StaleOrderFallback) {
        let repo = Arc::new(MemoryOrderRepository::new());
        let sms = Arc::new(RecordingSms::default());
        let svc = StaleOrderFallback::new(repo.clone(), sms.clone(), policy);
        (repo, sms, svc)
    }

    #[tokio::test]
    async fn test_stale_bigtime_order_is_completed_with_one_sms() {
        let (repo, sms, svc) = service(FallbackPolicy::standard());

        let mut order = order_on(Network::Bigtime);
        order.dispatch_status = DispatchStatus::Success;
        order.provider_reference = Some("REF-1".to_string());
        order.created_at = Utc::now() - Duration::minutes(31);
        repo.insert_order(&order).await.unwrap();

        let report = svc.run_once().await.unwrap().unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.completed, 1);

        let stored = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
        assert_eq!(sms.count(), 1);

        // a second sweep finds nothing left to do
        let report = svc.run_once().await.unwrap().unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(sms.count(), 1);
    }

    #[tokio::test]
    async fn test_fresh_orders_are_left_alone() {
        let (repo, sms, svc) = service(FallbackPolicy::standard());

        let mut order = order_on(Network::Telecel);
        order.created_at = Utc::now() - Duration::minutes(29);
        repo.insert_order(&order).await.unwrap();

        let report = svc.run_once().await.unwrap().unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(sms.count(), 0);

        let stored = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_networks_with_a_status_channel_are_never_forced() {
        let (repo, sms, svc) = service(FallbackPolicy::standard());

        // MTN converges through reconciliation, not the fallback
        let mut order = order_on(Network::Mtn);
        order.created_at = Utc::now() - Duration::hours(3);
        repo.insert_order(&order).await.unwrap();

        let report = svc.run_once().await.unwrap().unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(sms.count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_orders_stay_cancelled() {
        let (repo, sms, svc) = service(FallbackPolicy::standard());

        let mut order = order_on(Network::Bigtime);
        order.created_at = Utc::now() - Duration::minutes(45);
        order.status = OrderStatus::Cancelled;
        repo.insert_order(&order).await.unwrap();

        let report = svc.run_once().await.unwrap().unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(sms.count(), 0);

        let stored = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_threshold_is_policy_not_a_constant() {
        let (repo, sms, svc) = service(FallbackPolicy {
            networks: vec![Network::Ishare],
            max_age: Duration::minutes(5),
        });

        let mut order = order_on(Network::Ishare);
        order.created_at = Utc::now() - Duration::minutes(6);
        repo.insert_order(&order).await.unwrap();

        let report = svc.run_once().await.unwrap().unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(sms.count(), 1);
    }
}
