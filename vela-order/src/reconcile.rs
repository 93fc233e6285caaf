use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use vela_core::notify::SmsSender;
use vela_core::provider::StatusProbe;
use vela_core::registry::ProviderRegistry;
use vela_core::repository::{OrderRepository, RepositoryError};
use vela_shared::{Order, OrderStatus};

use crate::notification::complete_and_notify;

/// Counters for one reconciliation sweep
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub polled: usize,
    pub updated: usize,
    pub completed: usize,
    pub unavailable: usize,
    pub unmapped: usize,
    pub failed: usize,
}

enum PollOutcome {
    Completed,
    Updated,
    Unchanged,
    Unmapped,
    Unavailable,
    Skipped,
}

/// Periodically converges canonical order status with provider-reported
/// status for every order still awaiting confirmation.
pub struct ReconciliationService {
    registry: Arc<ProviderRegistry>,
    repo: Arc<dyn OrderRepository>,
    sms: Arc<dyn SmsSender>,
    /// Guards against a slow run overlapping the next tick
    running: Mutex<()>,
}

impl ReconciliationService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        repo: Arc<dyn OrderRepository>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        Self {
            registry,
            repo,
            sms,
            running: Mutex::new(()),
        }
    }

    /// One sweep over the selection set. Returns None when a previous run is
    /// still in flight; the tick is dropped rather than queued so the same
    /// order is never double-processed.
    pub async fn run_once(&self) -> Result<Option<ReconcileReport>, RepositoryError> {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::warn!("reconciliation run still in progress, skipping this tick");
            return Ok(None);
        };

        let networks = self.registry.pollable_networks();
        let mut report = ReconcileReport::default();
        if networks.is_empty() {
            tracing::info!("no pollable providers enabled, nothing to reconcile");
            return Ok(Some(report));
        }

        let orders = self.repo.list_awaiting_confirmation(&networks).await?;
        tracing::debug!(count = orders.len(), "orders awaiting provider confirmation");

        for order in orders {
            report.polled += 1;
            // One bad provider response must not abort the batch
            match self.reconcile_order(&order).await {
                Ok(PollOutcome::Completed) => {
                    report.completed += 1;
                    report.updated += 1;
                }
                Ok(PollOutcome::Updated) => report.updated += 1,
                Ok(PollOutcome::Unchanged) | Ok(PollOutcome::Skipped) => {}
                Ok(PollOutcome::Unmapped) => report.unmapped += 1,
                Ok(PollOutcome::Unavailable) => report.unavailable += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(order_id = %order.id, error = %e, "failed to reconcile order");
                }
            }
        }

        tracing::info!(
            polled = report.polled,
            updated = report.updated,
            completed = report.completed,
            unavailable = report.unavailable,
            "reconciliation run finished"
        );
        Ok(Some(report))
    }

    async fn reconcile_order(&self, order: &Order) -> Result<PollOutcome, RepositoryError> {
        // Re-checked per order: a toggle mid-run stops further polling
        let Some(adapter) = self.registry.enabled_adapter_for(order.network) else {
            return Ok(PollOutcome::Skipped);
        };

        let raw = match adapter.check_status(order).await {
            StatusProbe::Reported(raw) => raw,
            StatusProbe::Unavailable => {
                tracing::debug!(order_id = %order.id, "status unavailable, will re-poll");
                return Ok(PollOutcome::Unavailable);
            }
        };

        let Some(mapped) = adapter.map_status(&raw) else {
            tracing::debug!(order_id = %order.id, raw, "unmapped external status, leaving order unchanged");
            return Ok(PollOutcome::Unmapped);
        };

        if mapped == order.status {
            return Ok(PollOutcome::Unchanged);
        }

        match mapped {
            OrderStatus::Completed => {
                if complete_and_notify(self.repo.as_ref(), self.sms.as_ref(), order).await? {
                    Ok(PollOutcome::Completed)
                } else {
                    Ok(PollOutcome::Unchanged)
                }
            }
            OrderStatus::Cancelled => {
                let applied = self
                    .repo
                    .transition_status(order.id, &OrderStatus::ACTIVE, OrderStatus::Cancelled)
                    .await?;
                if applied {
                    tracing::info!(order_id = %order.id, raw, "order cancelled by provider");
                    Ok(PollOutcome::Updated)
                } else {
                    Ok(PollOutcome::Unchanged)
                }
            }
            OrderStatus::Processing => {
                // Forward-only: pending may move to processing, nothing else
                let applied = self
                    .repo
                    .transition_status(order.id, &[OrderStatus::Pending], OrderStatus::Processing)
                    .await?;
                Ok(if applied {
                    PollOutcome::Updated
                } else {
                    PollOutcome::Unchanged
                })
            }
            OrderStatus::Pending => Ok(PollOutcome::Unchanged),
        }
    }
}
