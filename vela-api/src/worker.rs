use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use vela_order::{ReconciliationService, StaleOrderFallback};

/// Start the two periodic jobs. Each runs in its own task on its own
/// cadence; the services carry their own overlap guards, so a run that
/// outlives its interval makes the next tick a no-op instead of a pile-up.
pub fn spawn_background_jobs(
    reconciler: Arc<ReconciliationService>,
    fallback: Arc<StaleOrderFallback>,
    reconcile_every: Duration,
    fallback_every: Duration,
) {
    tokio::spawn(reconcile_loop(reconciler, reconcile_every));
    tokio::spawn(fallback_loop(fallback, fallback_every));
}

async fn reconcile_loop(service: Arc<ReconciliationService>, every: Duration) {
    tracing::info!(interval_secs = every.as_secs(), "reconciliation scheduler started");
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match service.run_once().await {
            Ok(Some(report)) => {
                if report.updated > 0 {
                    tracing::info!(?report, "reconciliation sweep applied changes");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "reconciliation sweep failed"),
        }
    }
}

async fn fallback_loop(service: Arc<StaleOrderFallback>, every: Duration) {
    tracing::info!(interval_secs = every.as_secs(), "stale-order fallback scheduler started");
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match service.run_once().await {
            Ok(Some(report)) => {
                if report.completed > 0 {
                    tracing::info!(?report, "fallback sweep completed stale orders");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "fallback sweep failed"),
        }
    }
}
