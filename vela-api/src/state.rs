use std::sync::Arc;
use vela_core::registry::ProviderRegistry;
use vela_core::repository::OrderRepository;
use vela_order::{DispatchCoordinator, ReconciliationService, StaleOrderFallback};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn OrderRepository>,
    pub registry: Arc<ProviderRegistry>,
    pub coordinator: Arc<DispatchCoordinator>,
    pub reconciler: Arc<ReconciliationService>,
    pub fallback: Arc<StaleOrderFallback>,
}
