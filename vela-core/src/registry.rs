use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vela_shared::Network;

use crate::provider::ProviderAdapter;

struct RegistryEntry {
    adapter: Arc<dyn ProviderAdapter>,
    enabled: AtomicBool,
}

/// Static mapping from network to fulfillment adapter, with a per-provider
/// enabled flag.
///
/// The flag is read at every lookup, never cached across scheduler cycles,
/// so an admin toggle takes effect on the next dispatch or poll cycle.
pub struct ProviderRegistry {
    entries: Vec<RegistryEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>, enabled: bool) {
        self.entries.push(RegistryEntry {
            adapter,
            enabled: AtomicBool::new(enabled),
        });
    }

    /// The adapter serving a network, regardless of its enabled flag
    pub fn adapter_for(&self, network: Network) -> Option<Arc<dyn ProviderAdapter>> {
        self.entries
            .iter()
            .find(|e| e.adapter.serves(network))
            .map(|e| Arc::clone(&e.adapter))
    }

    /// The adapter serving a network, only if its provider is enabled
    pub fn enabled_adapter_for(&self, network: Network) -> Option<Arc<dyn ProviderAdapter>> {
        self.entries
            .iter()
            .find(|e| e.adapter.serves(network) && e.enabled.load(Ordering::Relaxed))
            .map(|e| Arc::clone(&e.adapter))
    }

    pub fn is_enabled(&self, provider: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|e| e.adapter.name() == provider)
            .map(|e| e.enabled.load(Ordering::Relaxed))
    }

    /// Flip a provider's enabled flag by provider name. Returns false when
    /// no such provider is registered.
    pub fn set_enabled(&self, provider: &str, enabled: bool) -> bool {
        match self.entries.iter().find(|e| e.adapter.name() == provider) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::Relaxed);
                tracing::info!(provider, enabled, "provider toggle updated");
                true
            }
            None => false,
        }
    }

    /// Flip the flag of whichever provider serves the given network
    pub fn set_enabled_for_network(&self, network: Network, enabled: bool) -> bool {
        match self.adapter_for(network) {
            Some(adapter) => self.set_enabled(adapter.name(), enabled),
            None => false,
        }
    }

    /// Networks whose provider is enabled and answers status queries;
    /// the reconciliation scheduler's selection set
    pub fn pollable_networks(&self) -> Vec<Network> {
        Network::ALL
            .into_iter()
            .filter(|n| {
                self.enabled_adapter_for(*n)
                    .map(|a| a.supports_status_polling())
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.adapter.name()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
