use std::sync::Arc;
use vela_core::registry::ProviderRegistry;
use vela_order::FallbackPolicy;
use vela_provider::{
    CodeCraftAdapter, CodeCraftConfig, EasyDataAdapter, EasyDataConfig, JaybartAdapter,
    JaybartConfig, JescoAdapter, JescoConfig,
};
use vela_shared::Network;
use vela_store::app_config::{FallbackConfig, MtnProvider, ProvidersConfig};

/// Wire the configured adapters into a registry: exactly one MTN aggregator,
/// plus CodeCraft for Telecel/Ishare/Bigtime.
pub fn build_registry(cfg: &ProvidersConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    match cfg.mtn_provider {
        MtnProvider::Jaybart => registry.register(
            Arc::new(JaybartAdapter::new(JaybartConfig {
                base_url: cfg.jaybart.base_url.clone(),
                api_key: cfg.jaybart.api_key.clone().into(),
            })),
            cfg.jaybart.enabled,
        ),
        MtnProvider::Jesco => registry.register(
            Arc::new(JescoAdapter::new(JescoConfig {
                base_url: cfg.jesco.base_url.clone(),
                api_key: cfg.jesco.api_key.clone().into(),
                package_map: JescoConfig::default_package_map(),
            })),
            cfg.jesco.enabled,
        ),
        MtnProvider::Easydata => registry.register(
            Arc::new(EasyDataAdapter::new(EasyDataConfig {
                base_url: cfg.easydata.base_url.clone(),
                username: cfg.easydata.username.clone(),
                password: cfg.easydata.password.clone().into(),
            })),
            cfg.easydata.enabled,
        ),
    }

    registry.register(
        Arc::new(CodeCraftAdapter::new(CodeCraftConfig {
            base_url: cfg.codecraft.base_url.clone(),
            api_key: cfg.codecraft.api_key.clone().into(),
            client_email: cfg.codecraft.client_email.clone(),
        })),
        cfg.codecraft.enabled,
    );

    registry
}

/// Translate the fallback section of the config into a policy, dropping
/// unknown network labels with a warning rather than refusing to start.
pub fn fallback_policy(cfg: &FallbackConfig) -> FallbackPolicy {
    let networks: Vec<Network> = cfg
        .networks
        .iter()
        .filter_map(|label| {
            let network = Network::parse(label);
            if network.is_none() {
                tracing::warn!(label, "ignoring unknown network in fallback config");
            }
            network
        })
        .collect();

    FallbackPolicy {
        networks,
        max_age: chrono::Duration::minutes(cfg.max_age_mins),
    }
}
