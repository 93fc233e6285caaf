use async_trait::async_trait;
use vela_shared::{Network, Order, OrderStatus};

/// Result of handing an order to a fulfillment provider.
///
/// `Disabled` means nothing could even be attempted (no mappable line item);
/// it is distinct from `Failed`, where the provider was contacted and said no
/// or could not be reached. Orders left `Disabled` are never polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success { provider_reference: String },
    Failed { reason: String },
    Disabled,
}

/// Raw result of a provider status query.
///
/// `Unavailable` covers transport errors, timeouts and malformed bodies
/// (including providers that answer with HTML error pages). It is always
/// transient: the order is left untouched and re-polled on the next cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusProbe {
    Reported(String),
    Unavailable,
}

/// One external fulfillment network integration.
///
/// Each adapter owns its provider's auth scheme, phone normalization,
/// denomination mapping and status vocabulary; none of that leaks to
/// callers, who only see canonical outcomes.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable name used for registry toggles and log lines
    fn name(&self) -> &'static str;

    /// Whether this adapter fulfills orders on the given network
    fn serves(&self, network: Network) -> bool;

    /// Providers without a queryable status API return false and rely on
    /// the stale-order fallback instead
    fn supports_status_polling(&self) -> bool {
        true
    }

    /// Providers that report final completion in the push response itself;
    /// the coordinator completes the order immediately on success
    fn confirms_on_push(&self) -> bool {
        false
    }

    /// Send every mappable line item of the order to the provider
    async fn push(&self, order: &Order) -> DispatchOutcome;

    /// Query the provider for the order's current status, keyed by the
    /// stored provider reference
    async fn check_status(&self, order: &Order) -> StatusProbe;

    /// Pure mapping from the provider's status vocabulary to canonical
    /// status; unknown strings map to None and are re-polled later
    fn map_status(&self, external: &str) -> Option<OrderStatus>;
}
