use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use vela_core::provider::{DispatchOutcome, ProviderAdapter, StatusProbe};
use vela_shared::{LineItem, Masked, Network, Order, OrderStatus};

use crate::error::ProviderCallError;

const PUSH_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(20);

/// The aggregator's internal id for the MTN network
const MTN_NETWORK_ID: u32 = 3;

/// Jaybart MTN aggregator. Auth is a static `x-api-key` header; bundle
/// denominations are sent as megabytes.
#[derive(Debug, Clone)]
pub struct JaybartConfig {
    pub base_url: String,
    pub api_key: Masked<String>,
}

pub struct JaybartAdapter {
    config: JaybartConfig,
    http: reqwest::Client,
}

/// One line item mapped to the aggregator's push payload
#[derive(Debug, PartialEq, Eq)]
struct BundleRequest {
    recipient_msisdn: String,
    shared_bundle_mb: u64,
}

impl BundleRequest {
    fn payload(&self) -> Value {
        json!({
            "recipient_msisdn": self.recipient_msisdn,
            "network_id": MTN_NETWORK_ID,
            "shared_bundle": self.shared_bundle_mb,
        })
    }
}

impl JaybartAdapter {
    pub fn new(config: JaybartConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Strip non-digits; a 9-digit subscriber number gains its leading zero
    fn format_phone(phone: &str) -> String {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        if digits.len() == 9 {
            format!("0{}", digits)
        } else {
            digits
        }
    }

    /// Numeric part of a size label, e.g. "5GB" -> 5
    fn size_in_gb(variant_size: &str) -> Option<u64> {
        let digits: String = variant_size
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        digits.parse().ok().filter(|gb| *gb > 0)
    }

    fn map_item(&self, item: &LineItem) -> Result<BundleRequest, &'static str> {
        let phone = item
            .beneficiary_number
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or("missing beneficiary number")?;
        let gb = Self::size_in_gb(&item.variant_size).ok_or("unrecognized bundle size")?;

        Ok(BundleRequest {
            recipient_msisdn: Self::format_phone(phone),
            shared_bundle_mb: gb * 1000 * u64::from(item.quantity),
        })
    }

    async fn send_bundle(&self, request: &BundleRequest) -> Result<String, ProviderCallError> {
        let response = self
            .http
            .post(format!("{}/buy-other-package", self.config.base_url))
            .header("x-api-key", self.config.api_key.as_str())
            .header("Accept", "application/json")
            .timeout(PUSH_TIMEOUT)
            .json(&request.payload())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderCallError::Http(status));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderCallError::UnparseableResponse(e.to_string()))?;

        // Success is the provider's own flag plus a transaction code to poll by
        if body["success"].as_bool() != Some(true) {
            return Err(ProviderCallError::Rejected(format!(
                "success flag absent or false: {}",
                body
            )));
        }
        match value_as_reference(&body["transaction_code"]) {
            Some(code) => Ok(code),
            None => Err(ProviderCallError::Rejected(
                "response carried no transaction_code".to_string(),
            )),
        }
    }
}

/// Providers return references as strings or bare numbers
fn value_as_reference(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl ProviderAdapter for JaybartAdapter {
    fn name(&self) -> &'static str {
        "jaybart"
    }

    fn serves(&self, network: Network) -> bool {
        network == Network::Mtn
    }

    async fn push(&self, order: &Order) -> DispatchOutcome {
        let mut requests = Vec::new();
        for item in &order.items {
            match self.map_item(item) {
                Ok(request) => requests.push(request),
                Err(reason) => {
                    tracing::warn!(
                        order_id = %order.id,
                        item_id = %item.id,
                        reason,
                        "skipping line item"
                    );
                }
            }
        }

        if requests.is_empty() {
            tracing::info!(order_id = %order.id, "no mappable line items, nothing dispatched");
            return DispatchOutcome::Disabled;
        }

        let mut last_reference = None;
        let mut first_failure: Option<String> = None;
        for request in &requests {
            match self.send_bundle(request).await {
                Ok(reference) => {
                    tracing::info!(order_id = %order.id, reference, "bundle accepted");
                    last_reference = Some(reference);
                }
                Err(e) => {
                    tracing::error!(order_id = %order.id, error = %e, "bundle push failed");
                    first_failure.get_or_insert(e.to_string());
                }
            }
        }

        match (first_failure, last_reference) {
            (Some(reason), _) => DispatchOutcome::Failed { reason },
            (None, Some(provider_reference)) => DispatchOutcome::Success { provider_reference },
            (None, None) => DispatchOutcome::Failed {
                reason: "no push attempt produced a result".to_string(),
            },
        }
    }

    async fn check_status(&self, order: &Order) -> StatusProbe {
        let Some(reference) = order.provider_reference.as_deref() else {
            tracing::warn!(order_id = %order.id, "no provider reference to poll");
            return StatusProbe::Unavailable;
        };

        let response = self
            .http
            .post(format!(
                "{}/fetch-other-network-transaction",
                self.config.base_url
            ))
            .header("x-api-key", self.config.api_key.as_str())
            .header("Accept", "application/json")
            .timeout(STATUS_TIMEOUT)
            .json(&json!({ "transaction_id": reference }))
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(order_id = %order.id, status = %r.status(), "status query rejected");
                return StatusProbe::Unavailable;
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "status query failed");
                return StatusProbe::Unavailable;
            }
        };

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "unparseable status response");
                return StatusProbe::Unavailable;
            }
        };

        match body["order_items"][0]["status"].as_str() {
            Some(status) if !status.is_empty() => StatusProbe::Reported(status.to_string()),
            _ => StatusProbe::Unavailable,
        }
    }

    fn map_status(&self, external: &str) -> Option<OrderStatus> {
        match external.to_lowercase().as_str() {
            "successful" | "completed" | "delivered" => Some(OrderStatus::Completed),
            "processing" | "pending" => Some(OrderStatus::Processing),
            "failed" | "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn adapter() -> JaybartAdapter {
        JaybartAdapter::new(JaybartConfig {
            base_url: "https://agent.example.test/api/v1".to_string(),
            api_key: "test-key".into(),
        })
    }

    fn item(size: &str, quantity: u32, beneficiary: Option<&str>) -> LineItem {
        LineItem::new(
            Uuid::new_v4(),
            "MTN Data".to_string(),
            size.to_string(),
            quantity,
            2500,
            beneficiary.map(str::to_string),
        )
    }

    #[test]
    fn test_format_phone_is_idempotent() {
        assert_eq!(JaybartAdapter::format_phone("0241234567"), "0241234567");
        assert_eq!(JaybartAdapter::format_phone("241234567"), "0241234567");
        assert_eq!(JaybartAdapter::format_phone("024-123-4567"), "0241234567");
        let once = JaybartAdapter::format_phone("241234567");
        assert_eq!(JaybartAdapter::format_phone(&once), once);
    }

    #[test]
    fn test_map_item_builds_megabyte_bundle() {
        let request = adapter().map_item(&item("5GB", 2, Some("241234567"))).unwrap();
        assert_eq!(request.recipient_msisdn, "0241234567");
        assert_eq!(request.shared_bundle_mb, 10_000);

        let payload = request.payload();
        assert_eq!(payload["network_id"], 3);
        assert_eq!(payload["recipient_msisdn"], "0241234567");
        assert_eq!(payload["shared_bundle"], 10_000);
    }

    #[test]
    fn test_map_item_skips_bad_input() {
        let adapter = adapter();
        assert!(adapter.map_item(&item("5GB", 1, None)).is_err());
        assert!(adapter.map_item(&item("5GB", 1, Some("  "))).is_err());
        assert!(adapter.map_item(&item("unlimited", 1, Some("0241234567"))).is_err());
    }

    #[tokio::test]
    async fn test_push_with_nothing_mappable_is_disabled() {
        // no beneficiary on any item: adapter must bail out before any HTTP
        let mut order = Order::new(Uuid::new_v4(), None, Network::Mtn);
        order.add_item(item("5GB", 1, None));
        order.add_item(item("???", 1, Some("0241234567")));

        assert_eq!(adapter().push(&order).await, DispatchOutcome::Disabled);
    }

    #[test]
    fn test_map_status_table() {
        let adapter = adapter();
        assert_eq!(adapter.map_status("Successful"), Some(OrderStatus::Completed));
        assert_eq!(adapter.map_status("DELIVERED"), Some(OrderStatus::Completed));
        assert_eq!(adapter.map_status("pending"), Some(OrderStatus::Processing));
        assert_eq!(adapter.map_status("failed"), Some(OrderStatus::Cancelled));
        assert_eq!(adapter.map_status("weird new state"), None);
        assert_eq!(adapter.map_status(""), None);
    }
}
