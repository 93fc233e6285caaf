use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use vela_core::provider::{DispatchOutcome, ProviderAdapter, StatusProbe};
use vela_shared::{LineItem, Masked, Network, Order, OrderStatus};

use crate::error::ProviderCallError;

const PUSH_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(20);

/// EasyData MTN aggregator. HTTP basic auth; denominations are plain GB
/// counts. The aggregator has no queryable reference of its own, so status
/// lookups are keyed by the composite reference we send at push time.
#[derive(Debug, Clone)]
pub struct EasyDataConfig {
    pub base_url: String,
    pub username: String,
    pub password: Masked<String>,
}

pub struct EasyDataAdapter {
    config: EasyDataConfig,
    http: reqwest::Client,
}

#[derive(Debug, PartialEq, Eq)]
struct PlaceOrderRequest {
    recipient: String,
    package_size_gb: u64,
    order_reference: String,
}

impl EasyDataAdapter {
    pub fn new(config: EasyDataConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Deterministic key the aggregator is queried by: order id plus the
    /// first line item id, fixed at push time
    pub fn composite_reference(order: &Order) -> Option<String> {
        order
            .items
            .first()
            .map(|item| format!("ORDER_{}_{}", order.id, item.id))
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

    fn size_in_gb(variant_size: &str) -> Option<u64> {
        let digits: String = variant_size
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        digits.parse().ok().filter(|gb| *gb > 0)
    }

    fn map_item(&self, order: &Order, item: &LineItem) -> Result<PlaceOrderRequest, &'static str> {
        let phone = item
            .beneficiary_number
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or("missing beneficiary number")?;
        let gb = Self::size_in_gb(&item.variant_size).ok_or("unrecognized bundle size")?;

        Ok(PlaceOrderRequest {
            recipient: Self::format_phone(phone),
            package_size_gb: gb,
            order_reference: format!("ORDER_{}_{}", order.id, item.id),
        })
    }

    /// The success flag shows up as boolean true or the string "success"
    /// depending on the endpoint revision
    fn response_is_success(body: &Value) -> bool {
        matches!(&body["status"], Value::Bool(true))
            || body["status"].as_str() == Some("success")
    }

    async fn send_order(&self, request: &PlaceOrderRequest) -> Result<String, ProviderCallError> {
        let payload = json!({
            "network": "mtn",
            "recipient": request.recipient,
            "package_size": request.package_size_gb,
            "order_id": request.order_reference,
        });

        let response = self
            .http
            .post(format!("{}/place-order", self.config.base_url))
            .basic_auth(&self.config.username, Some(self.config.password.as_str()))
            .timeout(PUSH_TIMEOUT)
            .json(&payload)
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

        if !Self::response_is_success(&body) {
            return Err(ProviderCallError::Rejected(format!(
                "status flag absent or false: {}",
                body
            )));
        }

        // Their own order id when present, else the reference we supplied
        let reference = [&body["order_id"], &body["order_reference"]]
            .into_iter()
            .find_map(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| request.order_reference.clone());
        Ok(reference)
    }
}

#[async_trait]
impl ProviderAdapter for EasyDataAdapter {
    fn name(&self) -> &'static str {
        "easydata"
    }

    fn serves(&self, network: Network) -> bool {
        network == Network::Mtn
    }

    async fn push(&self, order: &Order) -> DispatchOutcome {
        let mut requests = Vec::new();
        for item in &order.items {
            match self.map_item(order, item) {
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
            match self.send_order(request).await {
                Ok(reference) => {
                    tracing::info!(order_id = %order.id, reference, "order accepted");
                    last_reference = Some(reference);
                }
                Err(e) => {
                    tracing::error!(order_id = %order.id, error = %e, "order push failed");
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
        // Keyed by our composite reference, not the stored provider id
        let Some(reference) = Self::composite_reference(order) else {
            tracing::warn!(order_id = %order.id, "order has no line items to derive a reference from");
            return StatusProbe::Unavailable;
        };

        let response = self
            .http
            .get(format!("{}/order-status", self.config.base_url))
            .basic_auth(&self.config.username, Some(self.config.password.as_str()))
            .timeout(STATUS_TIMEOUT)
            .query(&[("order_reference", reference.as_str())])
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

        if body["status"].as_str() != Some("success") {
            tracing::warn!(order_id = %order.id, "status envelope not successful");
            return StatusProbe::Unavailable;
        }
        match body["order_status"].as_str() {
            Some(status) if !status.is_empty() => StatusProbe::Reported(status.to_string()),
            _ => StatusProbe::Unavailable,
        }
    }

    fn map_status(&self, external: &str) -> Option<OrderStatus> {
        match external.to_lowercase().as_str() {
            "completed" | "success" => Some(OrderStatus::Completed),
            "pending" | "processing" => Some(OrderStatus::Processing),
            "failed" | "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn adapter() -> EasyDataAdapter {
        EasyDataAdapter::new(EasyDataConfig {
            base_url: "https://easy.example.test/api".to_string(),
            username: "agent".to_string(),
            password: "secret".into(),
        })
    }

    fn order_with_item(size: &str, beneficiary: Option<&str>) -> Order {
        let mut order = Order::new(Uuid::new_v4(), None, Network::Mtn);
        order.add_item(LineItem::new(
            order.id,
            "MTN Data".to_string(),
            size.to_string(),
            1,
            3000,
            beneficiary.map(str::to_string),
        ));
        order
    }

    #[test]
    fn test_map_item_extracts_numeric_size() {
        let adapter = adapter();
        let order = order_with_item("10GB", Some("261234567"));
        let request = adapter.map_item(&order, &order.items[0]).unwrap();
        assert_eq!(request.package_size_gb, 10);
        assert_eq!(request.recipient, "0261234567");
    }

    #[test]
    fn test_composite_reference_uses_first_item() {
        let order = order_with_item("5GB", Some("0261234567"));
        let reference = EasyDataAdapter::composite_reference(&order).unwrap();
        assert_eq!(
            reference,
            format!("ORDER_{}_{}", order.id, order.items[0].id)
        );

        let empty = Order::new(Uuid::new_v4(), None, Network::Mtn);
        assert!(EasyDataAdapter::composite_reference(&empty).is_none());
    }

    #[test]
    fn test_success_flag_variants() {
        assert!(EasyDataAdapter::response_is_success(&serde_json::json!({
            "status": true
        })));
        assert!(EasyDataAdapter::response_is_success(&serde_json::json!({
            "status": "success"
        })));
        assert!(!EasyDataAdapter::response_is_success(&serde_json::json!({
            "status": false
        })));
        assert!(!EasyDataAdapter::response_is_success(&serde_json::json!({
            "message": "ok"
        })));
    }

    #[test]
    fn test_map_status_table() {
        let adapter = adapter();
        assert_eq!(adapter.map_status("Success"), Some(OrderStatus::Completed));
        assert_eq!(adapter.map_status("processing"), Some(OrderStatus::Processing));
        assert_eq!(adapter.map_status("failed"), Some(OrderStatus::Cancelled));
        assert_eq!(adapter.map_status("queued"), None);
    }
}
