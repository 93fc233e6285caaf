use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use vela_core::provider::{DispatchOutcome, ProviderAdapter, StatusProbe};
use vela_shared::{LineItem, Masked, Network, Order, OrderStatus};

use crate::error::ProviderCallError;

const PUSH_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(20);

/// Jesco MTN aggregator. Bearer-token auth; denominations are opaque package
/// SKUs looked up from the catalog size label.
#[derive(Debug, Clone)]
pub struct JescoConfig {
    pub base_url: String,
    pub api_key: Masked<String>,
    /// Lowercased size label -> aggregator package SKU
    pub package_map: HashMap<String, String>,
}

impl JescoConfig {
    /// The aggregator's published MTN package catalog
    pub fn default_package_map() -> HashMap<String, String> {
        [
            "1gb", "2gb", "3gb", "4gb", "5gb", "6gb", "7gb", "8gb", "9gb", "10gb", "15gb",
            "20gb", "25gb", "30gb", "40gb", "50gb", "100gb",
        ]
        .into_iter()
        .map(|size| {
            (
                size.to_string(),
                format!("MTN11-{}", size.to_uppercase()),
            )
        })
        .collect()
    }
}

pub struct JescoAdapter {
    config: JescoConfig,
    http: reqwest::Client,
}

#[derive(Debug, PartialEq, Eq)]
struct PurchaseRequest {
    package: String,
    phone: String,
    reference: String,
}

impl JescoAdapter {
    pub fn new(config: JescoConfig) -> Self {
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

    fn map_item(&self, order: &Order, item: &LineItem) -> Result<PurchaseRequest, &'static str> {
        let phone = item
            .beneficiary_number
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or("missing beneficiary number")?;
        let size_key = item.variant_size.trim().to_lowercase();
        let package = self
            .config
            .package_map
            .get(&size_key)
            .ok_or("no package SKU for this size")?;

        Ok(PurchaseRequest {
            package: package.clone(),
            phone: Self::format_phone(phone),
            reference: format!("ORDER_{}_{}", order.id, item.id),
        })
    }

    async fn send_purchase(
        &self,
        order: &Order,
        item_id: uuid::Uuid,
        request: &PurchaseRequest,
    ) -> Result<String, ProviderCallError> {
        let payload = json!({
            "package": request.package,
            "phone": request.phone,
            "reference": request.reference,
            "meta": {
                "order_id": order.id,
                "item_id": item_id,
                "customer_id": order.user_id,
            },
        });

        let response = self
            .http
            .post(format!("{}/purchase", self.config.base_url))
            .bearer_auth(self.config.api_key.as_str())
            .header("Accept", "application/json")
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

        if body["success"].as_bool() != Some(true) || body["data"].is_null() {
            return Err(ProviderCallError::Rejected(format!(
                "success flag absent or false: {}",
                body
            )));
        }

        // Purchase id is what the status endpoint is keyed by; fall back to
        // our own reference when the aggregator omits it
        let reference = match &body["data"]["id"] {
            Value::Number(n) => n.to_string(),
            Value::String(s) if !s.is_empty() => s.clone(),
            _ => {
                tracing::warn!(
                    order_id = %order.id,
                    "purchase accepted without an id, keeping our reference"
                );
                request.reference.clone()
            }
        };
        Ok(reference)
    }
}

#[async_trait]
impl ProviderAdapter for JescoAdapter {
    fn name(&self) -> &'static str {
        "jesco"
    }

    fn serves(&self, network: Network) -> bool {
        network == Network::Mtn
    }

    async fn push(&self, order: &Order) -> DispatchOutcome {
        let mut requests = Vec::new();
        for item in &order.items {
            match self.map_item(order, item) {
                Ok(request) => requests.push((item.id, request)),
                Err(reason) => {
                    tracing::warn!(
                        order_id = %order.id,
                        item_id = %item.id,
                        size = %item.variant_size,
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
        for (item_id, request) in &requests {
            match self.send_purchase(order, *item_id, request).await {
                Ok(reference) => {
                    tracing::info!(order_id = %order.id, reference, "purchase accepted");
                    last_reference = Some(reference);
                }
                Err(e) => {
                    tracing::error!(order_id = %order.id, error = %e, "purchase push failed");
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

        // Purchase ids are numeric; anything else was a fallback reference
        // the status endpoint does not know about
        if reference.is_empty() || !reference.chars().all(|c| c.is_ascii_digit()) {
            tracing::warn!(
                order_id = %order.id,
                reference,
                "provider reference is not a purchase id, cannot poll"
            );
            return StatusProbe::Unavailable;
        }

        let response = self
            .http
            .get(format!("{}/purchases/{}", self.config.base_url, reference))
            .bearer_auth(self.config.api_key.as_str())
            .header("Accept", "application/json")
            .timeout(STATUS_TIMEOUT)
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

        if body["success"].as_bool() != Some(true) {
            return StatusProbe::Unavailable;
        }
        match body["data"]["status"].as_str() {
            Some(status) if !status.is_empty() => StatusProbe::Reported(status.to_string()),
            _ => StatusProbe::Unavailable,
        }
    }

    fn map_status(&self, external: &str) -> Option<OrderStatus> {
        match external.to_lowercase().as_str() {
            "completed" => Some(OrderStatus::Completed),
            "pending" | "processing" => Some(OrderStatus::Processing),
            "failed" | "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}
