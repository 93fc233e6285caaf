use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use std::time::Duration;
use vela_core::provider::{DispatchOutcome, ProviderAdapter, StatusProbe};
use vela_shared::{LineItem, Masked, Network, Order, OrderStatus};

use crate::error::ProviderCallError;

const PUSH_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(20);

/// CodeCraft aggregator for Telecel, AT iShare and AT BigTime. Auth rides in
/// the request body (`agent_api` + `client_email`); the caller supplies the
/// reference id used for later status queries.
#[derive(Debug, Clone)]
pub struct CodeCraftConfig {
    pub base_url: String,
    pub api_key: Masked<String>,
    pub client_email: String,
}

pub struct CodeCraftAdapter {
    config: CodeCraftConfig,
    http: reqwest::Client,
}

#[derive(Debug, PartialEq, Eq)]
struct GigRequest {
    recipient_number: String,
    gig: u64,
    /// Aggregator-side network label, e.g. "TELECEL" or "AT"
    provider_network: &'static str,
    /// BigTime orders go to a dedicated endpoint
    big_time: bool,
    customer_tel: String,
}

impl CodeCraftAdapter {
    pub fn new(config: CodeCraftConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Caller-generated dispatch reference: uppercase hyphen-delimited
    /// random groups, unique per attempt
    pub fn generate_reference_id() -> String {
        fn group(len: usize) -> String {
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect::<String>()
                .to_uppercase()
        }
        let check: u32 = rand::thread_rng().gen_range(10_000..100_000);
        format!("{}-{}-{}-{}-{}", group(5), group(5), group(6), group(5), check)
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

    fn map_item(&self, order: &Order, item: &LineItem) -> Result<GigRequest, &'static str> {
        let phone = item
            .beneficiary_number
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or("missing beneficiary number")?;
        let gb = Self::size_in_gb(&item.variant_size).ok_or("unrecognized bundle size")?;

        let (provider_network, big_time) = match order.network {
            Network::Telecel => ("TELECEL", false),
            Network::Ishare => ("AT", false),
            Network::Bigtime => ("AT", true),
            Network::Mtn => return Err("network not served by this aggregator"),
        };

        let recipient = Self::format_phone(phone);
        Ok(GigRequest {
            customer_tel: order
                .user_phone
                .as_deref()
                .map(Self::format_phone)
                .unwrap_or_else(|| recipient.clone()),
            recipient_number: recipient,
            gig: gb * u64::from(item.quantity),
            provider_network,
            big_time,
        })
    }

    fn endpoint(&self, request: &GigRequest) -> String {
        if request.big_time {
            format!("{}/special.php", self.config.base_url)
        } else {
            format!("{}/initiate.php", self.config.base_url)
        }
    }

    fn payload(&self, request: &GigRequest, reference_id: &str) -> Value {
        let mut payload = json!({
            "agent_api": self.config.api_key.as_str(),
            "recipient_number": request.recipient_number,
            "gig": request.gig.to_string(),
            "reference_id": reference_id,
            "client_email": self.config.client_email,
            "network": request.provider_network,
        });
        if !request.big_time {
            payload["customer_name"] = json!("Customer");
            payload["customer_tel"] = json!(request.customer_tel);
        }
        payload
    }

    async fn send_gig(
        &self,
        request: &GigRequest,
        reference_id: &str,
    ) -> Result<(), ProviderCallError> {
        let response = self
            .http
            .post(self.endpoint(request))
            .timeout(PUSH_TIMEOUT)
            .json(&self.payload(request, reference_id))
            .send()
            .await?;

        // This aggregator signals acceptance purely through the status code
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| "unknown error".to_string());
            Err(ProviderCallError::Rejected(format!(
                "HTTP {}: {}",
                status, message
            )))
        }
    }

    /// Aggregator-side PHP faults come back as 200s with HTML bodies
    fn body_is_server_fault(body: &str) -> bool {
        body.contains("Fatal error") || body.contains("<br />")
    }
}

#[async_trait]
impl ProviderAdapter for CodeCraftAdapter {
    fn name(&self) -> &'static str {
        "codecraft"
    }

    fn serves(&self, network: Network) -> bool {
        matches!(
            network,
            Network::Telecel | Network::Ishare | Network::Bigtime
        )
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
            let reference_id = Self::generate_reference_id();
            match self.send_gig(request, &reference_id).await {
                Ok(()) => {
                    tracing::info!(order_id = %order.id, reference_id, "gig order accepted");
                    last_reference = Some(reference_id);
                }
                Err(e) => {
                    tracing::error!(
                        order_id = %order.id,
                        reference_id,
                        error = %e,
                        "gig push failed"
                    );
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
            .get(format!("{}/response_agent.php", self.config.base_url))
            .header("Accept", "application/json")
            .timeout(STATUS_TIMEOUT)
            .query(&[
                ("client_email", self.config.client_email.as_str()),
                ("reference_id", reference),
            ])
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

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "status body unreadable");
                return StatusProbe::Unavailable;
            }
        };

        if Self::body_is_server_fault(&text) {
            // Their database query failing, not ours; leave the order alone
            tracing::error!(order_id = %order.id, body = %text, "aggregator returned a server fault");
            return StatusProbe::Unavailable;
        }

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "unparseable status response");
                return StatusProbe::Unavailable;
            }
        };

        match body["order_status"].as_str() {
            Some(status) if !status.is_empty() => StatusProbe::Reported(status.to_string()),
            _ => {
                tracing::warn!(order_id = %order.id, "status response missing order_status");
                StatusProbe::Unavailable
            }
        }
    }

    fn map_status(&self, external: &str) -> Option<OrderStatus> {
        match external.to_lowercase().as_str() {
            "crediting successful" | "completed" | "delivered" => Some(OrderStatus::Completed),
            "processing" | "placed" => Some(OrderStatus::Processing),
            "cancelled" | "failed" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn adapter() -> CodeCraftAdapter {
        CodeCraftAdapter::new(CodeCraftConfig {
            base_url: "https://api.example.test/api".to_string(),
            api_key: "agent-key".into(),
            client_email: "agent@example.test".to_string(),
        })
    }

    fn order_with_item(network: Network, size: &str, quantity: u32) -> Order {
        let mut order = Order::new(Uuid::new_v4(), Some("0209999999".to_string()), network);
        order.add_item(LineItem::new(
            order.id,
            "AT BigTime".to_string(),
            size.to_string(),
            quantity,
            4000,
            Some("244123456".to_string()),
        ));
        order
    }

    #[test]
    fn test_reference_id_format() {
        let reference = CodeCraftAdapter::generate_reference_id();
        let groups: Vec<&str> = reference.split('-').collect();
        assert_eq!(groups.len(), 5);
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![5, 5, 6, 5, 5]
        );
        assert_eq!(reference, reference.to_uppercase());
        // two draws colliding would mean the generator is broken
        assert_ne!(reference, CodeCraftAdapter::generate_reference_id());
    }

    #[test]
    fn test_map_item_routes_bigtime_to_special_endpoint() {
        let adapter = adapter();
        let order = order_with_item(Network::Bigtime, "20GB", 1);
        let request = adapter.map_item(&order, &order.items[0]).unwrap();

        assert!(request.big_time);
        assert_eq!(request.provider_network, "AT");
        assert_eq!(request.gig, 20);
        assert_eq!(request.recipient_number, "0244123456");
        assert!(adapter.endpoint(&request).ends_with("/special.php"));

        let payload = adapter.payload(&request, "REF-1");
        assert_eq!(payload["network"], "AT");
        assert_eq!(payload["gig"], "20");
        assert!(payload.get("customer_name").is_none());
    }

    #[test]
    fn test_map_item_regular_networks_carry_customer_fields() {
        let adapter = adapter();
        let order = order_with_item(Network::Telecel, "10GB", 2);
        let request = adapter.map_item(&order, &order.items[0]).unwrap();

        assert!(!request.big_time);
        assert_eq!(request.provider_network, "TELECEL");
        assert_eq!(request.gig, 20);
        assert!(adapter.endpoint(&request).ends_with("/initiate.php"));

        let payload = adapter.payload(&request, "REF-2");
        assert_eq!(payload["customer_name"], "Customer");
        assert_eq!(payload["customer_tel"], "0209999999");
        assert_eq!(payload["reference_id"], "REF-2");
        assert_eq!(payload["client_email"], "agent@example.test");
    }

    #[test]
    fn test_map_item_rejects_foreign_network() {
        let adapter = adapter();
        let order = order_with_item(Network::Mtn, "5GB", 1);
        assert!(adapter.map_item(&order, &order.items[0]).is_err());
    }

    #[test]
    fn test_server_fault_sniffing() {
        assert!(CodeCraftAdapter::body_is_server_fault(
            "<br />\n<b>Fatal error</b>: Uncaught mysqli_sql_exception"
        ));
        assert!(CodeCraftAdapter::body_is_server_fault("Fatal error: oops"));
        assert!(!CodeCraftAdapter::body_is_server_fault(
            r#"{"order_status":"processing"}"#
        ));
    }

    #[test]
    fn test_map_status_table() {
        let adapter = adapter();
        assert_eq!(
            adapter.map_status("Crediting Successful"),
            Some(OrderStatus::Completed)
        );
        assert_eq!(adapter.map_status("placed"), Some(OrderStatus::Processing));
        assert_eq!(adapter.map_status("failed"), Some(OrderStatus::Cancelled));
        assert_eq!(adapter.map_status("on hold"), None);
    }
}
