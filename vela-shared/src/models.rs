use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mobile networks an order can be fulfilled on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Network {
    #[serde(rename = "MTN")]
    Mtn,
    Telecel,
    Ishare,
    Bigtime,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Mtn,
        Network::Telecel,
        Network::Ishare,
        Network::Bigtime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mtn => "MTN",
            Network::Telecel => "Telecel",
            Network::Ishare => "Ishare",
            Network::Bigtime => "Bigtime",
        }
    }

    /// Case-insensitive parse of the storefront's network labels
    pub fn parse(s: &str) -> Option<Network> {
        match s.trim().to_lowercase().as_str() {
            "mtn" => Some(Network::Mtn),
            "telecel" => Some(Network::Telecel),
            "ishare" => Some(Network::Ishare),
            "bigtime" => Some(Network::Bigtime),
            _ => None,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical order lifecycle state, independent of any provider vocabulary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// States still awaiting provider confirmation
    pub const ACTIVE: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Processing];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled are absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the most recent hand-off attempt to a provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    NotDispatched,
    Success,
    Failed,
    /// No line item could be mapped to a provider request, or the provider
    /// was toggled off; excluded from reconciliation
    Disabled,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::NotDispatched => "not_dispatched",
            DispatchStatus::Success => "success",
            DispatchStatus::Failed => "failed",
            DispatchStatus::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<DispatchStatus> {
        match s {
            "not_dispatched" => Some(DispatchStatus::NotDispatched),
            "success" => Some(DispatchStatus::Success),
            "failed" => Some(DispatchStatus::Failed),
            "disabled" => Some(DispatchStatus::Disabled),
            _ => None,
        }
    }
}

/// A paid order for one network, the unit of dispatch and reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Number the completion SMS goes to, when the buyer has one on file
    pub user_phone: Option<String>,
    pub network: Network,
    pub items: Vec<LineItem>,
    /// Monetary total in GHS minor units
    pub total_pesewas: i64,
    pub status: OrderStatus,
    pub dispatch_status: DispatchStatus,
    /// Opaque id returned by the provider at dispatch, join key for polling
    pub provider_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(user_id: Uuid, user_phone: Option<String>, network: Network) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            user_phone,
            network,
            items: Vec::new(),
            total_pesewas: 0,
            status: OrderStatus::Processing,
            dispatch_status: DispatchStatus::NotDispatched,
            provider_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a line item, keeping the order total in step
    pub fn add_item(&mut self, item: LineItem) {
        self.total_pesewas += item.price_pesewas * i64::from(item.quantity);
        self.items.push(item);
        self.updated_at = Utc::now();
    }

    /// First item's size + product label, used in the completion SMS
    pub fn headline_description(&self) -> String {
        match self.items.first() {
            Some(item) => format!("{} {}", item.variant_size.to_uppercase(), item.product_name),
            None => "Data/Airtime".to_string(),
        }
    }

    /// Beneficiary of the first line item, for the completion SMS
    pub fn headline_beneficiary(&self) -> &str {
        self.items
            .first()
            .and_then(|i| i.beneficiary_number.as_deref())
            .unwrap_or("N/A")
    }
}

/// One purchased bundle within an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_name: String,
    /// Catalog denomination label, e.g. "5GB"
    pub variant_size: String,
    pub quantity: u32,
    pub price_pesewas: i64,
    /// Number the bundle is delivered to; may differ per item
    pub beneficiary_number: Option<String>,
}

impl LineItem {
    pub fn new(
        order_id: Uuid,
        product_name: String,
        variant_size: String,
        quantity: u32,
        price_pesewas: i64,
        beneficiary_number: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_name,
            variant_size,
            quantity,
            price_pesewas,
            beneficiary_number,
        }
    }
}
