use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use vela_core::repository::OrderRepository;
use vela_shared::{LineItem, Network, Order};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub user_phone: Option<String>,
    pub network: String,
    pub items: Vec<CreateOrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderItem {
    pub product_name: String,
    pub variant_size: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub price_pesewas: i64,
    pub beneficiary_number: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/{id}", get(get_order))
}

/// POST /v1/orders. Checkout hands a paid order over; it is persisted and
/// dispatched in-line. A push failure still answers 200: the order is parked
/// for retry, the buyer's money is already captured and must not bounce.
async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let network = Network::parse(&req.network)
        .ok_or_else(|| AppError::ValidationError(format!("unknown network: {}", req.network)))?;
    if req.items.is_empty() {
        return Err(AppError::ValidationError(
            "order has no line items".to_string(),
        ));
    }

    let mut order = Order::new(req.user_id, req.user_phone, network);
    for item in req.items {
        if item.quantity == 0 {
            return Err(AppError::ValidationError(
                "line item quantity must be positive".to_string(),
            ));
        }
        order.add_item(LineItem::new(
            order.id,
            item.product_name,
            item.variant_size,
            item.quantity,
            item.price_pesewas,
            item.beneficiary_number,
        ));
    }

    let stored = state.coordinator.create_and_dispatch(order).await?;
    Ok(Json(stored))
}

/// GET /v1/orders/{id}
async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    match state.repo.get_order(id).await? {
        Some(order) => Ok(Json(order)),
        None => Err(AppError::NotFoundError(format!("order {} not found", id))),
    }
}
