use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;
use vela_core::repository::{OrderRepository, RepositoryError};
use vela_shared::{DispatchStatus, LineItem, Network, Order, OrderStatus};

/// Postgres-backed order store. Queries are bound at runtime so the crate
/// builds without a live database; schema lives in ./migrations.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

// Row structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    user_phone: Option<String>,
    network: String,
    total_pesewas: i64,
    status: String,
    dispatch_status: String,
    provider_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    order_id: Uuid,
    product_name: String,
    variant_size: String,
    quantity: i32,
    price_pesewas: i64,
    beneficiary_number: Option<String>,
}

fn backend(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(e.to_string())
}

fn corrupt(field: &str, value: &str) -> RepositoryError {
    RepositoryError::Backend(format!("corrupt {} value in row: {}", field, value))
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Result<Order, RepositoryError> {
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            user_phone: self.user_phone,
            network: Network::parse(&self.network).ok_or_else(|| corrupt("network", &self.network))?,
            items,
            total_pesewas: self.total_pesewas,
            status: OrderStatus::parse(&self.status).ok_or_else(|| corrupt("status", &self.status))?,
            dispatch_status: DispatchStatus::parse(&self.dispatch_status)
                .ok_or_else(|| corrupt("dispatch_status", &self.dispatch_status))?,
            provider_reference: self.provider_reference,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<ItemRow> for LineItem {
    fn from(row: ItemRow) -> Self {
        LineItem {
            id: row.id,
            order_id: row.order_id,
            product_name: row.product_name,
            variant_size: row.variant_size,
            quantity: row.quantity.max(0) as u32,
            price_pesewas: row.price_pesewas,
            beneficiary_number: row.beneficiary_number,
        }
    }
}

const ORDER_COLUMNS: &str = "id, user_id, user_phone, network, total_pesewas, status, \
     dispatch_status, provider_reference, created_at, updated_at";

impl PgOrderRepository {
    async fn items_for(&self, order_ids: &[Uuid]) -> Result<Vec<ItemRow>, RepositoryError> {
        sqlx::query_as::<_, ItemRow>(
            "SELECT id, order_id, product_name, variant_size, quantity, price_pesewas, \
             beneficiary_number FROM order_items WHERE order_id = ANY($1)",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn assemble(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items_by_order: std::collections::HashMap<Uuid, Vec<LineItem>> =
            std::collections::HashMap::new();
        for item in self.items_for(&ids).await? {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(item.into());
        }

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = items_by_order.remove(&row.id).unwrap_or_default();
            orders.push(row.into_order(items)?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO orders (id, user_id, user_phone, network, total_pesewas, status, \
             dispatch_status, provider_reference, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(&order.user_phone)
        .bind(order.network.as_str())
        .bind(order.total_pesewas)
        .bind(order.status.as_str())
        .bind(order.dispatch_status.as_str())
        .bind(&order.provider_reference)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_name, variant_size, quantity, \
                 price_pesewas, beneficiary_number) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(item.id)
            .bind(order.id)
            .bind(&item.product_name)
            .bind(&item.variant_size)
            .bind(item.quantity as i32)
            .bind(item.price_pesewas)
            .bind(&item.beneficiary_number)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn record_dispatch(
        &self,
        id: Uuid,
        dispatch_status: DispatchStatus,
        provider_reference: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET dispatch_status = $1, \
             provider_reference = COALESCE($2, provider_reference), updated_at = NOW() \
             WHERE id = $3",
        )
        .bind(dispatch_status.as_str())
        .bind(provider_reference)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let from_values: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        // The conditional update is the serialization point; concurrent
        // callers race here and exactly one of them wins.
        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = ANY($3)",
        )
        .bind(to.as_str())
        .bind(id)
        .bind(&from_values)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_awaiting_confirmation(
        &self,
        networks: &[Network],
    ) -> Result<Vec<Order>, RepositoryError> {
        let network_values: Vec<String> =
            networks.iter().map(|n| n.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders \
             WHERE status IN ('pending', 'processing') \
             AND dispatch_status = 'success' \
             AND provider_reference IS NOT NULL \
             AND network = ANY($1) \
             ORDER BY created_at",
            ORDER_COLUMNS
        ))
        .bind(&network_values)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        self.assemble(rows).await
    }

    async fn list_stale(
        &self,
        networks: &[Network],
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let network_values: Vec<String> =
            networks.iter().map(|n| n.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders \
             WHERE status IN ('pending', 'processing') \
             AND network = ANY($1) \
             AND created_at <= $2 \
             ORDER BY created_at",
            ORDER_COLUMNS
        ))
        .bind(&network_values)
        .bind(created_before)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        self.assemble(rows).await
    }
}
