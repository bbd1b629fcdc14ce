use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    ActorId, BuyerIdentity, OrderId, PaymentMethodId, SessionId, UserId, VariantId,
};
use domain::{
    Money, Order, OrderCode, OrderItem, OrderStatus, OrderStatusHistory, OrderTotals,
    PaymentStatus, ProductVariant, ReserveOutcome, ShippingInfo,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{InventoryLedger, OrderRepository, Store, StoreTransaction, VariantCatalog},
};

const UNIQUE_ORDER_CODE: &str = "unique_order_code";

const ORDER_COLUMNS: &str = r#"
    id, order_code, user_id, session_id, payment_method_id, shipping_address, notes,
    subtotal_cents, discount_cents, shipping_fee_cents, grand_total_cents,
    payment_status, order_status, placed_at, updated_at
"#;

/// PostgreSQL-backed checkout store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Returns true if an active payment method with this id exists.
    pub async fn payment_method_exists(&self, id: PaymentMethodId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM payment_methods WHERE id = $1 AND is_active)",
        )
        .bind(id.as_i64())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Returns the raw cart lines of a buyer, in insertion order.
    pub async fn cart_lines(&self, buyer: &BuyerIdentity) -> Result<Vec<(VariantId, u32)>> {
        let rows = sqlx::query(
            r#"
            SELECT variant_id, quantity
            FROM cart_items
            WHERE user_id IS NOT DISTINCT FROM $1 AND session_id IS NOT DISTINCT FROM $2
            ORDER BY id ASC
            "#,
        )
        .bind(buyer.user_id().map(|id| id.as_uuid()))
        .bind(buyer.session_id().map(|s| s.as_str().to_owned()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let variant_id: i64 = row.try_get("variant_id")?;
                let quantity: i32 = row.try_get("quantity")?;
                let quantity = u32::try_from(quantity).map_err(|_| {
                    StoreError::InvariantViolation(format!(
                        "negative cart quantity {quantity} for variant {variant_id}"
                    ))
                })?;
                Ok((VariantId::new(variant_id), quantity))
            })
            .collect()
    }

    /// Deletes every cart line of a buyer.
    pub async fn clear_cart(&self, buyer: &BuyerIdentity) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM cart_items
            WHERE user_id IS NOT DISTINCT FROM $1 AND session_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(buyer.user_id().map(|id| id.as_uuid()))
        .bind(buyer.session_id().map(|s| s.as_str().to_owned()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }
}

/// A transaction over [`PostgresStore`]. Rolls back when dropped uncommitted.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

fn to_db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::InvariantViolation(format!("quantity {quantity} out of range")))
}

fn corrupt(order_id: OrderId, reason: impl ToString) -> StoreError {
    StoreError::CorruptRow {
        order_id,
        reason: reason.to_string(),
    }
}

impl PostgresTransaction {
    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);

        let user_id: Option<Uuid> = row.try_get("user_id")?;
        let session_id: Option<String> = row.try_get("session_id")?;
        let buyer = BuyerIdentity::from_parts(
            user_id.map(UserId::from_uuid),
            session_id.map(SessionId::new),
        )
        .ok_or_else(|| corrupt(order_id, "order must have exactly one buyer reference"))?;

        let shipping: ShippingInfo =
            serde_json::from_value(row.try_get::<serde_json::Value, _>("shipping_address")?)?;

        let status: String = row.try_get("order_status")?;
        let payment_status: String = row.try_get("payment_status")?;

        let order = Order {
            id: order_id,
            code: OrderCode::new(row.try_get::<String, _>("order_code")?),
            buyer,
            payment_method_id: PaymentMethodId::new(row.try_get("payment_method_id")?),
            shipping,
            notes: row.try_get("notes")?,
            totals: OrderTotals {
                subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
                discount: Money::from_cents(row.try_get("discount_cents")?),
                shipping_fee: Money::from_cents(row.try_get("shipping_fee_cents")?),
                grand_total: Money::from_cents(row.try_get("grand_total_cents")?),
            },
            payment_status: payment_status
                .parse::<PaymentStatus>()
                .map_err(|e| corrupt(order_id, e))?,
            status: status.parse::<OrderStatus>().map_err(|e| corrupt(order_id, e))?,
            placed_at: row.try_get("placed_at")?,
            updated_at: row.try_get("updated_at")?,
            items,
        };

        order.verify_totals().map_err(|e| corrupt(order_id, e))?;
        Ok(order)
    }

    fn row_to_item(order_id: OrderId, row: &PgRow) -> Result<OrderItem> {
        let quantity: i32 = row.try_get("quantity")?;

        Ok(OrderItem {
            id: row.try_get("id")?,
            order_id,
            variant_id: VariantId::new(row.try_get("variant_id")?),
            product_name: row.try_get("product_name")?,
            sku: row.try_get("sku")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity: u32::try_from(quantity).map_err(|e| corrupt(order_id, e))?,
            line_total: Money::from_cents(row.try_get("line_total_cents")?),
        })
    }

    async fn load_order(&mut self, order_id: OrderId, for_update: bool) -> Result<Option<Order>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock}");

        let Some(row) = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
        else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            r#"
            SELECT id, variant_id, product_name, sku, unit_price_cents, quantity, line_total_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY line_number ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        let items = item_rows
            .iter()
            .map(|row| Self::row_to_item(order_id, row))
            .collect::<Result<Vec<_>>>()?;

        Self::row_to_order(&row, items).map(Some)
    }
}

#[async_trait]
impl InventoryLedger for PostgresTransaction {
    #[tracing::instrument(skip(self))]
    async fn reserve_stock(
        &mut self,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<ReserveOutcome> {
        let requested = to_db_quantity(quantity)?;

        // Single conditional write: the check and the decrement cannot be split
        // by a concurrent reservation.
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE product_variants
            SET stock_quantity = stock_quantity - $2, updated_at = NOW()
            WHERE id = $1 AND is_active AND stock_quantity >= $2
            RETURNING stock_quantity
            "#,
        )
        .bind(variant_id.as_i64())
        .bind(requested)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(remaining) = remaining {
            let remaining = u32::try_from(remaining).map_err(|_| {
                StoreError::InvariantViolation(format!(
                    "stock of variant {variant_id} went negative"
                ))
            })?;
            return Ok(ReserveOutcome::Reserved { remaining });
        }

        // The update matched nothing; find out why.
        let row = sqlx::query("SELECT stock_quantity, is_active FROM product_variants WHERE id = $1")
            .bind(variant_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(ReserveOutcome::NotFound);
        };
        if !row.try_get::<bool, _>("is_active")? {
            return Ok(ReserveOutcome::Inactive);
        }

        let available: i32 = row.try_get("stock_quantity")?;
        Ok(ReserveOutcome::InsufficientStock {
            available: u32::try_from(available).unwrap_or(0),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn release_stock(&mut self, variant_id: VariantId, quantity: u32) -> Result<()> {
        let quantity = to_db_quantity(quantity)?;

        let result = sqlx::query(
            r#"
            UPDATE product_variants
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(variant_id.as_i64())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvariantViolation(format!(
                "cannot release stock of unknown variant {variant_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VariantCatalog for PostgresTransaction {
    async fn variant(&mut self, variant_id: VariantId) -> Result<Option<ProductVariant>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_name, sku, selling_price_cents, stock_quantity, is_active
            FROM product_variants
            WHERE id = $1
            "#,
        )
        .bind(variant_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stock: i32 = row.try_get("stock_quantity")?;
        Ok(Some(ProductVariant {
            id: VariantId::new(row.try_get("id")?),
            product_name: row.try_get("product_name")?,
            sku: row.try_get("sku")?,
            selling_price: Money::from_cents(row.try_get("selling_price_cents")?),
            stock_quantity: u32::try_from(stock).map_err(|_| {
                StoreError::InvariantViolation(format!("variant {variant_id} has negative stock"))
            })?,
            is_active: row.try_get("is_active")?,
        }))
    }
}

#[async_trait]
impl OrderRepository for PostgresTransaction {
    async fn next_order_number(&mut self) -> Result<u64> {
        let next: i64 = sqlx::query_scalar("SELECT nextval('order_number_seq')")
            .fetch_one(&mut *self.tx)
            .await?;

        u64::try_from(next)
            .map_err(|_| StoreError::InvariantViolation(format!("order sequence returned {next}")))
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.id, order_code = %order.code))]
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let shipping = serde_json::to_value(&order.shipping)?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_code, user_id, session_id, payment_method_id, shipping_address, notes,
                subtotal_cents, discount_cents, shipping_fee_cents, grand_total_cents,
                payment_status, order_status, placed_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.code.as_str())
        .bind(order.buyer.user_id().map(|id| id.as_uuid()))
        .bind(order.buyer.session_id().map(|s| s.as_str().to_owned()))
        .bind(order.payment_method_id.as_i64())
        .bind(shipping)
        .bind(&order.notes)
        .bind(order.totals.subtotal.cents())
        .bind(order.totals.discount.cents())
        .bind(order.totals.shipping_fee.cents())
        .bind(order.totals.grand_total.cents())
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(order.placed_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(UNIQUE_ORDER_CODE)
            {
                return StoreError::DuplicateOrderCode(order.code.to_string());
            }
            StoreError::Database(e)
        })?;

        for (line_number, item) in order.items.iter().enumerate() {
            let line_number = i32::try_from(line_number)
                .map_err(|_| StoreError::InvariantViolation("too many order lines".to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, line_number, variant_id, product_name, sku,
                    unit_price_cents, quantity, line_total_cents
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(item.id)
            .bind(order.id.as_uuid())
            .bind(line_number)
            .bind(item.variant_id.as_i64())
            .bind(&item.product_name)
            .bind(&item.sku)
            .bind(item.unit_price.cents())
            .bind(to_db_quantity(item.quantity)?)
            .bind(item.line_total.cents())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn append_history(&mut self, entry: &OrderStatusHistory) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_status_history (
                id, order_id, previous_status, new_status, notes, actor_id, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.order_id.as_uuid())
        .bind(entry.previous_status.map(|s| s.as_str()))
        .bind(entry.new_status.as_str())
        .bind(&entry.notes)
        .bind(entry.actor_id.map(|id| id.as_uuid()))
        .bind(entry.recorded_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        self.load_order(order_id, false).await
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        self.load_order(order_id, true).await
    }

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET order_status = $3, updated_at = $4 WHERE id = $1 AND order_status = $2",
        )
        .bind(order_id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvariantViolation(format!(
                "order {order_id} is no longer {from}"
            )));
        }
        Ok(())
    }

    async fn update_payment_status(
        &mut self,
        order_id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = $3, updated_at = $4 WHERE id = $1 AND payment_status = $2",
        )
        .bind(order_id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvariantViolation(format!(
                "order {order_id} payment is no longer {from}"
            )));
        }
        Ok(())
    }

    async fn history(&mut self, order_id: OrderId) -> Result<Vec<OrderStatusHistory>> {
        let rows = sqlx::query(
            r#"
            SELECT id, previous_status, new_status, notes, actor_id, recorded_at
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                let previous: Option<String> = row.try_get("previous_status")?;
                let new_status: String = row.try_get("new_status")?;
                let actor_id: Option<Uuid> = row.try_get("actor_id")?;

                Ok(OrderStatusHistory {
                    id: row.try_get("id")?,
                    order_id,
                    previous_status: previous
                        .map(|s| s.parse::<OrderStatus>())
                        .transpose()
                        .map_err(|e| corrupt(order_id, e))?,
                    new_status: new_status
                        .parse::<OrderStatus>()
                        .map_err(|e| corrupt(order_id, e))?,
                    notes: row.try_get("notes")?,
                    actor_id: actor_id.map(ActorId::from_uuid),
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
