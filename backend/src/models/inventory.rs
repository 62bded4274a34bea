use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use storefront_shared::{AlertType, MovementReason, MovementType};
use uuid::Uuid;

use crate::error::AppError;

const MOVEMENT_COLUMNS: &str = r#"
    id, product_id, movement_type, reason, quantity, previous_stock, new_stock,
    cost, price, notes, reference_id, reference_type, created_by_id, created_at
"#;

const ALERT_COLUMNS: &str = r#"
    id, product_id, alert_type, threshold_quantity, current_quantity, is_active,
    last_triggered_at, message, created_at, updated_at
"#;

/// One audited change to a product's stock. Rows are append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub reason: MovementReason,
    /// Effective signed delta, always `new_stock - previous_stock`.
    pub quantity: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub cost: Option<Decimal>,
    pub price: Option<Decimal>,
    pub notes: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub created_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInventoryMovement {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub reason: MovementReason,
    pub quantity: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub cost: Option<Decimal>,
    pub price: Option<Decimal>,
    pub notes: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub created_by_id: Option<Uuid>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StockAlert {
    pub id: Uuid,
    pub product_id: Uuid,
    pub alert_type: AlertType,
    pub threshold_quantity: i32,
    pub current_quantity: i32,
    pub is_active: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStockAlert {
    pub product_id: Uuid,
    pub alert_type: AlertType,
    pub threshold_quantity: i32,
    pub current_quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHistoryPoint {
    pub date: NaiveDate,
    pub stock: i32,
}

/// Stock level after applying a movement of the given type.
///
/// Inbound movements add the magnitude of `quantity`, outbound movements
/// subtract it, and adjustments apply it with its sign. The result is never
/// negative.
pub fn stock_after(movement_type: MovementType, previous: i32, quantity: i32) -> i32 {
    let magnitude = quantity.saturating_abs();

    match movement_type {
        MovementType::Purchase | MovementType::Return => previous.saturating_add(magnitude),
        MovementType::Sale | MovementType::Damaged | MovementType::Expired => {
            previous.saturating_sub(magnitude).max(0)
        }
        MovementType::Adjustment => previous.saturating_add(quantity).max(0),
        MovementType::Transfer => previous.saturating_sub(magnitude).max(0),
    }
}

/// Daily stock curve for the `days` calendar days ending on `today`.
///
/// Each day takes the `new_stock` of its latest movement; days without a
/// movement carry the previous value forward, starting from `opening_stock`.
/// `movements` must be ordered oldest first.
pub fn daily_stock_curve(
    today: NaiveDate,
    days: i64,
    opening_stock: i32,
    movements: &[InventoryMovement],
) -> Vec<StockHistoryPoint> {
    let start = today - Duration::days(days - 1);

    let mut closing: BTreeMap<NaiveDate, i32> = BTreeMap::new();
    for movement in movements {
        let day = movement.created_at.date_naive();
        if day >= start && day <= today {
            closing.insert(day, movement.new_stock);
        }
    }

    let mut points = Vec::with_capacity(days as usize);
    let mut carried = opening_stock;
    let mut day = start;
    while day <= today {
        if let Some(stock) = closing.get(&day) {
            carried = *stock;
        }
        points.push(StockHistoryPoint { date: day, stock: carried });
        day += Duration::days(1);
    }

    points
}

impl InventoryMovement {
    pub async fn create(
        conn: &mut PgConnection,
        movement: NewInventoryMovement,
    ) -> Result<Self, AppError> {
        let saved = sqlx::query_as::<_, InventoryMovement>(&format!(
            r#"
            INSERT INTO inventory_movements (
                id, product_id, movement_type, reason, quantity, previous_stock, new_stock,
                cost, price, notes, reference_id, reference_type, created_by_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.reason)
        .bind(movement.quantity)
        .bind(movement.previous_stock)
        .bind(movement.new_stock)
        .bind(movement.cost)
        .bind(movement.price)
        .bind(&movement.notes)
        .bind(movement.reference_id)
        .bind(&movement.reference_type)
        .bind(movement.created_by_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(saved)
    }

    /// Movements for a product created at or after `since`, oldest first
    pub async fn find_since(
        conn: &mut PgConnection,
        product_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Self>, AppError> {
        let movements = sqlx::query_as::<_, InventoryMovement>(&format!(
            r#"
            SELECT {} FROM inventory_movements
            WHERE product_id = $1 AND created_at >= $2
            ORDER BY created_at ASC
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        Ok(movements)
    }

    /// Latest movement for a product strictly before `before`
    pub async fn find_last_before(
        conn: &mut PgConnection,
        product_id: Uuid,
        before: DateTime<Utc>,
    ) -> Result<Option<Self>, AppError> {
        let movement = sqlx::query_as::<_, InventoryMovement>(&format!(
            r#"
            SELECT {} FROM inventory_movements
            WHERE product_id = $1 AND created_at < $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .bind(before)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(movement)
    }

    /// Most recent movements for a product, newest first
    pub async fn find_recent(
        conn: &mut PgConnection,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, AppError> {
        let movements = sqlx::query_as::<_, InventoryMovement>(&format!(
            r#"
            SELECT {} FROM inventory_movements
            WHERE product_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        Ok(movements)
    }
}

impl StockAlert {
    /// Whether this rule fires at the given stock level
    pub fn is_triggered_by(&self, stock: i32) -> bool {
        match self.alert_type {
            AlertType::LowStock => stock <= self.threshold_quantity,
            AlertType::OutOfStock => stock == 0,
            AlertType::Overstock => stock >= self.threshold_quantity,
        }
    }

    /// Mirror the new stock level and stamp the alert if it fires.
    ///
    /// An alert that does not fire keeps its previous trigger state; alerts
    /// are only cleared by dismissal.
    pub fn evaluate(&mut self, stock: i32, now: DateTime<Utc>) -> bool {
        self.current_quantity = stock;
        self.updated_at = now;

        if !self.is_triggered_by(stock) {
            return false;
        }

        self.last_triggered_at = Some(now);
        self.message = Some(match self.alert_type {
            AlertType::LowStock => format!(
                "Low stock: {} units remaining (threshold {})",
                stock, self.threshold_quantity
            ),
            AlertType::OutOfStock => "Out of stock".to_string(),
            AlertType::Overstock => format!(
                "Overstock: {} units on hand (threshold {})",
                stock, self.threshold_quantity
            ),
        });

        true
    }

    /// Create the rule for (product, alert type) or update its threshold and
    /// re-activate it
    pub async fn upsert(conn: &mut PgConnection, alert: NewStockAlert) -> Result<Self, AppError> {
        let saved = sqlx::query_as::<_, StockAlert>(&format!(
            r#"
            INSERT INTO stock_alerts (id, product_id, alert_type, threshold_quantity, current_quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (product_id, alert_type) DO UPDATE
            SET threshold_quantity = EXCLUDED.threshold_quantity,
                current_quantity = EXCLUDED.current_quantity,
                is_active = TRUE,
                updated_at = NOW()
            RETURNING {}
            "#,
            ALERT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(alert.product_id)
        .bind(alert.alert_type)
        .bind(alert.threshold_quantity)
        .bind(alert.current_quantity)
        .fetch_one(&mut *conn)
        .await?;

        Ok(saved)
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, AppError> {
        let alert = sqlx::query_as::<_, StockAlert>(&format!(
            "SELECT {} FROM stock_alerts WHERE id = $1",
            ALERT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(alert)
    }

    pub async fn find_active_by_product(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> Result<Vec<Self>, AppError> {
        let alerts = sqlx::query_as::<_, StockAlert>(&format!(
            r#"
            SELECT {} FROM stock_alerts
            WHERE product_id = $1 AND is_active = TRUE
            ORDER BY alert_type
            "#,
            ALERT_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(alerts)
    }

    /// Active alerts that have fired at least once
    pub async fn find_triggered(conn: &mut PgConnection) -> Result<Vec<Self>, AppError> {
        let alerts = sqlx::query_as::<_, StockAlert>(&format!(
            r#"
            SELECT {} FROM stock_alerts
            WHERE is_active = TRUE AND last_triggered_at IS NOT NULL
            ORDER BY last_triggered_at DESC
            "#,
            ALERT_COLUMNS
        ))
        .fetch_all(&mut *conn)
        .await?;

        Ok(alerts)
    }

    pub async fn save(conn: &mut PgConnection, alert: &StockAlert) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE stock_alerts
            SET current_quantity = $1, is_active = $2, last_triggered_at = $3,
                message = $4, updated_at = NOW()
            WHERE id = $5
            "#,
        )
        .bind(alert.current_quantity)
        .bind(alert.is_active)
        .bind(alert.last_triggered_at)
        .bind(&alert.message)
        .bind(alert.id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
