use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use storefront_shared::{
    AlertType, MovementReason, MovementType, RecordMovementRequest, DEFAULT_MOVEMENT_PAGE_SIZE,
    DEFAULT_STOCK_HISTORY_DAYS, MAX_STOCK_HISTORY_DAYS,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::inventory::{daily_stock_curve, stock_after};
use crate::models::{
    InventoryMovement, InventoryValue, NewInventoryMovement, NewStockAlert, StockAlert,
    StockHistoryPoint,
};
use crate::store::{SharedStore, StoreTransaction};


const MAX_MOVEMENT_PAGE_SIZE: i64 = 500;

/// A single stock change to be written to the ledger
#[derive(Debug, Clone)]
pub struct MovementCommand {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub reason: MovementReason,
    pub quantity: i32,
    pub cost: Option<Decimal>,
    pub price: Option<Decimal>,
    pub notes: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub created_by_id: Option<Uuid>,
}

impl MovementCommand {
    pub fn new(
        product_id: Uuid,
        movement_type: MovementType,
        reason: MovementReason,
        quantity: i32,
    ) -> Self {
        Self {
            product_id,
            movement_type,
            reason,
            quantity,
            cost: None,
            price: None,
            notes: None,
            reference_id: None,
            reference_type: None,
            created_by_id: None,
        }
    }

    pub fn from_request(request: RecordMovementRequest, actor_id: Option<Uuid>) -> Self {
        Self {
            product_id: request.product_id,
            movement_type: request.movement_type,
            reason: request.reason,
            quantity: request.quantity,
            cost: request.cost,
            price: request.price,
            notes: request.notes,
            reference_id: request.reference_id,
            reference_type: request.reference_type,
            created_by_id: actor_id,
        }
    }

    pub fn referencing(mut self, reference_type: &str, reference_id: Uuid) -> Self {
        self.reference_type = Some(reference_type.to_string());
        self.reference_id = Some(reference_id);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StockHistory {
    pub product_id: Uuid,
    pub days: i64,
    pub current_stock: i32,
    pub points: Vec<StockHistoryPoint>,
}

/// Inventory ledger: every stock change goes through here
#[derive(Clone)]
pub struct InventoryService {
    store: SharedStore,
}

impl InventoryService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Apply a movement to a product's stock and append it to the ledger
    pub async fn record_movement(
        &self,
        command: MovementCommand,
    ) -> Result<InventoryMovement, AppError> {
        let mut tx = self.store.begin().await?;
        let movement = record_movement_in(tx.as_mut(), command).await?;
        tx.commit().await?;

        info!(
            "Recorded {} movement for product {}: {} -> {}",
            movement.movement_type, movement.product_id, movement.previous_stock, movement.new_stock
        );

        Ok(movement)
    }

    /// Set a product's stock to an absolute level via an adjustment movement
    pub async fn adjust_inventory(
        &self,
        product_id: Uuid,
        new_quantity: i32,
        reason: MovementReason,
        notes: Option<String>,
        actor_id: Option<Uuid>,
    ) -> Result<InventoryMovement, AppError> {
        if new_quantity < 0 {
            return Err(AppError::Validation(
                "new_quantity: Value out of range".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let product = tx
            .lock_product(product_id)
            .await?
            .ok_or_else(|| AppError::product_not_found(product_id))?;

        let delta = new_quantity - product.stock;
        let mut command =
            MovementCommand::new(product_id, MovementType::Adjustment, reason, delta);
        command.notes = notes;
        command.created_by_id = actor_id;

        let movement = record_movement_in(tx.as_mut(), command).await?;
        tx.commit().await?;

        info!(
            "Adjusted product {} stock from {} to {}",
            product_id, movement.previous_stock, movement.new_stock
        );

        Ok(movement)
    }

    /// Daily stock levels over the last `days` days, oldest first
    pub async fn get_stock_history(
        &self,
        product_id: Uuid,
        days: Option<i64>,
    ) -> Result<StockHistory, AppError> {
        let days = days.unwrap_or(DEFAULT_STOCK_HISTORY_DAYS);
        if !(1..=MAX_STOCK_HISTORY_DAYS).contains(&days) {
            return Err(AppError::Validation(format!(
                "days must be between 1 and {}",
                MAX_STOCK_HISTORY_DAYS
            )));
        }

        let mut tx = self.store.begin().await?;
        let product = tx
            .find_product(product_id)
            .await?
            .ok_or_else(|| AppError::product_not_found(product_id))?;

        let today = Utc::now().date_naive();
        let first_day = today - Duration::days(days - 1);
        let midnight = first_day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::Internal(format!("Invalid history start {}", first_day)))?;
        let window_start = Utc.from_utc_datetime(&midnight);

        let movements = tx.movements_since(product_id, window_start).await?;
        let opening_stock = match tx.last_movement_before(product_id, window_start).await? {
            Some(before) => before.new_stock,
            None => movements
                .first()
                .map(|m| m.previous_stock)
                .unwrap_or(product.stock),
        };
        tx.commit().await?;

        debug!(
            "Built {}-day stock history for product {} from {} movements",
            days,
            product_id,
            movements.len()
        );

        Ok(StockHistory {
            product_id,
            days,
            current_stock: product.stock,
            points: daily_stock_curve(today, days, opening_stock, &movements),
        })
    }

    pub async fn get_inventory_value(&self) -> Result<InventoryValue, AppError> {
        let mut tx = self.store.begin().await?;
        let value = tx.inventory_value().await?;
        tx.commit().await?;
        Ok(value)
    }

    /// Most recent ledger entries for a product, newest first
    pub async fn list_movements(
        &self,
        product_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        let limit = limit
            .unwrap_or(DEFAULT_MOVEMENT_PAGE_SIZE)
            .clamp(1, MAX_MOVEMENT_PAGE_SIZE);

        let mut tx = self.store.begin().await?;
        if tx.find_product(product_id).await?.is_none() {
            return Err(AppError::product_not_found(product_id));
        }
        let movements = tx.recent_movements(product_id, limit).await?;
        tx.commit().await?;

        Ok(movements)
    }

    /// Configure the alert rule for (product, alert type). The rule is
    /// evaluated against the current stock straight away.
    pub async fn upsert_alert(
        &self,
        product_id: Uuid,
        alert_type: AlertType,
        threshold_quantity: i32,
    ) -> Result<StockAlert, AppError> {
        if threshold_quantity < 0 {
            return Err(AppError::Validation(
                "threshold_quantity: Value out of range".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let product = tx
            .lock_product(product_id)
            .await?
            .ok_or_else(|| AppError::product_not_found(product_id))?;

        let mut alert = tx
            .upsert_alert(NewStockAlert {
                product_id,
                alert_type,
                threshold_quantity,
                current_quantity: product.stock,
            })
            .await?;

        if alert.evaluate(product.stock, Utc::now()) {
            tx.save_alert(&alert).await?;
        }
        tx.commit().await?;

        info!(
            "Configured {} alert for product {} at threshold {}",
            alert_type, product_id, threshold_quantity
        );

        Ok(alert)
    }

    /// Deactivate an alert. Alerts are never deleted.
    pub async fn dismiss_alert(&self, alert_id: Uuid) -> Result<StockAlert, AppError> {
        let mut tx = self.store.begin().await?;
        let mut alert = tx
            .find_alert(alert_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stock alert {} not found", alert_id)))?;

        alert.is_active = false;
        tx.save_alert(&alert).await?;
        tx.commit().await?;

        info!("Dismissed {} alert {}", alert.alert_type, alert_id);
        Ok(alert)
    }

    /// Active alerts that have fired, most recently triggered first
    pub async fn list_active_alerts(&self) -> Result<Vec<StockAlert>, AppError> {
        let mut tx = self.store.begin().await?;
        let alerts = tx.triggered_alerts().await?;
        tx.commit().await?;
        Ok(alerts)
    }
}

/// Write one movement inside an open unit of work.
///
/// Locks the product, applies the movement rule, appends the ledger row with
/// the effective delta, updates the cached stock and re-evaluates alerts.
pub(crate) async fn record_movement_in(
    tx: &mut dyn StoreTransaction,
    command: MovementCommand,
) -> Result<InventoryMovement, AppError> {
    let product = tx
        .lock_product(command.product_id)
        .await?
        .ok_or_else(|| AppError::product_not_found(command.product_id))?;

    let previous_stock = product.stock;
    let new_stock = stock_after(command.movement_type, previous_stock, command.quantity);

    let movement = tx
        .insert_movement(NewInventoryMovement {
            product_id: command.product_id,
            movement_type: command.movement_type,
            reason: command.reason,
            quantity: new_stock - previous_stock,
            previous_stock,
            new_stock,
            cost: command.cost,
            price: command.price,
            notes: command.notes,
            reference_id: command.reference_id,
            reference_type: command.reference_type,
            created_by_id: command.created_by_id,
        })
        .await?;

    tx.set_product_stock(command.product_id, new_stock).await?;
    evaluate_alerts_in(tx, command.product_id, new_stock).await?;

    Ok(movement)
}

async fn evaluate_alerts_in(
    tx: &mut dyn StoreTransaction,
    product_id: Uuid,
    stock: i32,
) -> Result<(), AppError> {
    let now = Utc::now();

    for mut alert in tx.active_alerts_for_product(product_id).await? {
        if alert.evaluate(stock, now) {
            warn!(
                "Stock alert {} fired for product {}: {}",
                alert.alert_type,
                product_id,
                alert.message.as_deref().unwrap_or_default()
            );
        }
        tx.save_alert(&alert).await?;
    }

    Ok(())
}
