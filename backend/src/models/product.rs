use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppError;

/// Catalog product as seen by the order and inventory core. Only the stock
/// column is ever written from here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub price: Decimal,
    pub stock: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryValue {
    pub total_value: Decimal,
    pub product_count: i64,
}

impl Product {
    /// Find product by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category_id, price, stock, is_active, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Find product by ID and hold a row lock until the transaction ends
    pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category_id, price, stock, is_active, created_at, updated_at
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Overwrite the cached stock projection
    pub async fn set_stock(conn: &mut PgConnection, id: Uuid, stock: i32) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE products SET stock = $1, updated_at = NOW() WHERE id = $2")
            .bind(stock)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::product_not_found(id));
        }

        Ok(())
    }

    /// Total value of products currently in stock
    pub async fn inventory_value(conn: &mut PgConnection) -> Result<InventoryValue, AppError> {
        let (total_value, product_count): (Option<Decimal>, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(price * stock), 0), COUNT(*)
            FROM products
            WHERE stock > 0
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;

        Ok(InventoryValue {
            total_value: total_value.unwrap_or(Decimal::ZERO),
            product_count,
        })
    }
}

