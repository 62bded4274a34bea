use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppError;

/// Accounts are owned by the identity service; the core only checks that an
/// order owner exists.
pub struct User;

impl User {
    pub async fn exists(conn: &mut PgConnection, id: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(exists)
    }
}
