use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::notification::{
        NOTIFICATION_TYPE_PERSONAL, NewNotification, NotificationRepo,
    },
};

#[async_trait]
impl NotificationRepo for PostgresPersistence {
    async fn exists_for_payment(&self, bill_id: &str) -> AppResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM notifications
                WHERE type = $1 AND metadata->>'payment_id' = $2
            ) AS found
            "#,
        )
        .bind(NOTIFICATION_TYPE_PERSONAL)
        .bind(bill_id)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.get("found"))
    }

    async fn insert(&self, notification: &NewNotification) -> AppResult<Uuid> {
        let row = sqlx::query(
            r#"
            INSERT INTO notifications (
                type, title, message, target_type, target_criteria, metadata, expires_at, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&notification.notification_type)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.target_type)
        .bind(&notification.target_criteria)
        .bind(&notification.metadata)
        .bind(notification.expires_at)
        .bind(notification.is_active)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.get("id"))
    }

    async fn insert_read(&self, notification_id: Uuid, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_reads (notification_id, user_id, is_read)
            VALUES ($1, $2, FALSE)
            ON CONFLICT (notification_id, user_id) DO NOTHING
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }
}
