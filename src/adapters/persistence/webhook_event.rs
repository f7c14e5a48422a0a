use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::reconcile::{NewWebhookEvent, WebhookEventRepo},
};

#[async_trait]
impl WebhookEventRepo for PostgresPersistence {
    async fn record(&self, event: &NewWebhookEvent) -> AppResult<Uuid> {
        let row = sqlx::query(
            r#"
            INSERT INTO webhook_events (provider, event_type, bill_id, transaction_id, status, raw_payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&event.provider)
        .bind(&event.event_type)
        .bind(&event.bill_id)
        .bind(&event.transaction_id)
        .bind(&event.status)
        .bind(&event.raw_payload)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.get("id"))
    }
}
