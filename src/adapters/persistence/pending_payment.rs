use async_trait::async_trait;
use sqlx::Row;
use tracing::warn;

use crate::{
    adapters::persistence::{PostgresPersistence, payment},
    app_error::{AppError, AppResult},
    application::use_cases::reconcile::{
        ClaimedCompletion, PaymentCompletion, PendingPaymentProfile, PendingPaymentRepo,
    },
    domain::entities::pending_payment_status::PendingPaymentStatus,
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> PendingPaymentProfile {
    PendingPaymentProfile {
        id: row.get("id"),
        bill_id: row.get("bill_id"),
        user_id: row.get("user_id"),
        plan_id: row.get("plan_id"),
        amount_cents: row.get("amount_cents"),
        status: row.get::<PendingPaymentStatus, _>("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = "id, bill_id, user_id, plan_id, amount_cents, status, created_at, updated_at";

#[async_trait]
impl PendingPaymentRepo for PostgresPersistence {
    async fn find_pending(&self, bill_id: &str) -> AppResult<Option<PendingPaymentProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pending_payments WHERE bill_id = $1 AND status = 'pending'",
            SELECT_COLS
        ))
        .bind(bill_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn claim_completion(
        &self,
        bill_id: &str,
        completion: &PaymentCompletion,
    ) -> AppResult<Option<ClaimedCompletion>> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;

        // The claim goes first so its row lock serializes every other transition
        // for this bill until commit.
        let claimed = sqlx::query(&format!(
            r#"
            UPDATE pending_payments
            SET status = 'completed', updated_at = CURRENT_TIMESTAMP
            WHERE bill_id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(bill_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let Some(row) = claimed else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        let payment = match payment::complete_oldest(
            &mut tx,
            bill_id,
            &completion.provider_payment_id,
            &completion.raw_payload,
        )
        .await
        {
            Ok(payment) => payment,
            Err(e) => {
                warn!(bill_id, error = %e, "Payment update failed, releasing claim");
                tx.rollback().await.ok();
                return Err(e);
            }
        };

        tx.commit().await.map_err(AppError::from)?;

        Ok(Some(ClaimedCompletion {
            pending: row_to_profile(row),
            payment,
        }))
    }

    async fn mark_failed(&self, bill_id: &str) -> AppResult<bool> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;

        let result = sqlx::query(
            r#"
            UPDATE pending_payments
            SET status = 'failed', updated_at = CURRENT_TIMESTAMP
            WHERE bill_id = $1 AND status = 'pending'
            "#,
        )
        .bind(bill_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        if let Err(e) = payment::fail_oldest(&mut tx, bill_id).await {
            tx.rollback().await.ok();
            return Err(e);
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok(true)
    }
}
