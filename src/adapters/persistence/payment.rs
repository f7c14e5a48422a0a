//! Payment-row updates. These only run inside the pending-row transaction in
//! `pending_payment.rs`, so they take the open connection instead of the pool.

use serde_json::Value as JsonValue;
use sqlx::{PgConnection, Row};

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::reconcile::PaymentProfile,
    domain::entities::payment_status::PaymentStatus,
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> PaymentProfile {
    PaymentProfile {
        id: row.get("id"),
        bill_id: row.get("bill_id"),
        status: row.get::<PaymentStatus, _>("status"),
        provider_payment_id: row.get("provider_payment_id"),
        paid_at: row.get("paid_at"),
        raw_payload: row.get("raw_payload"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str =
    "id, bill_id, status, provider_payment_id, paid_at, raw_payload, created_at, updated_at";

/// Subquery selecting the authoritative (earliest) row for a bill.
const OLDEST_FOR_BILL: &str =
    "SELECT id FROM payments WHERE bill_id = $1 ORDER BY created_at ASC, id ASC LIMIT 1";

/// Complete the oldest payment row for the bill if it is still `pending`.
pub(super) async fn complete_oldest(
    conn: &mut PgConnection,
    bill_id: &str,
    provider_payment_id: &str,
    raw_payload: &JsonValue,
) -> AppResult<Option<PaymentProfile>> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE payments
        SET status = 'completed',
            paid_at = CURRENT_TIMESTAMP,
            provider_payment_id = $2,
            raw_payload = COALESCE(raw_payload, '{{}}'::jsonb) || $3::jsonb
                || jsonb_build_object('processed_at', to_char(CURRENT_TIMESTAMP AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ({}) AND status = 'pending'
        RETURNING {}
        "#,
        OLDEST_FOR_BILL, SELECT_COLS
    ))
    .bind(bill_id)
    .bind(provider_payment_id)
    .bind(raw_payload)
    .fetch_optional(&mut *conn)
    .await
    .map_err(AppError::from)?;

    Ok(row.map(row_to_profile))
}

/// Fail the oldest payment row for the bill if it is still `pending`.
pub(super) async fn fail_oldest(conn: &mut PgConnection, bill_id: &str) -> AppResult<bool> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE payments
        SET status = 'failed', updated_at = CURRENT_TIMESTAMP
        WHERE id = ({}) AND status = 'pending'
        "#,
        OLDEST_FOR_BILL
    ))
    .bind(bill_id)
    .execute(&mut *conn)
    .await
    .map_err(AppError::from)?;

    Ok(result.rows_affected() > 0)
}
