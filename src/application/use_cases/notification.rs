use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use serde_json::{Value as JsonValue, json};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::ports::subscription_extender::{ExtensionResult, PaymentSource},
};

pub const NOTIFICATION_TYPE_PERSONAL: &str = "personal";
pub const PAYMENT_SUCCESS_TITLE: &str = "Pembayaran Berjaya! 🎉";

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    /// Whether a personal notification already references this payment.
    async fn exists_for_payment(&self, bill_id: &str) -> AppResult<bool>;

    async fn insert(&self, notification: &NewNotification) -> AppResult<Uuid>;

    async fn insert_read(&self, notification_id: Uuid, user_id: Uuid) -> AppResult<()>;
}

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub target_type: String,
    pub target_criteria: JsonValue,
    pub metadata: JsonValue,
    pub expires_at: NaiveDateTime,
    pub is_active: bool,
}

/// Everything needed to tell a user their payment went through.
#[derive(Debug, Clone)]
pub struct PaymentSuccessNotice {
    pub user_id: Uuid,
    pub bill_id: String,
    pub plan_id: String,
    pub amount_cents: i64,
    pub source: PaymentSource,
    pub subscription: Option<ExtensionResult>,
}

/// Render cents as a two-decimal string, e.g. `5000` -> `"50.00"`.
pub fn format_amount(amount_cents: i64) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

impl PaymentSuccessNotice {
    fn to_notification(&self, now: NaiveDateTime, ttl: Duration) -> NewNotification {
        let amount = format_amount(self.amount_cents);
        let subscription = self.subscription.clone().unwrap_or_default();

        NewNotification {
            notification_type: NOTIFICATION_TYPE_PERSONAL.to_string(),
            title: PAYMENT_SUCCESS_TITLE.to_string(),
            message: format!(
                "Terima kasih! Pembayaran RM{amount} untuk langganan {} telah berjaya. Langganan anda kini aktif.",
                self.plan_id
            ),
            target_type: "user".to_string(),
            target_criteria: json!({ "user_ids": [self.user_id] }),
            metadata: json!({
                "type": "payment_success",
                "sub_type": "payment_success",
                "icon": "🎉",
                "priority": "high",
                "payment_id": self.bill_id,
                "bill_id": self.bill_id,
                "plan_id": self.plan_id,
                "amount": amount,
                "subscription_id": subscription.new_subscription_id,
                "days_added": subscription.days_added,
                "payment_date": now.and_utc().to_rfc3339(),
                "action_url": "/subscription",
                "source": format!("toyyibpay_{}", self.source),
            }),
            expires_at: now + ttl,
            is_active: true,
        }
    }
}

// ============================================================================
// Use Case
// ============================================================================

/// Writes the "payment succeeded" notification and its unread marker.
///
/// Best-effort: failures are logged and swallowed so they never undo a recorded payment.
#[derive(Clone)]
pub struct NotificationEmitter {
    repo: Arc<dyn NotificationRepo>,
    ttl: Duration,
}

impl NotificationEmitter {
    pub fn new(repo: Arc<dyn NotificationRepo>, ttl: Duration) -> Self {
        Self { repo, ttl }
    }

    #[instrument(skip(self, notice), fields(bill_id = %notice.bill_id, user_id = %notice.user_id))]
    pub async fn emit_payment_success(&self, notice: &PaymentSuccessNotice) {
        match self.try_emit(notice).await {
            Ok(Some(id)) => info!(notification_id = %id, "Payment success notification created"),
            Ok(None) => info!("Notification already exists for payment, skipping"),
            Err(e) => error!(error = %e, "Failed to create payment notification"),
        }
    }

    /// Returns the new notification id, or `None` when one already existed.
    async fn try_emit(&self, notice: &PaymentSuccessNotice) -> AppResult<Option<Uuid>> {
        if self.repo.exists_for_payment(&notice.bill_id).await? {
            return Ok(None);
        }

        let notification = notice.to_notification(Utc::now().naive_utc(), self.ttl);
        let id = self.repo.insert(&notification).await?;

        // Keyed by the id we just got back; no re-query.
        if let Err(e) = self.repo.insert_read(id, notice.user_id).await {
            error!(error = %e, notification_id = %id, "Failed to create notification read entry");
        }

        Ok(Some(id))
    }
}
