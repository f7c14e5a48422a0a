use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::{
        helpers::callback_parsing::CanonicalCallback,
        ports::subscription_extender::{
            ExtensionPaymentData, ExtensionRequest, ExtensionResult, PaymentSource,
            SubscriptionExtender,
        },
        use_cases::notification::{NotificationEmitter, PaymentSuccessNotice},
    },
    domain::entities::{
        gateway_status::{GatewayOutcome, SUCCESS_CODE},
        payment_status::PaymentStatus,
        pending_payment_status::PendingPaymentStatus,
    },
};

pub const PROVIDER_TOYYIBPAY: &str = "toyyibpay";
pub const EVENT_PAYMENT_CALLBACK: &str = "payment_callback";
pub const EVENT_PAYMENT_RECOVERY: &str = "payment_recovery";

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait PendingPaymentRepo: Send + Sync {
    async fn find_pending(&self, bill_id: &str) -> AppResult<Option<PendingPaymentProfile>>;

    /// Atomically flip the pending row to `completed` and complete the oldest payment
    /// row. Returns the claimed row only for the caller that performed the transition;
    /// every later caller gets `None`. If the payment update fails, neither row changes.
    async fn claim_completion(
        &self,
        bill_id: &str,
        completion: &PaymentCompletion,
    ) -> AppResult<Option<ClaimedCompletion>>;

    /// Atomically flip the pending row to `failed` and fail the oldest payment row.
    /// Returns whether the pending row transitioned.
    async fn mark_failed(&self, bill_id: &str) -> AppResult<bool>;
}

#[async_trait]
pub trait WebhookEventRepo: Send + Sync {
    async fn record(&self, event: &NewWebhookEvent) -> AppResult<Uuid>;
}

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PendingPaymentProfile {
    pub id: Uuid,
    pub bill_id: String,
    pub user_id: Uuid,
    pub plan_id: String,
    pub amount_cents: i64,
    pub status: PendingPaymentStatus,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentProfile {
    pub id: Uuid,
    pub bill_id: String,
    pub status: PaymentStatus,
    pub provider_payment_id: Option<String>,
    pub paid_at: Option<NaiveDateTime>,
    pub raw_payload: JsonValue,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// What the oldest payment row is stamped with when a bill completes.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCompletion {
    pub provider_payment_id: String,
    pub raw_payload: JsonValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedCompletion {
    pub pending: PendingPaymentProfile,
    /// `None` when the bill had no payment row still pending.
    pub payment: Option<PaymentProfile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWebhookEvent {
    pub provider: String,
    pub event_type: String,
    pub bill_id: Option<String>,
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    pub raw_payload: JsonValue,
}

impl NewWebhookEvent {
    pub fn from_callback(callback: &CanonicalCallback) -> Self {
        Self {
            provider: PROVIDER_TOYYIBPAY.to_string(),
            event_type: EVENT_PAYMENT_CALLBACK.to_string(),
            bill_id: Some(callback.bill_code.clone()),
            transaction_id: callback.transaction_id.clone(),
            status: callback.status_id.clone().or_else(|| callback.status.clone()),
            raw_payload: callback.raw_payload(),
        }
    }
}

/// Input to the success transition, independent of how the outcome was learned.
#[derive(Debug, Clone)]
pub struct CompletionInput {
    pub bill_id: String,
    pub transaction_id: Option<String>,
    /// Amount reported by the gateway; falls back to the pending row's amount.
    pub amount_cents: Option<i64>,
    pub raw_payload: JsonValue,
    pub source: PaymentSource,
}

impl CompletionInput {
    pub fn from_callback(callback: &CanonicalCallback) -> Self {
        Self {
            bill_id: callback.bill_code.clone(),
            transaction_id: callback.transaction_id.clone(),
            amount_cents: callback.amount_cents(),
            raw_payload: callback.raw_payload(),
            source: PaymentSource::Webhook,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSummary {
    pub bill_code: String,
    pub user_id: Uuid,
    pub plan_id: String,
    pub amount_cents: i64,
    pub subscription: Option<ExtensionResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// This call moved the bill to `completed` and ran the side effects.
    Completed(CompletionSummary),
    /// Success reported, but no pending row was left to complete.
    NoPendingRecord,
    /// Failure reported. `transitioned` is false when the bill was already terminal.
    Failed { transitioned: bool },
    /// Indeterminate status; nothing changed.
    Pending,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Completed(_) => "completed",
            ReconcileOutcome::NoPendingRecord => "no_pending_record",
            ReconcileOutcome::Failed { .. } => "failed",
            ReconcileOutcome::Pending => "pending",
        }
    }
}

// ============================================================================
// Use Case
// ============================================================================

#[derive(Clone)]
pub struct PaymentReconciler {
    pending_repo: Arc<dyn PendingPaymentRepo>,
    event_repo: Arc<dyn WebhookEventRepo>,
    extender: Arc<dyn SubscriptionExtender>,
    notifications: NotificationEmitter,
}

impl PaymentReconciler {
    pub fn new(
        pending_repo: Arc<dyn PendingPaymentRepo>,
        event_repo: Arc<dyn WebhookEventRepo>,
        extender: Arc<dyn SubscriptionExtender>,
        notifications: NotificationEmitter,
    ) -> Self {
        Self {
            pending_repo,
            event_repo,
            extender,
            notifications,
        }
    }

    /// Apply a verified, parsed gateway callback.
    #[instrument(skip(self, callback), fields(bill_id = %callback.bill_code))]
    pub async fn handle_callback(&self, callback: &CanonicalCallback) -> AppResult<ReconcileOutcome> {
        self.record_event(&NewWebhookEvent::from_callback(callback))
            .await;

        let outcome = callback.outcome();
        info!(
            outcome = %outcome,
            status = ?callback.status,
            status_id = ?callback.status_id,
            "Processing payment callback"
        );

        match outcome {
            GatewayOutcome::Successful => self.complete(CompletionInput::from_callback(callback)).await,
            GatewayOutcome::Failed => self.fail(&callback.bill_code).await,
            GatewayOutcome::Pending => Ok(ReconcileOutcome::Pending),
        }
    }

    /// Append to the audit log. Never fails the caller.
    pub async fn record_event(&self, event: &NewWebhookEvent) {
        if let Err(e) = self.event_repo.record(event).await {
            warn!(error = %e, bill_id = ?event.bill_id, "Failed to record webhook event");
        }
    }

    /// Success transition: claim the pending row together with the payment row, then
    /// run the subscription extension and notification exactly once.
    #[instrument(skip(self, input), fields(bill_id = %input.bill_id, source = %input.source))]
    pub async fn complete(&self, input: CompletionInput) -> AppResult<ReconcileOutcome> {
        if self.pending_repo.find_pending(&input.bill_id).await?.is_none() {
            warn!("No pending payment found for bill");
            return Ok(ReconcileOutcome::NoPendingRecord);
        }

        let completion = PaymentCompletion {
            provider_payment_id: input
                .transaction_id
                .clone()
                .unwrap_or_else(|| input.bill_id.clone()),
            raw_payload: input.raw_payload,
        };

        // Only the caller that flips the pending row continues to the side effects.
        let Some(ClaimedCompletion {
            pending: claimed,
            payment,
        }) = self
            .pending_repo
            .claim_completion(&input.bill_id, &completion)
            .await?
        else {
            info!("Bill left pending before this callback could claim it");
            return Ok(ReconcileOutcome::NoPendingRecord);
        };

        match payment {
            Some(payment) => info!(
                payment_id = %payment.id,
                status = %payment.status,
                "Payment record updated"
            ),
            None => warn!("No pending payment record found to update"),
        }

        let amount_cents = input.amount_cents.unwrap_or(claimed.amount_cents);
        let subscription = self
            .extend_subscription(
                &claimed,
                &completion.provider_payment_id,
                amount_cents,
                input.source,
            )
            .await;

        self.notifications
            .emit_payment_success(&PaymentSuccessNotice {
                user_id: claimed.user_id,
                bill_id: input.bill_id.clone(),
                plan_id: claimed.plan_id.clone(),
                amount_cents,
                source: input.source,
                subscription: subscription.clone(),
            })
            .await;

        info!(
            user_id = %claimed.user_id,
            plan_id = %claimed.plan_id,
            pending_status = %claimed.status,
            "Payment reconciled"
        );

        Ok(ReconcileOutcome::Completed(CompletionSummary {
            bill_code: input.bill_id,
            user_id: claimed.user_id,
            plan_id: claimed.plan_id,
            amount_cents,
            subscription,
        }))
    }

    #[instrument(skip(self))]
    pub async fn fail(&self, bill_id: &str) -> AppResult<ReconcileOutcome> {
        let transitioned = self.pending_repo.mark_failed(bill_id).await?;
        if transitioned {
            info!("Payment marked as failed");
        } else {
            info!("Failure callback for a bill that is no longer pending, ignoring");
        }
        Ok(ReconcileOutcome::Failed { transitioned })
    }

    /// Extension failures are logged for manual follow-up and never abort completion.
    async fn extend_subscription(
        &self,
        pending: &PendingPaymentProfile,
        transaction_id: &str,
        amount_cents: i64,
        source: PaymentSource,
    ) -> Option<ExtensionResult> {
        let request = ExtensionRequest {
            user_id: pending.user_id,
            plan_id: pending.plan_id.clone(),
            payment_data: ExtensionPaymentData {
                transaction_id: transaction_id.to_string(),
                amount: amount_cents as f64 / 100.0,
                bill_id: pending.bill_id.clone(),
                status: SUCCESS_CODE.to_string(),
                source,
            },
        };

        match self.extender.extend(&request).await {
            Ok(result) => {
                info!(
                    subscription_id = ?result.new_subscription_id,
                    days_added = result.days_added,
                    "Subscription extended"
                );
                Some(result)
            }
            Err(e) => {
                error!(
                    error = %e,
                    user_id = %pending.user_id,
                    plan_id = %pending.plan_id,
                    "Subscription extension failed; payment stays completed"
                );
                None
            }
        }
    }
}
