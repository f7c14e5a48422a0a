use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        helpers::callback_parsing::parse_amount_cents,
        ports::subscription_extender::PaymentSource,
        use_cases::{
            payment_status::{BillPaymentStatus, PaymentStatusService, PollHandle},
            reconcile::{
                CompletionInput, EVENT_PAYMENT_RECOVERY, NewWebhookEvent, PROVIDER_TOYYIBPAY,
                PaymentReconciler, ReconcileOutcome,
            },
        },
    },
    domain::entities::gateway_status::GatewayOutcome,
};

/// Result of a recovery attempt, with the gateway status it was based on.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryReport {
    pub gateway_status: BillPaymentStatus,
    pub outcome: ReconcileOutcome,
}

/// Reconciles a bill from the gateway's own records, for callbacks that never arrived.
///
/// Runs the same transitions as the webhook, so a later (or earlier) callback for the
/// same bill still converges on one completion.
#[derive(Clone)]
pub struct PaymentRecovery {
    status: PaymentStatusService,
    reconciler: Arc<PaymentReconciler>,
    /// At most one live background watch per bill.
    watches: Arc<Mutex<HashMap<String, PollHandle>>>,
}

impl PaymentRecovery {
    pub fn new(status: PaymentStatusService, reconciler: Arc<PaymentReconciler>) -> Self {
        Self {
            status,
            reconciler,
            watches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[instrument(skip(self))]
    pub async fn recover(&self, bill_id: &str) -> AppResult<RecoveryReport> {
        let bill_id = bill_id.trim();
        if bill_id.is_empty() {
            return Err(AppError::InvalidInput("Missing bill code".into()));
        }

        let gateway_status = self.status.check_payment_status(bill_id).await?;
        let raw_payload = json!({
            "billcode": bill_id,
            "billpaymentStatus": gateway_status.status,
            "billAmount": gateway_status.amount,
            "billpaidAmount": gateway_status.paid_amount,
            "billpaymentDate": gateway_status.payment_date,
            "billpaymentInvoiceNo": gateway_status.transaction_id,
        });

        self.reconciler
            .record_event(&NewWebhookEvent {
                provider: PROVIDER_TOYYIBPAY.to_string(),
                event_type: EVENT_PAYMENT_RECOVERY.to_string(),
                bill_id: Some(bill_id.to_string()),
                transaction_id: gateway_status.transaction_id.clone(),
                status: Some(gateway_status.status.to_string()),
                raw_payload: raw_payload.clone(),
            })
            .await;

        let outcome = match gateway_status.outcome() {
            GatewayOutcome::Successful => {
                let amount_cents = gateway_status
                    .paid_amount
                    .as_deref()
                    .or(gateway_status.amount.as_deref())
                    .and_then(parse_amount_cents);

                self.reconciler
                    .complete(CompletionInput {
                        bill_id: bill_id.to_string(),
                        transaction_id: gateway_status.transaction_id.clone(),
                        amount_cents,
                        raw_payload,
                        source: PaymentSource::Recovery,
                    })
                    .await?
            }
            GatewayOutcome::Failed => self.reconciler.fail(bill_id).await?,
            GatewayOutcome::Pending => ReconcileOutcome::Pending,
        };

        info!(outcome = outcome.as_str(), "Recovery finished");

        Ok(RecoveryReport {
            gateway_status,
            outcome,
        })
    }

    /// Poll the gateway in the background and reconcile the bill once it settles.
    ///
    /// Returns false without starting anything when the bill is already being watched.
    pub fn watch(&self, bill_id: &str, interval: Duration, max_attempts: u32) -> bool {
        let watched = bill_id.trim().to_string();
        let mut watches = self.lock_watches();
        watches.retain(|_, handle| !handle.is_finished());
        if watches.contains_key(&watched) {
            debug!(bill_id = %watched, "Bill is already being watched");
            return false;
        }

        let recovery = self.clone();
        let bill_id = watched.clone();
        let handle = self.status.start_polling(
            watched.clone(),
            move |status| {
                if !status.outcome().is_terminal() {
                    return;
                }
                let recovery = recovery.clone();
                let bill_id = bill_id.clone();
                tokio::spawn(async move {
                    if let Err(e) = recovery.recover(&bill_id).await {
                        warn!(bill_id = %bill_id, error = %e, "Watched recovery failed");
                    }
                });
            },
            interval,
            max_attempts,
        );

        watches.insert(watched, handle);
        true
    }

    pub fn is_watching(&self, bill_id: &str) -> bool {
        self.lock_watches()
            .get(bill_id.trim())
            .is_some_and(|handle| !handle.is_finished())
    }

    fn lock_watches(&self) -> MutexGuard<'_, HashMap<String, PollHandle>> {
        match self.watches.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
