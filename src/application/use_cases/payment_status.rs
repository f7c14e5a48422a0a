use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{task::JoinHandle, time::Instant};
use tracing::{info, instrument, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::gateway_query::{GatewayQueryClient, GatewayTransaction},
    domain::entities::gateway_status::{GatewayOutcome, GatewayStatusCode},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(30_000);
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 40;

/// Gateway-side view of one bill.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPaymentStatus {
    pub bill_id: String,
    pub status: GatewayStatusCode,
    pub amount: Option<String>,
    pub payment_date: Option<String>,
    pub transaction_id: Option<String>,
    pub paid_amount: Option<String>,
}

impl BillPaymentStatus {
    fn from_transaction(bill_id: &str, tx: Option<&GatewayTransaction>) -> Self {
        let Some(tx) = tx else {
            return Self {
                bill_id: bill_id.to_string(),
                status: GatewayStatusCode::pending(),
                amount: None,
                payment_date: None,
                transaction_id: None,
                paid_amount: None,
            };
        };

        Self {
            bill_id: bill_id.to_string(),
            status: tx.billpayment_status.clone().unwrap_or_default(),
            amount: tx.bill_amount.clone(),
            payment_date: tx.billpayment_date.clone(),
            transaction_id: tx.billpayment_invoice_no.clone(),
            paid_amount: tx.billpaid_amount.clone(),
        }
    }

    pub fn outcome(&self) -> GatewayOutcome {
        self.status.outcome()
    }
}

pub fn is_payment_successful(status: &GatewayStatusCode) -> bool {
    status.is_successful()
}

pub fn is_payment_failed(status: &GatewayStatusCode) -> bool {
    status.is_failed()
}

/// Handle to a running poll loop. Dropping it leaves the loop running.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[derive(Clone)]
pub struct PaymentStatusService {
    gateway: Arc<dyn GatewayQueryClient>,
}

impl PaymentStatusService {
    pub fn new(gateway: Arc<dyn GatewayQueryClient>) -> Self {
        Self { gateway }
    }

    /// Ask the gateway for the bill's state. The first transaction returned is
    /// authoritative; no transactions means still pending.
    #[instrument(skip(self))]
    pub async fn check_payment_status(&self, bill_id: &str) -> AppResult<BillPaymentStatus> {
        let transactions = self.gateway.get_bill_transactions(bill_id).await?;
        Ok(BillPaymentStatus::from_transaction(
            bill_id,
            transactions.first(),
        ))
    }

    /// Poll every `interval` until the bill reaches a terminal state or `max_attempts`
    /// polls have run. `on_status_change` sees every successful poll, changed or not.
    /// Poll errors are logged and the loop carries on.
    pub fn start_polling<F>(
        &self,
        bill_id: impl Into<String>,
        on_status_change: F,
        interval: Duration,
        max_attempts: u32,
    ) -> PollHandle
    where
        F: Fn(&BillPaymentStatus) + Send + Sync + 'static,
    {
        let service = self.clone();
        let bill_id = bill_id.into();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);

            for attempt in 1..=max_attempts {
                ticker.tick().await;

                match service.check_payment_status(&bill_id).await {
                    Ok(status) => {
                        on_status_change(&status);
                        if status.outcome().is_terminal() {
                            info!(bill_id = %bill_id, attempt, outcome = %status.outcome(), "Polling finished");
                            return;
                        }
                    }
                    Err(e) => warn!(bill_id = %bill_id, attempt, error = %e, "Payment status poll failed"),
                }
            }

            warn!(bill_id = %bill_id, max_attempts, "Polling gave up before a terminal status");
        });

        PollHandle { task }
    }

    pub fn stop_polling(&self, handle: &PollHandle) {
        handle.stop();
    }

    /// Look up all bills concurrently. One settled result per input, in input order.
    pub async fn check_multiple_payment_status(
        &self,
        bill_ids: &[String],
    ) -> Vec<AppResult<BillPaymentStatus>> {
        let tasks: Vec<_> = bill_ids
            .iter()
            .cloned()
            .map(|bill_id| {
                let service = self.clone();
                tokio::spawn(async move { service.check_payment_status(&bill_id).await })
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(match task.await {
                Ok(result) => result,
                Err(e) => Err(AppError::Internal(format!("status lookup task failed: {e}"))),
            });
        }
        results
    }
}
