//! In-memory mock implementations for the payment repository traits and outbound ports.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::{
            gateway_query::{GatewayQueryClient, GatewayTransaction},
            subscription_extender::{ExtensionRequest, ExtensionResult, SubscriptionExtender},
        },
        use_cases::{
            notification::{NewNotification, NotificationRepo},
            reconcile::{
                ClaimedCompletion, NewWebhookEvent, PaymentCompletion, PaymentProfile,
                PendingPaymentProfile, PendingPaymentRepo, WebhookEventRepo,
            },
        },
    },
    domain::entities::{
        payment_status::PaymentStatus, pending_payment_status::PendingPaymentStatus,
    },
};

fn injected_db_error() -> AppError {
    AppError::Database("injected failure".into())
}

// ============================================================================
// InMemoryPaymentStore
// ============================================================================

/// One store behind every repository trait, with the same conditional-update
/// semantics as the Postgres queries. Two-table transitions hold the `pending` lock
/// and then the `payments` lock for their whole duration, mirroring the row lock the
/// Postgres transaction takes.
#[derive(Default)]
pub struct InMemoryPaymentStore {
    pub pending: Mutex<HashMap<String, PendingPaymentProfile>>,
    pub payments: Mutex<Vec<PaymentProfile>>,
    pub events: Mutex<Vec<NewWebhookEvent>>,
    pub notifications: Mutex<Vec<(Uuid, NewNotification)>>,
    pub notification_reads: Mutex<Vec<(Uuid, Uuid)>>,
    fail_payment_updates: AtomicBool,
    fail_webhook_events: AtomicBool,
    fail_notifications: AtomicBool,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pending(&self, pending: PendingPaymentProfile) {
        self.pending
            .lock()
            .unwrap()
            .insert(pending.bill_id.clone(), pending);
    }

    pub fn insert_payment(&self, payment: PaymentProfile) {
        self.payments.lock().unwrap().push(payment);
    }

    pub fn pending_status(&self, bill_id: &str) -> Option<PendingPaymentStatus> {
        self.pending.lock().unwrap().get(bill_id).map(|p| p.status)
    }

    /// Payment rows for a bill, oldest first.
    pub fn payments_for(&self, bill_id: &str) -> Vec<PaymentProfile> {
        let mut rows: Vec<_> = self
            .payments
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.bill_id == bill_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.created_at, p.id));
        rows
    }

    pub fn webhook_events(&self) -> Vec<NewWebhookEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<(Uuid, NewNotification)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn notification_reads(&self) -> Vec<(Uuid, Uuid)> {
        self.notification_reads.lock().unwrap().clone()
    }

    pub fn fail_payment_updates(&self, fail: bool) {
        self.fail_payment_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_webhook_events(&self, fail: bool) {
        self.fail_webhook_events.store(fail, Ordering::SeqCst);
    }

    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    fn oldest_index(payments: &[PaymentProfile], bill_id: &str) -> Option<usize> {
        payments
            .iter()
            .enumerate()
            .filter(|(_, p)| p.bill_id == bill_id)
            .min_by_key(|(_, p)| (p.created_at, p.id))
            .map(|(i, _)| i)
    }

    fn complete_payment_row(
        payments: &mut [PaymentProfile],
        bill_id: &str,
        completion: &PaymentCompletion,
    ) -> Option<PaymentProfile> {
        let idx = Self::oldest_index(payments, bill_id)?;
        let row = &mut payments[idx];
        if row.status != PaymentStatus::Pending {
            return None;
        }

        let now = chrono::Utc::now().naive_utc();
        if let (Some(existing), Some(incoming)) = (
            row.raw_payload.as_object_mut(),
            completion.raw_payload.as_object(),
        ) {
            existing.extend(incoming.clone());
            existing.insert(
                "processed_at".into(),
                JsonValue::String(now.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            );
        } else {
            row.raw_payload = completion.raw_payload.clone();
        }
        row.status = PaymentStatus::Completed;
        row.provider_payment_id = Some(completion.provider_payment_id.clone());
        row.paid_at = Some(now);
        row.updated_at = Some(now);
        Some(row.clone())
    }

    fn fail_payment_row(payments: &mut [PaymentProfile], bill_id: &str) {
        if let Some(idx) = Self::oldest_index(payments, bill_id) {
            let row = &mut payments[idx];
            if row.status == PaymentStatus::Pending {
                row.status = PaymentStatus::Failed;
                row.updated_at = Some(chrono::Utc::now().naive_utc());
            }
        }
    }
}

#[async_trait]
impl PendingPaymentRepo for InMemoryPaymentStore {
    async fn find_pending(&self, bill_id: &str) -> AppResult<Option<PendingPaymentProfile>> {
        Ok(self
            .pending
            .lock()
            .unwrap()
            .get(bill_id)
            .filter(|p| p.status == PendingPaymentStatus::Pending)
            .cloned())
    }

    async fn claim_completion(
        &self,
        bill_id: &str,
        completion: &PaymentCompletion,
    ) -> AppResult<Option<ClaimedCompletion>> {
        let mut pending = self.pending.lock().unwrap();
        let Some(row) = pending
            .get_mut(bill_id)
            .filter(|p| p.status == PendingPaymentStatus::Pending)
        else {
            return Ok(None);
        };
        // A failed payment update rolls back before anything is written.
        if self.fail_payment_updates.load(Ordering::SeqCst) {
            return Err(injected_db_error());
        }

        let mut payments = self.payments.lock().unwrap();
        let payment = Self::complete_payment_row(&mut payments, bill_id, completion);
        row.status = PendingPaymentStatus::Completed;
        row.updated_at = Some(chrono::Utc::now().naive_utc());

        Ok(Some(ClaimedCompletion {
            pending: row.clone(),
            payment,
        }))
    }

    async fn mark_failed(&self, bill_id: &str) -> AppResult<bool> {
        let mut pending = self.pending.lock().unwrap();
        let Some(row) = pending
            .get_mut(bill_id)
            .filter(|p| p.status == PendingPaymentStatus::Pending)
        else {
            return Ok(false);
        };
        if self.fail_payment_updates.load(Ordering::SeqCst) {
            return Err(injected_db_error());
        }

        let mut payments = self.payments.lock().unwrap();
        Self::fail_payment_row(&mut payments, bill_id);
        row.status = PendingPaymentStatus::Failed;
        row.updated_at = Some(chrono::Utc::now().naive_utc());
        Ok(true)
    }
}

#[async_trait]
impl WebhookEventRepo for InMemoryPaymentStore {
    async fn record(&self, event: &NewWebhookEvent) -> AppResult<Uuid> {
        if self.fail_webhook_events.load(Ordering::SeqCst) {
            return Err(injected_db_error());
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(Uuid::new_v4())
    }
}

#[async_trait]
impl NotificationRepo for InMemoryPaymentStore {
    async fn exists_for_payment(&self, bill_id: &str) -> AppResult<bool> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(injected_db_error());
        }
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .any(|(_, n)| n.metadata["payment_id"] == bill_id))
    }

    async fn insert(&self, notification: &NewNotification) -> AppResult<Uuid> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(injected_db_error());
        }
        let id = Uuid::new_v4();
        self.notifications
            .lock()
            .unwrap()
            .push((id, notification.clone()));
        Ok(id)
    }

    async fn insert_read(&self, notification_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut reads = self.notification_reads.lock().unwrap();
        if !reads.contains(&(notification_id, user_id)) {
            reads.push((notification_id, user_id));
        }
        Ok(())
    }
}

// ============================================================================
// FakeSubscriptionExtender
// ============================================================================

/// Records every extension request and answers with a fixed result.
pub struct FakeSubscriptionExtender {
    calls: Mutex<Vec<ExtensionRequest>>,
    fail: bool,
}

impl FakeSubscriptionExtender {
    pub fn succeeding() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<ExtensionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionExtender for FakeSubscriptionExtender {
    async fn extend(&self, request: &ExtensionRequest) -> AppResult<ExtensionResult> {
        self.calls.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(AppError::Upstream("extension endpoint returned 500".into()));
        }
        Ok(ExtensionResult {
            new_subscription_id: Some(format!("sub_{}", request.payment_data.bill_id)),
            days_added: 30,
        })
    }
}

// ============================================================================
// FakeGatewayClient
// ============================================================================

/// Scripted gateway. Responses are queued per bill and consumed in order;
/// once a bill's queue is empty the gateway reports no transactions.
#[derive(Default)]
pub struct FakeGatewayClient {
    responses: Mutex<HashMap<String, VecDeque<AppResult<Vec<GatewayTransaction>>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeGatewayClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, bill_id: &str, response: AppResult<Vec<GatewayTransaction>>) {
        self.responses
            .lock()
            .unwrap()
            .entry(bill_id.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self, bill_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(bill_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl GatewayQueryClient for FakeGatewayClient {
    async fn get_bill_transactions(&self, bill_id: &str) -> AppResult<Vec<GatewayTransaction>> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(bill_id.to_string())
            .or_default() += 1;

        self.responses
            .lock()
            .unwrap()
            .get_mut(bill_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
