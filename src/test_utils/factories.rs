//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{NaiveDateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    application::{
        ports::subscription_extender::PaymentSource,
        use_cases::{
            notification::PaymentSuccessNotice,
            reconcile::{PaymentProfile, PendingPaymentProfile},
        },
    },
    domain::entities::{
        payment_status::PaymentStatus, pending_payment_status::PendingPaymentStatus,
    },
};

/// Create a pending payment awaiting its gateway callback.
pub fn create_test_pending_payment(
    overrides: impl FnOnce(&mut PendingPaymentProfile),
) -> PendingPaymentProfile {
    let mut pending = PendingPaymentProfile {
        id: Uuid::new_v4(),
        bill_id: "bill_test123".to_string(),
        user_id: Uuid::new_v4(),
        plan_id: "premium_1m".to_string(),
        amount_cents: 5000,
        status: PendingPaymentStatus::Pending,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut pending);
    pending
}

/// Create a `pending` payment row. `created_at` defaults to now so tests can
/// insert an explicitly older row next to it.
pub fn create_test_payment(overrides: impl FnOnce(&mut PaymentProfile)) -> PaymentProfile {
    let now = Utc::now().naive_utc();
    let mut payment = PaymentProfile {
        id: Uuid::new_v4(),
        bill_id: "bill_test123".to_string(),
        status: PaymentStatus::Pending,
        provider_payment_id: None,
        paid_at: None,
        raw_payload: json!({ "billName": "Premium 1 month" }),
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut payment);
    payment
}

/// Create a payment success notice for RM50.00 learned from a webhook.
pub fn create_test_notice(overrides: impl FnOnce(&mut PaymentSuccessNotice)) -> PaymentSuccessNotice {
    let mut notice = PaymentSuccessNotice {
        user_id: Uuid::new_v4(),
        bill_id: "bill_test123".to_string(),
        plan_id: "premium_1m".to_string(),
        amount_cents: 5000,
        source: PaymentSource::Webhook,
        subscription: None,
    };
    overrides(&mut notice);
    notice
}

/// Fixed timestamp for reproducible fixtures.
pub fn test_datetime() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2025-01-01 12:00:00", "%Y-%m-%d %H:%M:%S")
        .expect("valid test datetime")
}
