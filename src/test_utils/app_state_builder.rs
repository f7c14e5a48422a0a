//! Test app state builder for HTTP-level testing.
//!
//! `TestAppStateBuilder` wires a real `AppState` around the in-memory store and
//! scripted fakes, and hands the fakes back so tests can seed and inspect them.

use std::{sync::Arc, time::Duration};

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        notification::NotificationEmitter, payment_status::PaymentStatusService,
        reconcile::PaymentReconciler, recovery::PaymentRecovery,
    },
    infra::{
        RateLimiterTrait, config::AppConfig, rate_limit::FixedWindowRateLimiter,
        webhook_signature::SignatureVerifier,
    },
    test_utils::{FakeGatewayClient, FakeSubscriptionExtender, InMemoryPaymentStore},
};

/// Shared secret the test `SignatureVerifier` is built with.
pub const TEST_WEBHOOK_SECRET: &str = "test_webhook_secret";

/// A built `AppState` plus handles to the fakes behind it.
pub struct TestHarness {
    pub app_state: AppState,
    pub store: Arc<InMemoryPaymentStore>,
    pub extender: Arc<FakeSubscriptionExtender>,
    pub gateway: Arc<FakeGatewayClient>,
}

/// Builder for an `AppState` backed entirely by in-memory fakes.
///
/// # Example
///
/// ```ignore
/// let harness = TestAppStateBuilder::new()
///     .with_rate_limit(10)
///     .accept_get(true)
///     .build();
/// ```
pub struct TestAppStateBuilder {
    rate_limit: Option<u64>,
    accept_get: bool,
    failing_extender: bool,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            rate_limit: None,
            accept_get: false,
            failing_extender: false,
        }
    }

    /// Cap requests per source per minute. Unlimited when not set.
    pub fn with_rate_limit(mut self, max_requests: u64) -> Self {
        self.rate_limit = Some(max_requests);
        self
    }

    pub fn accept_get(mut self, accept: bool) -> Self {
        self.accept_get = accept;
        self
    }

    pub fn with_failing_extender(mut self) -> Self {
        self.failing_extender = true;
        self
    }

    pub fn build(self) -> TestHarness {
        let store = Arc::new(InMemoryPaymentStore::new());
        let gateway = Arc::new(FakeGatewayClient::new());
        let extender = Arc::new(if self.failing_extender {
            FakeSubscriptionExtender::failing()
        } else {
            FakeSubscriptionExtender::succeeding()
        });

        let config = Arc::new(AppConfig {
            bind_addr: "127.0.0.1:3001".parse().unwrap(),
            database_url: String::new(),
            redis_url: None,
            rate_limit_window_secs: 60,
            rate_limit_max_requests: self.rate_limit.unwrap_or(u64::MAX),
            trust_proxy: false,
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            toyyibpay_webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
            webhook_accept_get: self.accept_get,
            extend_subscription_url: Url::parse("http://localhost:54321/extend-subscription")
                .unwrap(),
            service_role_key: SecretString::new("test_service_role_key".into()),
            toyyibpay_api_url: Url::parse("http://localhost:9999").unwrap(),
            toyyibpay_secret_key: SecretString::new("test_gateway_secret".into()),
            toyyibpay_category_code: "cat_test".to_string(),
            status_poll_interval: Duration::from_secs(30),
            status_poll_max_attempts: 40,
            notification_ttl: chrono::Duration::days(30),
        });

        let reconciler = Arc::new(PaymentReconciler::new(
            store.clone(),
            store.clone(),
            extender.clone(),
            NotificationEmitter::new(store.clone(), config.notification_ttl),
        ));
        let payment_status = PaymentStatusService::new(gateway.clone());
        let recovery = Arc::new(PaymentRecovery::new(
            payment_status.clone(),
            reconciler.clone(),
        ));

        let rate_limiter: Arc<dyn RateLimiterTrait> = Arc::new(FixedWindowRateLimiter::new(
            Duration::from_secs(config.rate_limit_window_secs),
            config.rate_limit_max_requests,
        ));

        let app_state = AppState {
            signature_verifier: Arc::new(SignatureVerifier::new(
                config.toyyibpay_webhook_secret.clone(),
            )),
            config,
            reconciler,
            payment_status: Arc::new(payment_status),
            recovery,
            rate_limiter,
        };

        TestHarness {
            app_state,
            store,
            extender,
            gateway,
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
